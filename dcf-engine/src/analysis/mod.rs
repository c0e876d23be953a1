//! What-if analysis on the deterministic DCF.

pub mod scenarios;
pub mod sensitivity;
pub mod stress;

pub use scenarios::{scenario_analysis, ScenarioAnalysis, ScenarioCase};
pub use sensitivity::{sensitivity_grid, SensitivityAxis, SensitivityGrid, DEFAULT_STEPS};
pub use stress::{default_scenarios, stress_test, StressReport, StressResult, StressScenario};
