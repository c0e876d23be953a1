//! Scenario-weighted Monte Carlo simulation.
//!
//! | Scenario | Probability | Growth × | Terminal growth × |
//! |----------|-------------|----------|-------------------|
//! | Bear     | 0.20        | 0.50     | 0.60              |
//! | Base     | 0.60        | 0.80     | 1.00              |
//! | Bull     | 0.20        | 1.20     | 1.20              |
//!
//! The table is a [`ScenarioSet`] value, so weights can be changed without
//! touching the sampler.

pub mod engine;
pub mod scenario;
pub mod summary;

pub use engine::{ExclusionReason, MonteCarloEngine, MonteCarloRun, ScenarioDraw, SimulationConfig};
pub use scenario::{Scenario, ScenarioLabel, ScenarioSet};
pub use summary::{Assessment, MonteCarloSummary};
