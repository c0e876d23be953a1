//! Deterministic valuation core.
//!
//! Leaves of the pipeline, in dependency order:
//!
//! 1. [`GrowthEstimator`] cleans analyst growth against sector priors
//! 2. [`DiscountRateModel`] builds the discount rate from CAPM plus a
//!    bounded macro adjustment
//! 3. [`CashFlowProjector`] projects and discounts the explicit window
//! 4. [`TerminalValueModel`] values the tail and enforces the dominance cap
//!
//! [`DcfModel`] chains 3 and 4 into a fair value per share. The Monte Carlo
//! engine, the sensitivity grid and the stress tests all run through it so
//! that every number the engine reports comes from the same arithmetic.
//!
//! # Usage
//!
//! ```ignore
//! use dcf_engine::valuation::{DcfModel, DcfParameters, TerminalMethod};
//!
//! let model = DcfModel::default();
//! let dcf = model.value(&DcfParameters {
//!     fcf0: 10_000.0,
//!     growth: 0.10,
//!     terminal_growth: 0.025,
//!     wacc: 0.09,
//!     years: 5,
//!     method: TerminalMethod::Perpetuity,
//!     exit_multiple: 12.0,
//!     shares_outstanding: 1_000.0,
//! })?;
//!
//! println!("Fair value: {:.2}", dcf.fair_value_per_share);
//! ```

pub mod dcf;
pub mod discount;
pub mod growth;
pub mod projection;
pub mod terminal;

use serde::{Deserialize, Serialize};

pub use dcf::{DcfModel, DcfParameters, DcfValuation};
pub use discount::{
    DiscountConfig, DiscountRate, DiscountRateModel, MacroEnvironment, MacroState,
    MarketValuationState,
};
pub use growth::{GrowthAssumption, GrowthConfig, GrowthEstimator, GrowthSource};
pub use projection::{CashFlowProjector, ForecastPeriod, ForecastYear, GrowthSchedule};
pub use terminal::{TerminalValue, TerminalValueModel, DEFAULT_TERMINAL_CAP};

/// How the value beyond the explicit window is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalMethod {
    /// Gordon growth: `fcf * (1 + g) / (wacc - g)`
    Perpetuity,
    /// Final-year cash flow times a sector multiple
    ExitMultiple,
}

impl std::fmt::Display for TerminalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Perpetuity => write!(f, "perpetuity"),
            Self::ExitMultiple => write!(f, "exit multiple"),
        }
    }
}

impl std::str::FromStr for TerminalMethod {
    type Err = crate::error::ValuationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "perpetuity" => Ok(Self::Perpetuity),
            "exit_multiple" => Ok(Self::ExitMultiple),
            other => Err(crate::error::ValuationError::configuration(format!(
                "unknown terminal method '{}'",
                other
            ))),
        }
    }
}
