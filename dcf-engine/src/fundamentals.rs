//! Company fundamentals and input validation.
//!
//! Fundamentals arrive from an external provider once per run and are
//! never mutated afterwards. Hard problems (non-positive cash flow, missing
//! share count) reject the input; soft gaps lower the data quality score
//! and surface as warnings.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValuationError};

/// Immutable per-run company inputs.
///
/// Monetary amounts share one unit (e.g. millions) so that
/// `equity value / shares_outstanding` lands in price units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyFundamentals {
    /// Ticker symbol
    pub ticker: String,
    /// Sector name (used for priors and terminal method)
    #[serde(default)]
    pub sector: Option<String>,
    /// Current annual free cash flow
    pub fcf: f64,
    /// Shares outstanding
    pub shares_outstanding: f64,
    /// Current share price
    pub current_price: f64,
    /// Equity beta
    pub beta: f64,
    /// Analyst growth estimate as a decimal (0.12 = 12%)
    #[serde(default)]
    pub analyst_growth: Option<f64>,
    /// Annual revenue
    #[serde(default)]
    pub revenue: Option<f64>,
}

/// Outcome of soft input checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputQuality {
    /// Score from 0.0 (poor) to 1.0 (complete)
    pub score: f64,
    /// Human-readable gaps
    pub warnings: Vec<String>,
}

impl CompanyFundamentals {
    /// Reject inputs the pipeline cannot value.
    pub fn validate(&self) -> Result<()> {
        if self.ticker.trim().is_empty() {
            return Err(ValuationError::validation("ticker", "must not be empty"));
        }
        if !self.fcf.is_finite() {
            return Err(ValuationError::validation("fcf", "must be a finite number"));
        }
        if self.fcf <= 0.0 {
            return Err(ValuationError::validation(
                "fcf",
                format!("non-positive free cash flow ({}), DCF not applicable", self.fcf),
            ));
        }
        if !(self.shares_outstanding.is_finite() && self.shares_outstanding > 0.0) {
            return Err(ValuationError::validation(
                "shares_outstanding",
                "must be positive",
            ));
        }
        if !(self.current_price.is_finite() && self.current_price > 0.0) {
            return Err(ValuationError::validation("current_price", "must be positive"));
        }
        if !self.beta.is_finite() {
            return Err(ValuationError::validation("beta", "must be a finite number"));
        }
        if let Some(g) = self.analyst_growth {
            if !g.is_finite() {
                return Err(ValuationError::validation(
                    "analyst_growth",
                    "must be a finite number when present",
                ));
            }
        }
        if let Some(revenue) = self.revenue {
            if !(revenue.is_finite() && revenue >= 0.0) {
                return Err(ValuationError::validation(
                    "revenue",
                    "must be non-negative when present",
                ));
            }
        }
        Ok(())
    }

    /// Score completeness of the inputs.
    ///
    /// A missing analyst estimate lowers the score only; the growth stage
    /// reports the fallback to the sector prior.
    pub fn quality(&self) -> InputQuality {
        let mut score: f64 = 1.0;
        let mut warnings = Vec::new();

        if self.analyst_growth.is_none() {
            score -= 0.15;
        }
        if self.revenue.is_none() {
            score -= 0.10;
            warnings.push("No revenue figure available".to_string());
        }
        if self.sector.is_none() {
            score -= 0.10;
            warnings.push("No sector, using default sector profile".to_string());
        }
        if self.beta <= 0.0 || self.beta > 5.0 {
            score -= 0.10;
            warnings.push(format!("Beta {:.2} outside (0, 5]", self.beta));
        }

        InputQuality {
            score: score.clamp(0.0, 1.0),
            warnings,
        }
    }

    /// Market capitalisation in the fundamentals' monetary unit.
    pub fn market_cap(&self) -> f64 {
        self.current_price * self.shares_outstanding
    }
}
