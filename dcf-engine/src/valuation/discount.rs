//! Discount rate model.
//!
//! CAPM base rate nudged by the market valuation state:
//!
//! ```text
//! rate = risk_free + beta * erp + macro_adjustment (+ floor lift)
//! ```
//!
//! The macro adjustment is zero while CAPE sits inside the fair band and
//! ramps linearly to `±max_adjustment` once CAPE is `ramp_width` points
//! beyond a threshold. Expensive markets raise the rate.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValuationError};

// ============================================================================
// Macro Inputs
// ============================================================================

/// Market valuation regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketValuationState {
    Cheap,
    Fair,
    Expensive,
}

impl std::fmt::Display for MarketValuationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cheap => write!(f, "cheap"),
            Self::Fair => write!(f, "fair"),
            Self::Expensive => write!(f, "expensive"),
        }
    }
}

/// Market valuation reading supplied by the macro provider.
///
/// A CAPE reading takes precedence; a bare regime applies the full bound
/// in its direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroState {
    /// Shiller cyclically adjusted P/E
    #[serde(default)]
    pub cape_ratio: Option<f64>,
    /// Categorical regime when no CAPE reading is available
    #[serde(default)]
    pub regime: Option<MarketValuationState>,
}

impl MacroState {
    /// State from a CAPE reading.
    pub fn from_cape(cape: f64) -> Self {
        Self {
            cape_ratio: Some(cape),
            regime: None,
        }
    }

    /// State from a categorical regime.
    pub fn from_regime(regime: MarketValuationState) -> Self {
        Self {
            cape_ratio: None,
            regime: Some(regime),
        }
    }

    /// Whether any market reading is present.
    pub fn is_known(&self) -> bool {
        self.cape_ratio.is_some() || self.regime.is_some()
    }
}

/// Rates and market state from the macro provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroEnvironment {
    /// Risk-free rate as a decimal
    pub risk_free_rate: f64,
    /// Equity risk premium as a decimal
    pub equity_risk_premium: f64,
    /// Market valuation reading
    #[serde(flatten)]
    pub state: MacroState,
}

impl Default for MacroEnvironment {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.04,
            equity_risk_premium: 0.055,
            state: MacroState::default(),
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// Discount rate thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountConfig {
    /// Lowest rate ever returned
    pub wacc_floor: f64,
    /// CAPE below which the market is cheap
    pub cape_low_threshold: f64,
    /// CAPE above which the market is expensive
    pub cape_high_threshold: f64,
    /// CAPE distance past a threshold at which the adjustment saturates
    pub cape_ramp_width: f64,
    /// Absolute bound on the macro adjustment
    pub max_adjustment: f64,
}

impl Default for DiscountConfig {
    fn default() -> Self {
        Self {
            wacc_floor: 0.03,
            cape_low_threshold: 15.0,
            cape_high_threshold: 30.0,
            cape_ramp_width: 10.0,
            max_adjustment: 0.015,
        }
    }
}

/// Discount rate with its additive breakdown.
///
/// `risk_free_rate + equity_premium + macro_adjustment + floor_adjustment`
/// equals `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountRate {
    pub risk_free_rate: f64,
    pub beta: f64,
    pub equity_risk_premium: f64,
    /// `beta * equity_risk_premium`
    pub equity_premium: f64,
    /// Market regime that drove the adjustment
    pub market_state: MarketValuationState,
    pub macro_adjustment: f64,
    /// Lift applied when the adjusted rate fell below the floor
    pub floor_adjustment: f64,
    /// Final discount rate
    pub rate: f64,
}

impl DiscountRate {
    /// CAPM rate before any adjustment.
    pub fn base_rate(&self) -> f64 {
        self.risk_free_rate + self.equity_premium
    }

    /// Whether the floor lifted the rate.
    pub fn is_floored(&self) -> bool {
        self.floor_adjustment > 0.0
    }
}

/// CAPM discount rate model with macro adjustment.
#[derive(Debug, Clone, Default)]
pub struct DiscountRateModel {
    config: DiscountConfig,
}

impl DiscountRateModel {
    pub fn new(config: DiscountConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscountConfig {
        &self.config
    }

    /// Compute the discount rate.
    pub fn wacc(
        &self,
        risk_free_rate: f64,
        beta: f64,
        equity_risk_premium: f64,
        macro_state: &MacroState,
    ) -> Result<DiscountRate> {
        if !risk_free_rate.is_finite() || !equity_risk_premium.is_finite() {
            return Err(ValuationError::configuration(
                "risk-free rate and equity risk premium must be finite",
            ));
        }
        if !(beta.is_finite() && beta > 0.0) {
            return Err(ValuationError::configuration(format!(
                "beta must be positive, got {}",
                beta
            )));
        }

        let equity_premium = beta * equity_risk_premium;
        let base = risk_free_rate + equity_premium;
        if base <= 0.0 {
            return Err(ValuationError::configuration(format!(
                "CAPM rate {:.4} is not positive",
                base
            )));
        }

        let (market_state, macro_adjustment) = self.macro_adjustment(macro_state)?;
        let adjusted = base + macro_adjustment;
        let rate = adjusted.max(self.config.wacc_floor);

        Ok(DiscountRate {
            risk_free_rate,
            beta,
            equity_risk_premium,
            equity_premium,
            market_state,
            macro_adjustment,
            floor_adjustment: rate - adjusted,
            rate,
        })
    }

    /// Regime and bounded rate adjustment for a market reading.
    pub fn macro_adjustment(
        &self,
        state: &MacroState,
    ) -> Result<(MarketValuationState, f64)> {
        let cfg = &self.config;
        let bound = cfg.max_adjustment.abs();

        if let Some(cape) = state.cape_ratio {
            if !(cape.is_finite() && cape > 0.0) {
                return Err(ValuationError::configuration(format!(
                    "CAPE ratio must be positive, got {}",
                    cape
                )));
            }
            if cape < cfg.cape_low_threshold {
                let t = ((cfg.cape_low_threshold - cape) / cfg.cape_ramp_width).min(1.0);
                return Ok((MarketValuationState::Cheap, -bound * t));
            }
            if cape > cfg.cape_high_threshold {
                let t = ((cape - cfg.cape_high_threshold) / cfg.cape_ramp_width).min(1.0);
                return Ok((MarketValuationState::Expensive, bound * t));
            }
            return Ok((MarketValuationState::Fair, 0.0));
        }

        Ok(match state.regime {
            Some(MarketValuationState::Cheap) => (MarketValuationState::Cheap, -bound),
            Some(MarketValuationState::Expensive) => (MarketValuationState::Expensive, bound),
            Some(MarketValuationState::Fair) | None => (MarketValuationState::Fair, 0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_additive(rate: &DiscountRate) {
        let sum = rate.risk_free_rate
            + rate.equity_premium
            + rate.macro_adjustment
            + rate.floor_adjustment;
        assert!((sum - rate.rate).abs() < 1e-12);
    }

    #[test]
    fn test_capm_base_in_fair_band() {
        let model = DiscountRateModel::default();
        let rate = model
            .wacc(0.04, 1.2, 0.05, &MacroState::from_cape(22.0))
            .unwrap();
        assert!((rate.rate - 0.10).abs() < 1e-12);
        assert_eq!(rate.market_state, MarketValuationState::Fair);
        assert_eq!(rate.macro_adjustment, 0.0);
        assert_additive(&rate);
    }

    #[test]
    fn test_expensive_market_interpolates() {
        let model = DiscountRateModel::default();
        // 5 points past 30 with a 10 point ramp: half of 150 bps
        let rate = model
            .wacc(0.04, 1.0, 0.05, &MacroState::from_cape(35.0))
            .unwrap();
        assert_eq!(rate.market_state, MarketValuationState::Expensive);
        assert!((rate.macro_adjustment - 0.0075).abs() < 1e-12);
        assert!((rate.rate - 0.0975).abs() < 1e-12);
        assert_additive(&rate);
    }

    #[test]
    fn test_adjustment_is_bounded() {
        let model = DiscountRateModel::default();
        let (_, high) = model.macro_adjustment(&MacroState::from_cape(80.0)).unwrap();
        let (_, low) = model.macro_adjustment(&MacroState::from_cape(2.0)).unwrap();
        assert!((high - 0.015).abs() < 1e-12);
        assert!((low + 0.015).abs() < 1e-12);
    }

    #[test]
    fn test_regime_without_cape() {
        let model = DiscountRateModel::default();
        let state = MacroState::from_regime(MarketValuationState::Cheap);
        let (regime, adj) = model.macro_adjustment(&state).unwrap();
        assert_eq!(regime, MarketValuationState::Cheap);
        assert!((adj + 0.015).abs() < 1e-12);

        let (regime, adj) = model.macro_adjustment(&MacroState::default()).unwrap();
        assert_eq!(regime, MarketValuationState::Fair);
        assert_eq!(adj, 0.0);
    }

    #[test]
    fn test_floor_applies() {
        let model = DiscountRateModel::default();
        let rate = model
            .wacc(0.01, 0.3, 0.05, &MacroState::from_cape(5.0))
            .unwrap();
        assert!((rate.rate - 0.03).abs() < 1e-12);
        assert!(rate.is_floored());
        assert_additive(&rate);
    }

    #[test]
    fn test_non_positive_beta_rejected() {
        let model = DiscountRateModel::default();
        let err = model.wacc(0.04, 0.0, 0.05, &MacroState::default()).unwrap_err();
        assert!(err.is_configuration());
        assert!(model.wacc(0.04, -0.5, 0.05, &MacroState::default()).is_err());
    }

    #[test]
    fn test_non_positive_base_rejected() {
        let model = DiscountRateModel::default();
        let err = model.wacc(-0.06, 1.0, 0.05, &MacroState::default()).unwrap_err();
        assert!(err.is_configuration());
    }
}
