//! Deterministic DCF: projection plus capped terminal value.

use serde::{Deserialize, Serialize};

use super::projection::{CashFlowProjector, ForecastPeriod, MAX_FORECAST_YEARS, MIN_FORECAST_YEARS};
use super::terminal::{TerminalValue, TerminalValueModel};
use super::TerminalMethod;
use crate::error::{Result, ValuationError};

/// Everything one deterministic valuation needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcfParameters {
    pub fcf0: f64,
    pub growth: f64,
    pub terminal_growth: f64,
    pub wacc: f64,
    pub years: u32,
    pub method: TerminalMethod,
    pub exit_multiple: f64,
    pub shares_outstanding: f64,
}

impl DcfParameters {
    /// Structural checks that no amount of resampling can repair.
    ///
    /// The `wacc > terminal growth` condition is not checked here; it is
    /// evaluated per valuation because simulated draws may violate it.
    pub fn validate(&self) -> Result<()> {
        if !(self.shares_outstanding.is_finite() && self.shares_outstanding > 0.0) {
            return Err(ValuationError::validation(
                "shares_outstanding",
                "must be positive",
            ));
        }
        if !self.fcf0.is_finite() {
            return Err(ValuationError::validation("fcf0", "must be a finite number"));
        }
        if !(MIN_FORECAST_YEARS..=MAX_FORECAST_YEARS).contains(&self.years) {
            return Err(ValuationError::configuration(format!(
                "forecast window must be {}-{} years, got {}",
                MIN_FORECAST_YEARS, MAX_FORECAST_YEARS, self.years
            )));
        }
        for (name, rate) in [
            ("growth", self.growth),
            ("terminal_growth", self.terminal_growth),
        ] {
            if !rate.is_finite() {
                return Err(ValuationError::configuration(format!(
                    "{} must be finite, got {}",
                    name, rate
                )));
            }
        }
        if !(self.wacc.is_finite() && self.wacc > 0.0) {
            return Err(ValuationError::configuration(format!(
                "discount rate must be positive, got {}",
                self.wacc
            )));
        }
        if self.method == TerminalMethod::ExitMultiple
            && !(self.exit_multiple.is_finite() && self.exit_multiple > 0.0)
        {
            return Err(ValuationError::configuration(format!(
                "exit multiple must be positive, got {}",
                self.exit_multiple
            )));
        }
        Ok(())
    }
}

/// Output of one deterministic valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfValuation {
    pub forecast: ForecastPeriod,
    pub terminal: TerminalValue,
    /// Discounted explicit cash flows plus capped terminal value
    pub enterprise_value: f64,
    /// Equity value (no net debt adjustment)
    pub equity_value: f64,
    pub fair_value_per_share: f64,
}

/// Projector and terminal model wired together.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcfModel {
    projector: CashFlowProjector,
    terminal: TerminalValueModel,
}

impl DcfModel {
    pub fn new(projector: CashFlowProjector, terminal: TerminalValueModel) -> Self {
        Self {
            projector,
            terminal,
        }
    }

    pub fn projector(&self) -> &CashFlowProjector {
        &self.projector
    }

    pub fn terminal_model(&self) -> &TerminalValueModel {
        &self.terminal
    }

    /// Run one deterministic valuation.
    pub fn value(&self, params: &DcfParameters) -> Result<DcfValuation> {
        params.validate()?;

        let forecast =
            self.projector
                .project(params.fcf0, params.growth, params.years, params.wacc)?;
        let terminal = self.terminal.evaluate(
            params.method,
            &forecast,
            params.terminal_growth,
            params.exit_multiple,
        )?;

        let enterprise_value = forecast.pv_sum() + terminal.present_value;
        let equity_value = enterprise_value;
        let fair_value_per_share = equity_value / params.shares_outstanding;
        if !fair_value_per_share.is_finite() {
            return Err(ValuationError::computation("fair value is not finite"));
        }

        Ok(DcfValuation {
            forecast,
            terminal,
            enterprise_value,
            equity_value,
            fair_value_per_share,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_params() -> DcfParameters {
        DcfParameters {
            fcf0: 10_000.0,
            growth: 0.10,
            terminal_growth: 0.025,
            wacc: 0.09,
            years: 5,
            method: TerminalMethod::Perpetuity,
            exit_multiple: 12.0,
            shares_outstanding: 1_000.0,
        }
    }

    #[test]
    fn test_reference_valuation_is_reproducible() {
        let model = DcfModel::default();
        let params = make_test_params();

        let explicit: f64 = (1..=5)
            .map(|t| 10_000.0 * 1.1f64.powi(t) / 1.09f64.powi(t))
            .sum();
        let expected = (explicit + explicit * 0.65 / 0.35) / 1_000.0;

        let first = model.value(&params).unwrap();
        let second = model.value(&params).unwrap();
        assert!((first.fair_value_per_share - expected).abs() < 0.005);
        assert_eq!(first.fair_value_per_share, second.fair_value_per_share);
        assert!((first.fair_value_per_share - 146.84).abs() < 0.01);
        assert!(first.terminal.capped);
    }

    #[test]
    fn test_exit_multiple_valuation() {
        let model = DcfModel::new(
            CashFlowProjector::default(),
            TerminalValueModel::new(0.9).unwrap(),
        );
        let mut params = make_test_params();
        params.method = TerminalMethod::ExitMultiple;
        params.exit_multiple = 8.0;

        let dcf = model.value(&params).unwrap();
        let final_fcf = 10_000.0 * 1.1f64.powi(5);
        let tv_pv = final_fcf * 8.0 / 1.09f64.powi(5);
        assert!((dcf.terminal.present_value - tv_pv).abs() < 1e-6);
        assert!(!dcf.terminal.capped);
    }

    #[test]
    fn test_zero_shares_rejected() {
        let model = DcfModel::default();
        let mut params = make_test_params();
        params.shares_outstanding = 0.0;
        assert!(model.value(&params).unwrap_err().is_validation());
    }

    #[test]
    fn test_structural_parameter_errors() {
        let mut params = make_test_params();
        params.years = 12;
        assert!(params.validate().unwrap_err().is_configuration());

        let mut params = make_test_params();
        params.method = TerminalMethod::ExitMultiple;
        params.exit_multiple = 0.0;
        assert!(params.validate().unwrap_err().is_configuration());

        let mut params = make_test_params();
        params.fcf0 = f64::NAN;
        assert!(params.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_terminal_growth_above_wacc_left_to_valuation() {
        let mut params = make_test_params();
        params.terminal_growth = 0.12;
        assert!(params.validate().is_ok());
        assert!(DcfModel::default().value(&params).unwrap_err().is_configuration());
    }
}
