//! Deterministic stress tests.
//!
//! Each scenario shocks the base case and re-runs the same DCF. A shock
//! that breaks `wacc > terminal growth` is reported per row, not raised.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::valuation::DcfModel;
use crate::valuation::DcfParameters;

/// A named deterministic shock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    /// Multiplier on explicit-period growth
    pub growth_multiplier: f64,
    /// Absolute shift added to WACC
    pub wacc_shift: f64,
    /// Absolute shift added to terminal growth
    pub terminal_growth_shift: f64,
    /// Multiplier on the exit multiple
    #[serde(default = "one")]
    pub exit_multiple_multiplier: f64,
}

fn one() -> f64 {
    1.0
}

impl StressScenario {
    pub fn new(
        name: impl Into<String>,
        growth_multiplier: f64,
        wacc_shift: f64,
        terminal_growth_shift: f64,
    ) -> Self {
        Self {
            name: name.into(),
            growth_multiplier,
            wacc_shift,
            terminal_growth_shift,
            exit_multiple_multiplier: 1.0,
        }
    }

    pub fn with_exit_multiple_multiplier(mut self, multiplier: f64) -> Self {
        self.exit_multiple_multiplier = multiplier;
        self
    }

    fn apply(&self, base: &DcfParameters) -> DcfParameters {
        DcfParameters {
            growth: base.growth * self.growth_multiplier,
            wacc: base.wacc + self.wacc_shift,
            terminal_growth: base.terminal_growth + self.terminal_growth_shift,
            exit_multiple: base.exit_multiple * self.exit_multiple_multiplier,
            ..*base
        }
    }
}

/// Recession, rate shock, growth stall and multiple compression.
pub fn default_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario::new("recession", 0.5, 0.01, -0.005),
        StressScenario::new("rate shock", 1.0, 0.02, 0.0),
        StressScenario::new("growth stall", 0.0, 0.0, -0.01),
        StressScenario::new("multiple compression", 1.0, 0.005, -0.005)
            .with_exit_multiple_multiplier(0.7),
    ]
}

/// Outcome of one shock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    pub name: String,
    pub fair_value: Option<f64>,
    /// Change vs the base fair value (%)
    pub change_pct: Option<f64>,
    /// Terminal share of enterprise value after the cap (%)
    pub terminal_value_pct: Option<f64>,
    /// Why the shocked case could not be valued
    pub error: Option<String>,
}

/// Base case plus one row per shock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub base_fair_value: f64,
    pub base_terminal_value_pct: f64,
    pub results: Vec<StressResult>,
}

impl StressReport {
    /// Row with the lowest fair value.
    pub fn worst(&self) -> Option<&StressResult> {
        self.results
            .iter()
            .filter(|r| r.fair_value.is_some())
            .min_by(|a, b| {
                let a = a.fair_value.unwrap_or(f64::INFINITY);
                let b = b.fair_value.unwrap_or(f64::INFINITY);
                a.total_cmp(&b)
            })
    }
}

/// Run every scenario against `base`. Fails only when the base case does.
pub fn stress_test(
    model: &DcfModel,
    base: &DcfParameters,
    scenarios: &[StressScenario],
) -> Result<StressReport> {
    let base_dcf = model.value(base)?;
    let base_fair_value = base_dcf.fair_value_per_share;

    let results = scenarios
        .iter()
        .map(|scenario| match model.value(&scenario.apply(base)) {
            Ok(dcf) => StressResult {
                name: scenario.name.clone(),
                fair_value: Some(dcf.fair_value_per_share),
                change_pct: Some((dcf.fair_value_per_share / base_fair_value - 1.0) * 100.0),
                terminal_value_pct: Some(dcf.terminal.pct_of_ev * 100.0),
                error: None,
            },
            Err(e) => {
                tracing::debug!(scenario = %scenario.name, error = %e, "Stress scenario not valued");
                StressResult {
                    name: scenario.name.clone(),
                    fair_value: None,
                    change_pct: None,
                    terminal_value_pct: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    Ok(StressReport {
        base_fair_value,
        base_terminal_value_pct: base_dcf.terminal.pct_of_ev * 100.0,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::TerminalMethod;

    fn make_test_base() -> DcfParameters {
        DcfParameters {
            fcf0: 1_000.0,
            growth: 0.08,
            terminal_growth: 0.025,
            wacc: 0.09,
            years: 5,
            method: TerminalMethod::Perpetuity,
            exit_multiple: 12.0,
            shares_outstanding: 100.0,
        }
    }

    #[test]
    fn test_default_scenarios_lower_value() {
        let report = stress_test(&DcfModel::default(), &make_test_base(), &default_scenarios()).unwrap();
        assert_eq!(report.results.len(), 4);
        for row in &report.results {
            let change = row.change_pct.unwrap();
            assert!(change < 0.0, "{} should lower fair value", row.name);
            assert!(row.terminal_value_pct.unwrap() <= 65.0);
        }
        assert!(report.worst().is_some());
    }

    #[test]
    fn test_invalid_shock_reported_not_raised() {
        let shock = StressScenario::new("runaway growth", 1.0, 0.0, 0.08);
        let report = stress_test(&DcfModel::default(), &make_test_base(), &[shock]).unwrap();
        let row = &report.results[0];
        assert!(row.fair_value.is_none());
        assert!(row.error.as_deref().unwrap().contains("terminal growth"));
    }

    #[test]
    fn test_exit_multiple_compression() {
        let mut base = make_test_base();
        base.method = TerminalMethod::ExitMultiple;
        base.exit_multiple = 6.0;
        let shock = StressScenario::new("compression", 1.0, 0.0, 0.0).with_exit_multiple_multiplier(0.5);
        let report = stress_test(&DcfModel::default(), &base, &[shock]).unwrap();
        assert!(report.results[0].change_pct.unwrap() < 0.0);
    }
}
