//! Deterministic scenario analysis.
//!
//! Values each regime of a [`ScenarioSet`] at its multipliers with no noise,
//! so the bear, base and bull cases can be read side by side with the
//! simulated distribution.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::simulation::{Scenario, ScenarioLabel, ScenarioSet};
use crate::valuation::{DcfModel, DcfParameters};

/// One regime valued deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioCase {
    pub label: ScenarioLabel,
    pub probability: f64,
    pub growth: f64,
    pub terminal_growth: f64,
    pub fair_value: Option<f64>,
    /// Terminal share of enterprise value after the cap (%)
    pub terminal_value_pct: Option<f64>,
    /// Why the regime could not be valued
    pub error: Option<String>,
}

/// Base case plus one row per regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAnalysis {
    pub base_fair_value: f64,
    pub cases: Vec<ScenarioCase>,
    /// Probability-weighted fair value over the valued regimes,
    /// renormalised by `coverage`
    pub weighted_fair_value: Option<f64>,
    /// Total probability of the regimes that could be valued
    pub coverage: f64,
}

impl ScenarioAnalysis {
    pub fn case(&self, label: ScenarioLabel) -> Option<&ScenarioCase> {
        self.cases.iter().find(|c| c.label == label)
    }

    /// Lowest and highest regime fair values.
    pub fn range(&self) -> Option<(f64, f64)> {
        let values = self.cases.iter().filter_map(|c| c.fair_value);
        values.fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

fn apply(scenario: &Scenario, base: &DcfParameters) -> DcfParameters {
    DcfParameters {
        growth: base.growth * scenario.growth_multiplier,
        terminal_growth: base.terminal_growth * scenario.terminal_growth_multiplier,
        ..*base
    }
}

/// Value every regime of `scenarios` against `base`. Fails only when the
/// base case does; a regime that breaks `wacc > terminal growth` is
/// reported in its row.
pub fn scenario_analysis(
    model: &DcfModel,
    base: &DcfParameters,
    scenarios: &ScenarioSet,
) -> Result<ScenarioAnalysis> {
    let base_fair_value = model.value(base)?.fair_value_per_share;

    let cases: Vec<ScenarioCase> = scenarios
        .scenarios()
        .iter()
        .map(|scenario| {
            let params = apply(scenario, base);
            let mut case = ScenarioCase {
                label: scenario.label,
                probability: scenario.probability,
                growth: params.growth,
                terminal_growth: params.terminal_growth,
                fair_value: None,
                terminal_value_pct: None,
                error: None,
            };
            match model.value(&params) {
                Ok(dcf) => {
                    case.fair_value = Some(dcf.fair_value_per_share);
                    case.terminal_value_pct = Some(dcf.terminal.pct_of_ev * 100.0);
                }
                Err(e) => {
                    tracing::debug!(scenario = %scenario.label, error = %e, "Regime not valued");
                    case.error = Some(e.to_string());
                }
            }
            case
        })
        .collect();

    let (coverage, weighted) = cases
        .iter()
        .filter_map(|c| c.fair_value.map(|v| (c.probability, v)))
        .fold((0.0, 0.0), |(p, w), (prob, v)| (p + prob, w + prob * v));
    let weighted_fair_value = (coverage > 0.0).then(|| weighted / coverage);

    Ok(ScenarioAnalysis {
        base_fair_value,
        cases,
        weighted_fair_value,
        coverage,
    })
}
