//! Aggregation of Monte Carlo draws.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use super::scenario::ScenarioLabel;

/// Reading of `probability_undervalued` against the assessment bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    OvervaluedLeaning,
    Neutral,
    UndervaluedLeaning,
}

impl Assessment {
    /// Band a probability: below `lower` leans overvalued, above `upper`
    /// leans undervalued.
    pub fn from_probability(probability: f64, lower: f64, upper: f64) -> Self {
        if probability < lower {
            Self::OvervaluedLeaning
        } else if probability > upper {
            Self::UndervaluedLeaning
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OvervaluedLeaning => write!(f, "Overvalued-leaning"),
            Self::Neutral => write!(f, "Neutral"),
            Self::UndervaluedLeaning => write!(f, "Undervalued-leaning"),
        }
    }
}

/// Distribution of fair values from one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub iterations_requested: usize,
    pub draws_used: usize,
    /// Draws left out of aggregation (sum of the two breakdowns below)
    pub excluded_draws: usize,
    /// Draws where no attempt satisfied `wacc > terminal growth`
    pub excluded_invariant: usize,
    /// Draws whose valuation was not a finite number
    pub excluded_non_finite: usize,
    /// Seed that reproduces this run
    pub seed: u64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub p5: f64,
    pub p10: f64,
    pub p90: f64,
    pub p95: f64,
    /// Fraction of used draws above the current price
    pub probability_undervalued: f64,
    pub assessment: Assessment,
    /// Used draws per regime
    pub scenario_counts: BTreeMap<ScenarioLabel, usize>,
}

impl MonteCarloSummary {
    /// Share of requested iterations that were excluded.
    pub fn exclusion_rate(&self) -> f64 {
        if self.iterations_requested == 0 {
            return 0.0;
        }
        self.excluded_draws as f64 / self.iterations_requested as f64
    }

    /// Frequency of a regime among used draws.
    pub fn scenario_frequency(&self, label: ScenarioLabel) -> f64 {
        if self.draws_used == 0 {
            return 0.0;
        }
        self.scenario_counts.get(&label).copied().unwrap_or(0) as f64 / self.draws_used as f64
    }
}

/// Distribution moments and percentiles of a non-empty sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DistributionStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p5: f64,
    pub p10: f64,
    pub p90: f64,
    pub p95: f64,
}

impl DistributionStats {
    /// Returns `None` for an empty sample.
    pub(crate) fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let std_dev = if values.len() > 1 {
            values.iter().population_std_dev()
        } else {
            0.0
        };

        Some(Self {
            mean: values.iter().mean(),
            median: percentile(&sorted, 0.50),
            std_dev,
            p5: percentile(&sorted, 0.05),
            p10: percentile(&sorted, 0.10),
            p90: percentile(&sorted, 0.90),
            p95: percentile(&sorted, 0.95),
        })
    }
}

/// Linear-interpolation percentile of sorted data, `q` in [0, 1].
pub(crate) fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let weight = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * weight
        }
    }
}

/// Fraction of values strictly above `price`.
pub(crate) fn probability_above(values: &[f64], price: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&v| v > price).count() as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 0.5), 3.0);
        assert_eq!(percentile(&sorted, 1.0), 5.0);
        assert!((percentile(&sorted, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_stats() {
        let stats = DistributionStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert!((stats.median - 4.5).abs() < 1e-12);
        assert!(stats.p5 <= stats.p10 && stats.p10 <= stats.median);
        assert!(stats.median <= stats.p90 && stats.p90 <= stats.p95);
    }

    #[test]
    fn test_empty_stats() {
        assert!(DistributionStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_probability_above() {
        let values = [90.0, 100.0, 110.0, 120.0];
        assert!((probability_above(&values, 100.0) - 0.5).abs() < 1e-12);
        assert_eq!(probability_above(&[], 100.0), 0.0);
    }

    #[test]
    fn test_assessment_bands() {
        assert_eq!(Assessment::from_probability(0.2, 0.35, 0.65), Assessment::OvervaluedLeaning);
        assert_eq!(Assessment::from_probability(0.5, 0.35, 0.65), Assessment::Neutral);
        assert_eq!(Assessment::from_probability(0.8, 0.35, 0.65), Assessment::UndervaluedLeaning);
    }
}
