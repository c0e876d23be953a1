//! Scenario regimes.
//!
//! Draws are structured around named regimes instead of noise around a
//! single point. The base regime keeps only 80% of the cleaned growth so
//! the centre of mass sits below the analyst figure.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValuationError};

/// Tolerance on the probability sum.
const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioLabel {
    Bear,
    Base,
    Bull,
}

impl std::fmt::Display for ScenarioLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bear => write!(f, "Bear"),
            Self::Base => write!(f, "Base"),
            Self::Bull => write!(f, "Bull"),
        }
    }
}

impl std::str::FromStr for ScenarioLabel {
    type Err = ValuationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bear" => Ok(Self::Bear),
            "base" => Ok(Self::Base),
            "bull" => Ok(Self::Bull),
            other => Err(ValuationError::configuration(format!(
                "unknown scenario label '{}'",
                other
            ))),
        }
    }
}

/// One regime and its multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub label: ScenarioLabel,
    pub probability: f64,
    pub growth_multiplier: f64,
    pub terminal_growth_multiplier: f64,
}

impl Scenario {
    pub const fn new(
        label: ScenarioLabel,
        probability: f64,
        growth_multiplier: f64,
        terminal_growth_multiplier: f64,
    ) -> Self {
        Self {
            label,
            probability,
            growth_multiplier,
            terminal_growth_multiplier,
        }
    }
}

/// Validated categorical distribution over regimes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSet {
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    /// Bear 20% / Base 60% / Bull 20%.
    pub fn standard() -> Self {
        Self {
            scenarios: vec![
                Scenario::new(ScenarioLabel::Bear, 0.20, 0.50, 0.60),
                Scenario::new(ScenarioLabel::Base, 0.60, 0.80, 1.00),
                Scenario::new(ScenarioLabel::Bull, 0.20, 1.20, 1.20),
            ],
        }
    }

    /// Build a custom set. Probabilities must be non-negative and sum to 1.
    pub fn new(scenarios: Vec<Scenario>) -> Result<Self> {
        if scenarios.is_empty() {
            return Err(ValuationError::configuration("scenario set is empty"));
        }
        for s in &scenarios {
            if !(s.probability.is_finite() && s.probability >= 0.0) {
                return Err(ValuationError::configuration(format!(
                    "{} probability must be non-negative, got {}",
                    s.label, s.probability
                )));
            }
            if !s.growth_multiplier.is_finite() || !s.terminal_growth_multiplier.is_finite() {
                return Err(ValuationError::configuration(format!(
                    "{} multipliers must be finite",
                    s.label
                )));
            }
        }
        let total: f64 = scenarios.iter().map(|s| s.probability).sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ValuationError::configuration(format!(
                "scenario probabilities sum to {}, expected 1",
                total
            )));
        }
        Ok(Self { scenarios })
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Draw a regime from the categorical distribution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &Scenario {
        let u: f64 = rng.gen();
        let mut cumulative = 0.0;
        for s in &self.scenarios {
            cumulative += s.probability;
            if u < cumulative {
                return s;
            }
        }
        // u landed in the rounding gap above the last cumulative bound
        self.scenarios
            .iter()
            .rev()
            .find(|s| s.probability > 0.0)
            .unwrap_or(&self.scenarios[self.scenarios.len() - 1])
    }
}

impl Default for ScenarioSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'de> Deserialize<'de> for ScenarioSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            scenarios: Vec<Scenario>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.scenarios).map_err(serde::de::Error::custom)
    }
}
