//! Conviction tiers.
//!
//! Tier from upside, simulation confidence and conflict severity:
//!
//! - **HighConviction**: upside > 15%, P(undervalued) > 0.75, conflict at most low
//! - **Moderate**: upside > 10%, P(undervalued) > 0.60
//! - **Speculative**: positive upside without the confidence above
//! - **Hold**: positive upside with P(undervalued) below the lower band, or
//!   non-positive upside with P(undervalued) at or above it
//! - **Pass**: non-positive upside and low P(undervalued)
//!
//! A high conflict caps the tier at Speculative, a medium one at Moderate.

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictSeverity;

/// Recommendation strength, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvictionTier {
    Pass,
    Hold,
    Speculative,
    Moderate,
    HighConviction,
}

impl std::fmt::Display for ConvictionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighConviction => write!(f, "HIGH CONVICTION"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::Speculative => write!(f, "SPECULATIVE"),
            Self::Hold => write!(f, "HOLD"),
            Self::Pass => write!(f, "PASS"),
        }
    }
}

/// Tier thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvictionConfig {
    pub high_upside_pct: f64,
    pub high_probability: f64,
    pub moderate_upside_pct: f64,
    pub moderate_probability: f64,
    /// Probability below which positive upside is not trusted
    pub low_probability: f64,
}

impl Default for ConvictionConfig {
    fn default() -> Self {
        Self {
            high_upside_pct: 15.0,
            high_probability: 0.75,
            moderate_upside_pct: 10.0,
            moderate_probability: 0.60,
            low_probability: 0.35,
        }
    }
}

impl ConvictionConfig {
    /// Classify a valuation.
    pub fn classify(
        &self,
        upside_pct: f64,
        probability_undervalued: f64,
        conflict: ConflictSeverity,
    ) -> ConvictionTier {
        let tier = if upside_pct > self.high_upside_pct
            && probability_undervalued > self.high_probability
            && conflict <= ConflictSeverity::Low
        {
            ConvictionTier::HighConviction
        } else if upside_pct > self.moderate_upside_pct
            && probability_undervalued > self.moderate_probability
        {
            ConvictionTier::Moderate
        } else if upside_pct > 0.0 {
            if probability_undervalued < self.low_probability {
                ConvictionTier::Hold
            } else {
                ConvictionTier::Speculative
            }
        } else if probability_undervalued >= self.low_probability {
            ConvictionTier::Hold
        } else {
            ConvictionTier::Pass
        };

        match conflict {
            ConflictSeverity::High => tier.min(ConvictionTier::Speculative),
            ConflictSeverity::Medium => tier.min(ConvictionTier::Moderate),
            _ => tier,
        }
    }
}
