//! Conflict detection between the DCF and an independent relative-valuation
//! signal.
//!
//! | Severity | Condition                                                     |
//! |----------|---------------------------------------------------------------|
//! | High     | upside > +threshold and relative says overvalued, or mirror   |
//! | Medium   | PEG > peg threshold while the DCF is bullish                  |
//! | Low      | signals disagree in direction but the DCF move is modest      |
//! | None     | signals agree, or either side is neutral                      |

use serde::{Deserialize, Serialize};

/// Direction reported by the relative-valuation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeSignal {
    Undervalued,
    Overvalued,
    Neutral,
}

impl std::fmt::Display for RelativeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undervalued => write!(f, "undervalued"),
            Self::Overvalued => write!(f, "overvalued"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Relative-valuation collaborator output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeValuation {
    pub signal: RelativeSignal,
    #[serde(default)]
    pub peg_ratio: Option<f64>,
}

impl Default for RelativeValuation {
    fn default() -> Self {
        Self {
            signal: RelativeSignal::Neutral,
            peg_ratio: None,
        }
    }
}

/// Conflict severity, ordered from none to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    None,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Severity with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictVerdict {
    pub severity: ConflictSeverity,
    pub rationale: String,
}

/// Conflict thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Upside (%) that counts as a strong DCF signal
    pub upside_threshold_pct: f64,
    /// PEG above which growth is considered priced in
    pub peg_threshold: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            upside_threshold_pct: 15.0,
            peg_threshold: 2.0,
        }
    }
}

/// Stateless conflict detector.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    config: ConflictConfig,
}

impl ConflictDetector {
    pub fn new(config: ConflictConfig) -> Self {
        Self { config }
    }

    /// Compare DCF upside (%) with the relative signal and PEG.
    pub fn detect(
        &self,
        dcf_upside_pct: f64,
        relative_signal: RelativeSignal,
        peg_ratio: Option<f64>,
    ) -> ConflictVerdict {
        let threshold = self.config.upside_threshold_pct;

        match relative_signal {
            RelativeSignal::Overvalued if dcf_upside_pct > threshold => {
                return verdict(
                    ConflictSeverity::High,
                    format!(
                        "DCF shows {:+.1}% upside but relative valuation says overvalued",
                        dcf_upside_pct
                    ),
                );
            }
            RelativeSignal::Undervalued if dcf_upside_pct < -threshold => {
                return verdict(
                    ConflictSeverity::High,
                    format!(
                        "DCF shows {:+.1}% downside but relative valuation says undervalued",
                        dcf_upside_pct
                    ),
                );
            }
            _ => {}
        }

        if let Some(peg) = peg_ratio.filter(|p| p.is_finite()) {
            if peg > self.config.peg_threshold && dcf_upside_pct > 0.0 {
                return verdict(
                    ConflictSeverity::Medium,
                    format!(
                        "PEG {:.2} above {:.1} while DCF is bullish, growth may be priced in",
                        peg, self.config.peg_threshold
                    ),
                );
            }
        }

        let mild = match relative_signal {
            RelativeSignal::Overvalued => dcf_upside_pct > 0.0,
            RelativeSignal::Undervalued => dcf_upside_pct < 0.0,
            RelativeSignal::Neutral => false,
        };
        if mild {
            return verdict(
                ConflictSeverity::Low,
                format!(
                    "DCF ({:+.1}%) and relative valuation ({}) disagree mildly",
                    dcf_upside_pct, relative_signal
                ),
            );
        }

        verdict(ConflictSeverity::None, "DCF and relative valuation agree".to_string())
    }
}

fn verdict(severity: ConflictSeverity, rationale: String) -> ConflictVerdict {
    ConflictVerdict {
        severity,
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(20.0, RelativeSignal::Overvalued, None => ConflictSeverity::High ; "bullish dcf vs overvalued")]
    #[test_case(-20.0, RelativeSignal::Undervalued, None => ConflictSeverity::High ; "bearish dcf vs undervalued")]
    #[test_case(25.0, RelativeSignal::Undervalued, Some(2.5) => ConflictSeverity::Medium ; "growth priced in")]
    #[test_case(10.0, RelativeSignal::Overvalued, None => ConflictSeverity::Low ; "mild disagreement")]
    #[test_case(-5.0, RelativeSignal::Undervalued, Some(1.0) => ConflictSeverity::Low ; "mild bearish disagreement")]
    #[test_case(20.0, RelativeSignal::Undervalued, Some(1.2) => ConflictSeverity::None ; "both bullish")]
    #[test_case(-20.0, RelativeSignal::Overvalued, None => ConflictSeverity::None ; "both bearish")]
    #[test_case(0.0, RelativeSignal::Neutral, None => ConflictSeverity::None ; "both neutral")]
    #[test_case(-10.0, RelativeSignal::Neutral, Some(3.0) => ConflictSeverity::None ; "high peg but bearish")]
    fn test_detect(upside: f64, signal: RelativeSignal, peg: Option<f64>) -> ConflictSeverity {
        ConflictDetector::default().detect(upside, signal, peg).severity
    }

    #[test]
    fn test_high_conflict_has_rationale() {
        let v = ConflictDetector::default().detect(20.0, RelativeSignal::Overvalued, None);
        assert!(v.rationale.contains("overvalued"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ConflictSeverity::High > ConflictSeverity::Medium);
        assert!(ConflictSeverity::Low > ConflictSeverity::None);
    }
}
