//! Growth estimator.
//!
//! Cleans raw analyst growth by blending it with the sector prior:
//!
//! | Raw estimate                          | Treatment                      |
//! |---------------------------------------|--------------------------------|
//! | missing, NaN, or `|raw| > ceiling`    | discarded, sector prior used   |
//! | outside the inner bands (stretch zone)| `w * raw + (1 - w) * prior`    |
//! | inside the inner bands                | used unmodified                |
//!
//! The result is then capped at the sector growth ceiling.

use serde::{Deserialize, Serialize};

/// Growth cleaning thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthConfig {
    /// Absolute growth beyond which an estimate is implausible
    pub hard_ceiling: f64,
    /// Upper edge of the band where estimates are used as-is
    pub stretch_upper: f64,
    /// Lower edge of the band where estimates are used as-is
    pub stretch_lower: f64,
    /// Weight on the raw estimate inside the stretch zone
    pub blend_weight: f64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            hard_ceiling: 1.0,
            stretch_upper: 0.50,
            stretch_lower: -0.20,
            blend_weight: 0.7,
        }
    }
}

/// Where the cleaned growth came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrowthSource {
    /// Analyst estimate used unmodified
    Analyst,
    /// Analyst estimate blended with the sector prior
    Blended,
    /// Sector prior (estimate missing or implausible)
    SectorPrior,
}

impl std::fmt::Display for GrowthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analyst => write!(f, "analyst"),
            Self::Blended => write!(f, "blended"),
            Self::SectorPrior => write!(f, "sector prior"),
        }
    }
}

/// Cleaned growth assumption for one valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthAssumption {
    /// Raw analyst estimate as received
    pub raw: Option<f64>,
    /// Sector prior
    pub sector_prior: f64,
    /// Sector ceiling
    pub sector_max: f64,
    /// Growth used downstream
    pub blended: f64,
    /// How `blended` was produced before the ceiling
    pub source: GrowthSource,
    /// Raw estimate was discarded as missing or implausible
    pub discarded: bool,
    /// Result was capped at the sector ceiling
    pub clamped: bool,
}

/// Growth estimator.
#[derive(Debug, Clone, Default)]
pub struct GrowthEstimator {
    config: GrowthConfig,
}

impl GrowthEstimator {
    /// Create an estimator with custom thresholds.
    pub fn new(config: GrowthConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use.
    pub fn config(&self) -> &GrowthConfig {
        &self.config
    }

    /// Clean a raw analyst growth estimate.
    ///
    /// Pure: the same inputs always produce the same assumption and
    /// warnings.
    pub fn clean_growth(
        &self,
        raw: Option<f64>,
        sector_prior: f64,
        sector_max: f64,
    ) -> (GrowthAssumption, Vec<String>) {
        let mut warnings = Vec::new();
        let cfg = &self.config;

        let (growth, source, discarded) = match raw {
            None => {
                warnings.push(format!(
                    "No analyst growth, using sector prior {:.1}%",
                    sector_prior * 100.0
                ));
                (sector_prior, GrowthSource::SectorPrior, true)
            }
            Some(g) if !g.is_finite() || g.abs() > cfg.hard_ceiling => {
                warnings.push(format!(
                    "Implausible analyst growth {:.1}% discarded, using sector prior {:.1}%",
                    g * 100.0,
                    sector_prior * 100.0
                ));
                (sector_prior, GrowthSource::SectorPrior, true)
            }
            Some(g) if g > cfg.stretch_upper || g < cfg.stretch_lower => {
                let blended = cfg.blend_weight * g + (1.0 - cfg.blend_weight) * sector_prior;
                warnings.push(format!(
                    "Analyst growth {:.1}% blended with sector prior {:.1}% to {:.1}%",
                    g * 100.0,
                    sector_prior * 100.0,
                    blended * 100.0
                ));
                (blended, GrowthSource::Blended, false)
            }
            Some(g) => (g, GrowthSource::Analyst, false),
        };

        let clamped = growth > sector_max;
        let blended = if clamped {
            warnings.push(format!(
                "Growth {:.1}% capped at sector maximum {:.1}%",
                growth * 100.0,
                sector_max * 100.0
            ));
            sector_max
        } else {
            growth
        };

        (
            GrowthAssumption {
                raw,
                sector_prior,
                sector_max,
                blended,
                source,
                discarded,
                clamped,
            },
            warnings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inner_band_used_unmodified() {
        let est = GrowthEstimator::default();
        let (g, warnings) = est.clean_growth(Some(0.10), 0.15, 0.35);
        assert_eq!(g.blended, 0.10);
        assert_eq!(g.source, GrowthSource::Analyst);
        assert!(!g.clamped);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_stretch_zone_blends() {
        let est = GrowthEstimator::default();
        let (g, warnings) = est.clean_growth(Some(0.60), 0.15, 0.80);
        // 0.7 * 0.60 + 0.3 * 0.15
        assert!((g.blended - 0.465).abs() < 1e-12);
        assert_eq!(g.source, GrowthSource::Blended);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_negative_stretch_zone_blends() {
        let est = GrowthEstimator::default();
        let (g, _) = est.clean_growth(Some(-0.40), 0.05, 0.30);
        assert!((g.blended - (0.7 * -0.40 + 0.3 * 0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_implausible_discarded() {
        let est = GrowthEstimator::default();
        let (g, warnings) = est.clean_growth(Some(1.8), 0.08, 0.30);
        assert_eq!(g.blended, 0.08);
        assert!(g.discarded);
        assert_eq!(g.source, GrowthSource::SectorPrior);
        assert!(warnings[0].contains("Implausible"));

        let (g, _) = est.clean_growth(Some(f64::NAN), 0.08, 0.30);
        assert_eq!(g.blended, 0.08);
    }

    #[test]
    fn test_missing_uses_prior() {
        let est = GrowthEstimator::default();
        let (g, warnings) = est.clean_growth(None, 0.06, 0.15);
        assert_eq!(g.blended, 0.06);
        assert!(g.discarded);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_sector_ceiling_clamps_with_warning() {
        let est = GrowthEstimator::default();
        let (g, warnings) = est.clean_growth(Some(0.40), 0.15, 0.35);
        assert_eq!(g.blended, 0.35);
        assert!(g.clamped);
        assert!(warnings.iter().any(|w| w.contains("capped")));
    }

    proptest! {
        #[test]
        fn prop_clean_growth_is_pure(
            raw in proptest::option::of(-2.0f64..2.0),
            prior in -0.1f64..0.3,
            max in 0.0f64..0.6,
        ) {
            let est = GrowthEstimator::default();
            let first = est.clean_growth(raw, prior, max);
            let second = est.clean_growth(raw, prior, max);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_never_exceeds_sector_max(
            raw in proptest::option::of(-2.0f64..2.0),
            prior in -0.1f64..0.3,
            max in 0.0f64..0.6,
        ) {
            let est = GrowthEstimator::default();
            let (g, _) = est.clean_growth(raw, prior, max);
            prop_assert!(g.blended <= max);
        }
    }
}
