//! Sector priors.
//!
//! Per-sector growth priors, growth ceilings, terminal growth rates and exit
//! multiples. The table is built once and handed to the orchestrator as a
//! read-only `Arc<SectorPriors>`; refreshing it means building a new table
//! between batches.
//!
//! The numbers are empirically tuned defaults, not derivations. Callers
//! that have better priors (e.g. a cached academic dataset) build their own
//! table with [`SectorPriors::from_profiles`].

use dcf_common::{SectorOverride, ValuationSection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, ValuationError};
use crate::valuation::TerminalMethod;

/// Assumptions attached to one sector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorProfile {
    /// Long-run growth expected for a typical company in the sector
    pub growth_prior: f64,
    /// Growth ceiling applied after cleaning
    pub max_growth: f64,
    /// Perpetual growth after the explicit window
    pub terminal_growth: f64,
    /// Exit multiple on final-year free cash flow
    pub exit_multiple: f64,
    /// Terminal value method used when the caller does not choose one
    pub terminal_method: TerminalMethod,
}

impl SectorProfile {
    const fn new(
        growth_prior: f64,
        max_growth: f64,
        terminal_growth: f64,
        exit_multiple: f64,
        terminal_method: TerminalMethod,
    ) -> Self {
        Self {
            growth_prior,
            max_growth,
            terminal_growth,
            exit_multiple,
            terminal_method,
        }
    }
}

/// Profile used for sectors missing from the table.
pub const DEFAULT_PROFILE: SectorProfile =
    SectorProfile::new(0.08, 0.30, 0.025, 12.0, TerminalMethod::Perpetuity);

const STANDARD_PROFILES: &[(&str, SectorProfile)] = &[
    ("Technology", SectorProfile::new(0.15, 0.35, 0.030, 20.0, TerminalMethod::ExitMultiple)),
    ("Communication Services", SectorProfile::new(0.10, 0.25, 0.025, 15.0, TerminalMethod::ExitMultiple)),
    ("Healthcare", SectorProfile::new(0.08, 0.25, 0.025, 16.0, TerminalMethod::ExitMultiple)),
    ("Consumer Cyclical", SectorProfile::new(0.07, 0.20, 0.025, 12.0, TerminalMethod::Perpetuity)),
    ("Consumer Defensive", SectorProfile::new(0.05, 0.12, 0.020, 14.0, TerminalMethod::Perpetuity)),
    ("Industrials", SectorProfile::new(0.06, 0.15, 0.025, 12.0, TerminalMethod::Perpetuity)),
    ("Financial Services", SectorProfile::new(0.06, 0.15, 0.025, 10.0, TerminalMethod::Perpetuity)),
    ("Energy", SectorProfile::new(0.04, 0.15, 0.020, 8.0, TerminalMethod::Perpetuity)),
    ("Utilities", SectorProfile::new(0.03, 0.08, 0.020, 10.0, TerminalMethod::Perpetuity)),
    ("Real Estate", SectorProfile::new(0.04, 0.10, 0.020, 16.0, TerminalMethod::Perpetuity)),
    ("Basic Materials", SectorProfile::new(0.04, 0.12, 0.020, 9.0, TerminalMethod::Perpetuity)),
];

/// Read-only sector lookup table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorPriors {
    profiles: HashMap<String, SectorProfile>,
    default_profile: SectorProfile,
}

impl SectorPriors {
    /// Built-in table covering the standard GICS-style sectors.
    pub fn standard() -> Self {
        Self::from_profiles(
            STANDARD_PROFILES
                .iter()
                .map(|(name, profile)| (name.to_string(), *profile)),
            DEFAULT_PROFILE,
        )
    }

    /// Build a table from explicit profiles.
    pub fn from_profiles(
        profiles: impl IntoIterator<Item = (String, SectorProfile)>,
        default_profile: SectorProfile,
    ) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|(name, profile)| (normalize(&name), profile))
                .collect(),
            default_profile,
        }
    }

    /// Standard table with the config file's sector overrides applied.
    ///
    /// An override for an unknown sector starts from the default profile.
    pub fn from_section(section: Option<&ValuationSection>) -> Result<Self> {
        let mut priors = Self::standard();
        let Some(sectors) = section.and_then(|s| s.sectors.as_ref()) else {
            return Ok(priors);
        };
        for (name, sector) in sectors {
            let base = *priors.profile(Some(name));
            let profile = apply_override(base, sector).map_err(|e| {
                ValuationError::configuration(format!("sector '{}': {}", name, e))
            })?;
            priors.profiles.insert(normalize(name), profile);
        }
        Ok(priors)
    }

    /// Profile for a sector, falling back to the default profile.
    pub fn profile(&self, sector: Option<&str>) -> &SectorProfile {
        sector
            .and_then(|s| self.profiles.get(&normalize(s)))
            .unwrap_or(&self.default_profile)
    }

    /// Whether the sector has its own entry.
    pub fn contains(&self, sector: &str) -> bool {
        self.profiles.contains_key(&normalize(sector))
    }

    /// Number of sectors with their own entry.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the table only holds the default profile.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for SectorPriors {
    fn default() -> Self {
        Self::standard()
    }
}

fn apply_override(mut profile: SectorProfile, sector: &SectorOverride) -> Result<SectorProfile> {
    if let Some(v) = sector.growth_prior {
        profile.growth_prior = v;
    }
    if let Some(v) = sector.max_growth {
        profile.max_growth = v;
    }
    if let Some(v) = sector.terminal_growth {
        profile.terminal_growth = v;
    }
    if let Some(v) = sector.exit_multiple {
        profile.exit_multiple = v;
    }
    if let Some(ref method) = sector.terminal_method {
        profile.terminal_method = method.parse()?;
    }
    if profile.growth_prior > profile.max_growth {
        return Err(ValuationError::configuration(format!(
            "growth prior {} above ceiling {}",
            profile.growth_prior, profile.max_growth
        )));
    }
    Ok(profile)
}

fn normalize(sector: &str) -> String {
    sector.trim().to_lowercase()
}
