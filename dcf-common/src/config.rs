//! Configuration management for the DCF toolkit.
//!
//! The toolkit reads a single configuration file at `~/.dcf/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (DCF_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `DCF_LOG_LEVEL` → observability.log_level
//! - `DCF_LOG_FORMAT` → observability.log_format
//! - `DCF_MC_ITERATIONS` → valuation.iterations
//! - `DCF_MC_SEED` → valuation.seed
//! - `DCF_TERMINAL_CAP` → valuation.terminal_cap
//! - `DCF_RISK_FREE_RATE` → valuation.risk_free_rate

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".dcf"),
        |dirs| dirs.home_dir().join(".dcf"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Valuation engine overrides.
    ///
    /// Every field is optional; the engine falls back to its own defaults.
    #[serde(default)]
    pub valuation: Option<ValuationSection>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("DCF_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("DCF_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Ok(raw) = std::env::var("DCF_MC_ITERATIONS") {
            if let Ok(n) = raw.parse() {
                self.valuation_mut().iterations = Some(n);
            }
        }
        if let Ok(raw) = std::env::var("DCF_MC_SEED") {
            if let Ok(seed) = raw.parse() {
                self.valuation_mut().seed = Some(seed);
            }
        }
        if let Ok(raw) = std::env::var("DCF_TERMINAL_CAP") {
            if let Ok(cap) = raw.parse() {
                self.valuation_mut().terminal_cap = Some(cap);
            }
        }
        if let Ok(raw) = std::env::var("DCF_RISK_FREE_RATE") {
            if let Ok(rate) = raw.parse() {
                self.valuation_mut().risk_free_rate = Some(rate);
            }
        }
    }

    /// Valuation section, created empty on first access.
    pub fn valuation_mut(&mut self) -> &mut ValuationSection {
        self.valuation.get_or_insert_with(ValuationSection::default)
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to exclude from logging.
    ///
    /// These modules will be set to `warn` level to reduce noise.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Valuation Section
// ============================================================================

/// Valuation engine overrides.
///
/// Rates are decimals (0.09 = 9%). Upside thresholds are percentages
/// (15.0 = +15%), matching how upside is reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationSection {
    /// Explicit forecast window in years (3-10)
    #[serde(default)]
    pub forecast_years: Option<u32>,

    /// Maximum share of enterprise value attributable to terminal value
    #[serde(default)]
    pub terminal_cap: Option<f64>,

    /// Monte Carlo iterations per valuation
    #[serde(default)]
    pub iterations: Option<usize>,

    /// Iteration count below which percentiles are rejected as unreliable
    #[serde(default)]
    pub min_iterations: Option<usize>,

    /// RNG seed for reproducible simulations
    #[serde(default)]
    pub seed: Option<u64>,

    /// Resample attempts before an invariant-violating draw is excluded
    #[serde(default)]
    pub max_resample_attempts: Option<u32>,

    /// Relative noise on sampled growth
    #[serde(default)]
    pub growth_sigma: Option<f64>,

    /// Relative noise on sampled terminal growth
    #[serde(default)]
    pub terminal_growth_sigma: Option<f64>,

    /// Relative noise on sampled WACC
    #[serde(default)]
    pub wacc_sigma: Option<f64>,

    /// Lowest discount rate ever used
    #[serde(default)]
    pub wacc_floor: Option<f64>,

    /// Default risk-free rate when the macro provider has none
    #[serde(default)]
    pub risk_free_rate: Option<f64>,

    /// Default equity risk premium when the macro provider has none
    #[serde(default)]
    pub equity_risk_premium: Option<f64>,

    /// CAPE below which the market is considered cheap
    #[serde(default)]
    pub cape_low_threshold: Option<f64>,

    /// CAPE above which the market is considered expensive
    #[serde(default)]
    pub cape_high_threshold: Option<f64>,

    /// CAPE distance beyond a threshold at which the macro adjustment saturates
    #[serde(default)]
    pub cape_ramp_width: Option<f64>,

    /// Absolute bound on the macro WACC adjustment
    #[serde(default)]
    pub max_macro_adjustment: Option<f64>,

    /// Growth above which analyst estimates are blended with the prior
    #[serde(default)]
    pub growth_stretch_upper: Option<f64>,

    /// Growth below which analyst estimates are blended with the prior
    #[serde(default)]
    pub growth_stretch_lower: Option<f64>,

    /// Absolute growth beyond which analyst estimates are discarded
    #[serde(default)]
    pub growth_hard_ceiling: Option<f64>,

    /// Weight of the analyst estimate inside the stretch zone
    #[serde(default)]
    pub growth_blend_weight: Option<f64>,

    /// Probability-undervalued bands (lower, upper)
    #[serde(default)]
    pub assessment_bands: Option<(f64, f64)>,

    /// Upside (%) considered a strong DCF signal
    #[serde(default)]
    pub conflict_upside_pct: Option<f64>,

    /// PEG above which growth is considered priced in
    #[serde(default)]
    pub conflict_peg_threshold: Option<f64>,

    /// Upside (%) required for the top conviction tier
    #[serde(default)]
    pub conviction_high_upside_pct: Option<f64>,

    /// Probability undervalued required for the top conviction tier
    #[serde(default)]
    pub conviction_high_probability: Option<f64>,

    /// Upside (%) required for the moderate tier
    #[serde(default)]
    pub conviction_moderate_upside_pct: Option<f64>,

    /// Probability undervalued required for the moderate tier
    #[serde(default)]
    pub conviction_moderate_probability: Option<f64>,

    /// Probability below which positive upside is not trusted
    #[serde(default)]
    pub conviction_low_probability: Option<f64>,

    /// Replacement scenario table (bear / base / bull)
    #[serde(default)]
    pub scenarios: Option<Vec<ScenarioWeights>>,

    /// Per-sector overrides, keyed by sector name
    #[serde(default)]
    pub sectors: Option<HashMap<String, SectorOverride>>,
}

/// One regime of the Monte Carlo scenario table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioWeights {
    /// `bear`, `base` or `bull`
    pub label: String,
    pub probability: f64,
    pub growth_multiplier: f64,
    pub terminal_growth_multiplier: f64,
}

/// Partial override of a sector profile.
///
/// Unset fields keep the built-in value for the sector (or the default
/// profile when the sector is new).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorOverride {
    #[serde(default)]
    pub growth_prior: Option<f64>,

    /// Growth ceiling applied after cleaning
    #[serde(default)]
    pub max_growth: Option<f64>,

    #[serde(default)]
    pub terminal_growth: Option<f64>,

    #[serde(default)]
    pub exit_multiple: Option<f64>,

    /// `perpetuity` or `exit_multiple`
    #[serde(default)]
    pub terminal_method: Option<String>,
}
