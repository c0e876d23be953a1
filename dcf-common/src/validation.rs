//! Configuration validation for the DCF toolkit.
//!
//! Provides validation logic for configuration fields to ensure
//! all values are within ranges the valuation engine can use.

use thiserror::Error;

use crate::config::{Config, ObservabilityConfig, ScenarioWeights, SectorOverride, ValuationSection};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Some(ref valuation) = self.valuation {
            if let Err(e) = valuation.validate() {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.log_level.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "observability.log_level".into(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for ValuationSection {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Some(years) = self.forecast_years {
            if !(3..=10).contains(&years) {
                errors.push(invalid("valuation.forecast_years", "must be between 3 and 10"));
            }
        }

        if let Some(cap) = self.terminal_cap {
            if !(cap > 0.0 && cap < 1.0) {
                errors.push(invalid("valuation.terminal_cap", "must be in (0, 1)"));
            }
        }

        if let (Some(n), Some(min)) = (self.iterations, self.min_iterations) {
            if n < min {
                errors.push(ValidationError::Conflict {
                    reason: format!(
                        "valuation.iterations ({}) is below valuation.min_iterations ({})",
                        n, min
                    ),
                });
            }
        }

        for (field, sigma) in [
            ("valuation.growth_sigma", self.growth_sigma),
            ("valuation.terminal_growth_sigma", self.terminal_growth_sigma),
            ("valuation.wacc_sigma", self.wacc_sigma),
        ] {
            if let Some(s) = sigma {
                if !(s.is_finite() && s >= 0.0) {
                    errors.push(invalid(field, "must be a non-negative number"));
                }
            }
        }

        if let Some(floor) = self.wacc_floor {
            if !(floor > 0.0) {
                errors.push(invalid("valuation.wacc_floor", "must be positive"));
            }
        }

        if let (Some(low), Some(high)) = (self.cape_low_threshold, self.cape_high_threshold) {
            if low >= high {
                errors.push(ValidationError::Conflict {
                    reason: format!(
                        "valuation.cape_low_threshold ({}) must be below cape_high_threshold ({})",
                        low, high
                    ),
                });
            }
        }

        if let Some(width) = self.cape_ramp_width {
            if !(width > 0.0) {
                errors.push(invalid("valuation.cape_ramp_width", "must be positive"));
            }
        }

        if let Some(bound) = self.max_macro_adjustment {
            if !(bound.is_finite() && bound >= 0.0) {
                errors.push(invalid(
                    "valuation.max_macro_adjustment",
                    "must be a non-negative number",
                ));
            }
        }

        if let Some(weight) = self.growth_blend_weight {
            if !(0.0..=1.0).contains(&weight) {
                errors.push(invalid("valuation.growth_blend_weight", "must be in [0, 1]"));
            }
        }

        if let Some((lower, upper)) = self.assessment_bands {
            if !(0.0 <= lower && lower < upper && upper <= 1.0) {
                errors.push(invalid(
                    "valuation.assessment_bands",
                    "must satisfy 0 <= lower < upper <= 1",
                ));
            }
        }

        for (field, p) in [
            ("valuation.conviction_high_probability", self.conviction_high_probability),
            ("valuation.conviction_moderate_probability", self.conviction_moderate_probability),
            ("valuation.conviction_low_probability", self.conviction_low_probability),
        ] {
            if let Some(p) = p {
                if !(0.0..=1.0).contains(&p) {
                    errors.push(invalid(field, "must be in [0, 1]"));
                }
            }
        }

        if let Some(ref scenarios) = self.scenarios {
            if let Err(e) = validate_scenarios(scenarios) {
                errors.push(e);
            }
        }

        if let Some(ref sectors) = self.sectors {
            for (name, sector) in sectors {
                if let Err(e) = validate_sector(name, sector) {
                    errors.push(e);
                }
            }
        }

        collect(errors)
    }
}

fn validate_scenarios(scenarios: &[ScenarioWeights]) -> ValidationResult<()> {
    if scenarios.is_empty() {
        return Err(invalid("valuation.scenarios", "must not be empty"));
    }
    for s in scenarios {
        if !["bear", "base", "bull"].contains(&s.label.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "valuation.scenarios.label".into(),
                reason: format!("unknown regime '{}', expected bear, base or bull", s.label),
            });
        }
        if !(s.probability.is_finite() && s.probability >= 0.0) {
            return Err(invalid(
                "valuation.scenarios.probability",
                "must be a non-negative number",
            ));
        }
        if !(s.growth_multiplier.is_finite() && s.terminal_growth_multiplier.is_finite()) {
            return Err(invalid("valuation.scenarios", "multipliers must be finite"));
        }
    }
    let total: f64 = scenarios.iter().map(|s| s.probability).sum();
    if (total - 1.0).abs() > 1e-9 {
        return Err(ValidationError::Conflict {
            reason: format!("valuation.scenarios probabilities sum to {}, expected 1", total),
        });
    }
    Ok(())
}

fn validate_sector(name: &str, sector: &SectorOverride) -> ValidationResult<()> {
    let field = |f: &str| format!("valuation.sectors.{}.{}", name, f);

    if let (Some(prior), Some(max)) = (sector.growth_prior, sector.max_growth) {
        if prior > max {
            return Err(ValidationError::Conflict {
                reason: format!("{} ({}) exceeds max_growth ({})", field("growth_prior"), prior, max),
            });
        }
    }
    if let Some(multiple) = sector.exit_multiple {
        if !(multiple.is_finite() && multiple > 0.0) {
            return Err(ValidationError::InvalidValue {
                field: field("exit_multiple"),
                reason: "must be positive".into(),
            });
        }
    }
    if let Some(ref method) = sector.terminal_method {
        if !["perpetuity", "exit_multiple"].contains(&method.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: field("terminal_method"),
                reason: "must be perpetuity or exit_multiple".into(),
            });
        }
    }
    for (f, v) in [
        ("growth_prior", sector.growth_prior),
        ("max_growth", sector.max_growth),
        ("terminal_growth", sector.terminal_growth),
    ] {
        if let Some(v) = v {
            if !v.is_finite() {
                return Err(ValidationError::InvalidValue {
                    field: field(f),
                    reason: "must be a finite number".into(),
                });
            }
        }
    }
    Ok(())
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    if errors.is_empty() {
        Ok(())
    } else if errors.len() == 1 {
        Err(errors.remove(0))
    } else {
        Err(ValidationError::Multiple(errors))
    }
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}
