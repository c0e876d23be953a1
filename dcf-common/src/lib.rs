//! DCF Common - Shared configuration, validation and logging for the DCF toolkit.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Logging setup and run ID helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod validation;

pub use config::{Config, ObservabilityConfig, ScenarioWeights, SectorOverride, ValuationSection};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ValuationSection};
    pub use crate::logging::{generate_run_id, init_logging};
    pub use crate::validation::{Validate, ValidationError};
}
