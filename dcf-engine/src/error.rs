//! Error types for the valuation engine.

use thiserror::Error;

use crate::orchestrator::Stage;

/// Result type alias using the valuation error type.
pub type Result<T> = std::result::Result<T, ValuationError>;

/// Valuation error taxonomy.
///
/// Validation and configuration errors stop a valuation immediately;
/// nothing is silently defaulted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    /// Malformed or missing fundamentals
    #[error("Validation error on {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Invalid model parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Numerical divergence not caught by validation
    #[error("Computation error: {0}")]
    Computation(String),

    /// External cancellation observed between stages
    #[error("Valuation cancelled")]
    Cancelled,
}

impl ValuationError {
    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a computation error.
    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    /// Check if this is a configuration error.
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a validation error.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Attach the failing pipeline stage.
    pub fn at(self, ticker: impl Into<String>, stage: Stage) -> PipelineError {
        PipelineError {
            ticker: ticker.into(),
            stage,
            source: self,
        }
    }
}

/// A valuation that aborted before producing a result.
///
/// `stage` is the pipeline state that could not be reached.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("[{ticker}] valuation failed at {stage}: {source}")]
pub struct PipelineError {
    pub ticker: String,
    pub stage: Stage,
    #[source]
    pub source: ValuationError,
}

/// Errors reported by external collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Requested data does not exist for the ticker
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Collaborator answered with something unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Collaborator is temporarily unavailable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_names_stage() {
        let err = ValuationError::configuration("wacc <= terminal growth")
            .at("AAPL", Stage::TerminalCapped);
        let msg = err.to_string();
        assert!(msg.contains("AAPL"));
        assert!(msg.contains("TERMINAL_CAPPED"));
        assert!(msg.contains("wacc <= terminal growth"));
        assert!(err.source.is_configuration());
    }

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Unavailable("timeout".into()).is_recoverable());
        assert!(!ProviderError::DataNotAvailable("no fcf".into()).is_recoverable());
    }
}
