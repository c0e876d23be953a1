//! Collaborator interfaces.
//!
//! Fundamentals, macro rates and the relative-valuation signal come from
//! outside the engine. They are fetched once, before any pipeline runs;
//! the valuation stages themselves never do I/O.

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::conflict::RelativeValuation;
use crate::error::ProviderError;
use crate::fundamentals::CompanyFundamentals;
use crate::orchestrator::{ParameterOverrides, ValuationInput};
use crate::valuation::{MacroEnvironment, TerminalMethod};

// ============================================================================
// Provider Traits
// ============================================================================

/// Source of company fundamentals.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Fundamentals for one ticker, or a typed missing-data error.
    async fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, ProviderError>;
}

/// Source of risk-free rate, equity risk premium and market state.
#[async_trait]
pub trait MacroProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn macro_environment(&self) -> Result<MacroEnvironment, ProviderError>;
}

/// Source of the independent relative-valuation signal.
#[async_trait]
pub trait RelativeValuationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn relative_valuation(&self, ticker: &str) -> Result<RelativeValuation, ProviderError>;
}

/// The three collaborators a valuation run needs.
#[derive(Clone)]
pub struct ProviderSet {
    pub fundamentals: Arc<dyn FundamentalsProvider>,
    pub macro_data: Arc<dyn MacroProvider>,
    pub relative: Arc<dyn RelativeValuationProvider>,
}

impl ProviderSet {
    /// Use one snapshot for all three roles.
    pub fn from_snapshot(snapshot: Arc<SnapshotProvider>) -> Self {
        Self {
            fundamentals: snapshot.clone(),
            macro_data: snapshot.clone(),
            relative: snapshot,
        }
    }
}

// ============================================================================
// Snapshot Provider
// ============================================================================

/// Point-in-time inputs for a set of companies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    /// Date the figures were taken
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    pub companies: Vec<CompanyFundamentals>,
    #[serde(rename = "macro", default)]
    pub macro_env: Option<MacroEnvironment>,
    /// Relative-valuation signal keyed by ticker
    #[serde(default)]
    pub relative: HashMap<String, RelativeValuation>,
    /// Terminal method overrides keyed by ticker
    #[serde(default)]
    pub terminal_methods: HashMap<String, TerminalMethod>,
}

/// Serves all three collaborator roles from an in-memory snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    snapshot: ValuationSnapshot,
    by_ticker: HashMap<String, usize>,
}

impl SnapshotProvider {
    pub fn new(snapshot: ValuationSnapshot) -> Self {
        let by_ticker = snapshot
            .companies
            .iter()
            .enumerate()
            .map(|(i, c)| (c.ticker.to_uppercase(), i))
            .collect();
        Self {
            snapshot,
            by_ticker,
        }
    }

    /// Parse a JSON snapshot.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let snapshot: ValuationSnapshot =
            serde_json::from_str(json).context("Failed to parse valuation snapshot")?;
        Ok(Self::new(snapshot))
    }

    /// Read and parse a JSON snapshot file.
    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot from {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Invalid snapshot in {}", path.display()))
    }

    pub fn snapshot(&self) -> &ValuationSnapshot {
        &self.snapshot
    }

    /// Tickers in snapshot order.
    pub fn tickers(&self) -> Vec<String> {
        self.snapshot
            .companies
            .iter()
            .map(|c| c.ticker.clone())
            .collect()
    }

    /// Terminal method override for a ticker.
    pub fn terminal_method(&self, ticker: &str) -> Option<TerminalMethod> {
        self.snapshot
            .terminal_methods
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(ticker))
            .map(|(_, m)| *m)
    }
}

#[async_trait]
impl FundamentalsProvider for SnapshotProvider {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, ProviderError> {
        self.by_ticker
            .get(&ticker.to_uppercase())
            .and_then(|&i| self.snapshot.companies.get(i))
            .cloned()
            .ok_or_else(|| ProviderError::DataNotAvailable(format!("no fundamentals for {}", ticker)))
    }
}

#[async_trait]
impl MacroProvider for SnapshotProvider {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn macro_environment(&self) -> Result<MacroEnvironment, ProviderError> {
        self.snapshot
            .macro_env
            .ok_or_else(|| ProviderError::DataNotAvailable("no macro data in snapshot".into()))
    }
}

#[async_trait]
impl RelativeValuationProvider for SnapshotProvider {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn relative_valuation(&self, ticker: &str) -> Result<RelativeValuation, ProviderError> {
        self.snapshot
            .relative
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(ticker))
            .map(|(_, r)| *r)
            .ok_or_else(|| {
                ProviderError::DataNotAvailable(format!("no relative valuation for {}", ticker))
            })
    }
}

// ============================================================================
// Input Gathering
// ============================================================================

/// Inputs for one ticker, or why they could not be gathered.
#[derive(Debug, Clone)]
pub struct GatheredInput {
    pub ticker: String,
    pub input: Result<ValuationInput, ProviderError>,
}

/// Fetch every input up front.
///
/// Missing fundamentals fail that ticker only. Missing macro data leaves
/// the orchestrator's defaults in place; a missing relative signal is
/// treated as neutral.
pub async fn gather_inputs(tickers: &[String], providers: &ProviderSet) -> Vec<GatheredInput> {
    let macro_env = match providers.macro_data.macro_environment().await {
        Ok(env) => Some(env),
        Err(e) => {
            tracing::warn!(
                provider = providers.macro_data.name(),
                error = %e,
                "Macro data unavailable, using configured defaults"
            );
            None
        }
    };

    let mut gathered = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let (fundamentals, relative) = tokio::join!(
            providers.fundamentals.fundamentals(ticker),
            providers.relative.relative_valuation(ticker),
        );

        let input = fundamentals.map(|fundamentals| {
            let relative = relative.unwrap_or_else(|e| {
                tracing::debug!(ticker = %ticker, error = %e, "No relative signal, treating as neutral");
                RelativeValuation::default()
            });
            ValuationInput {
                fundamentals,
                macro_env,
                relative,
                terminal_method: None,
                overrides: ParameterOverrides::default(),
            }
        });
        if let Err(e) = &input {
            tracing::warn!(
                ticker = %ticker,
                provider = providers.fundamentals.name(),
                error = %e,
                "Fundamentals unavailable"
            );
        }

        gathered.push(GatheredInput {
            ticker: ticker.clone(),
            input,
        });
    }
    gathered
}
