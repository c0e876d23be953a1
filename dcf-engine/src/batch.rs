//! Parallel batch valuation.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::AtomicBool;

use crate::error::PipelineError;
use crate::orchestrator::{ValuationInput, ValuationOrchestrator, ValuationReport};

/// Per-ticker outcome of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Valued(Box<ValuationReport>),
    Failed {
        ticker: String,
        stage: String,
        error: String,
    },
}

impl BatchOutcome {
    pub fn ticker(&self) -> &str {
        match self {
            Self::Valued(report) => &report.result.ticker,
            Self::Failed { ticker, .. } => ticker,
        }
    }

    pub fn is_valued(&self) -> bool {
        matches!(self, Self::Valued(_))
    }

    pub fn report(&self) -> Option<&ValuationReport> {
        match self {
            Self::Valued(report) => Some(report),
            Self::Failed { .. } => None,
        }
    }
}

impl From<std::result::Result<ValuationReport, PipelineError>> for BatchOutcome {
    fn from(result: std::result::Result<ValuationReport, PipelineError>) -> Self {
        match result {
            Ok(report) => Self::Valued(Box::new(report)),
            Err(e) => Self::Failed {
                stage: e.stage.to_string(),
                error: e.source.to_string(),
                ticker: e.ticker,
            },
        }
    }
}

/// Value independent inputs on the rayon pool, preserving input order.
///
/// One failing ticker never aborts the others.
pub fn value_batch(orchestrator: &ValuationOrchestrator, inputs: &[ValuationInput]) -> Vec<BatchOutcome> {
    let cancel = AtomicBool::new(false);
    value_batch_with_cancel(orchestrator, inputs, &cancel)
}

/// Like [`value_batch`], observing a shared cancellation flag.
pub fn value_batch_with_cancel(
    orchestrator: &ValuationOrchestrator,
    inputs: &[ValuationInput],
    cancel: &AtomicBool,
) -> Vec<BatchOutcome> {
    let batch_id = dcf_common::logging::generate_span_id();
    tracing::info!(batch_id = %batch_id, size = inputs.len(), "Batch valuation started");

    let outcomes: Vec<BatchOutcome> = inputs
        .par_iter()
        .map(|input| orchestrator.value_with_cancel(input, cancel).into())
        .collect();

    let failed = outcomes.iter().filter(|o| !o.is_valued()).count();
    tracing::info!(
        batch_id = %batch_id,
        total = outcomes.len(),
        valued = outcomes.len() - failed,
        failed,
        "Batch valuation complete"
    );
    outcomes
}

/// Order outcomes for side-by-side comparison: valued tickers by upside,
/// highest first, then failures in input order.
pub fn rank_by_upside(mut outcomes: Vec<BatchOutcome>) -> Vec<BatchOutcome> {
    outcomes.sort_by(|a, b| match (a.report(), b.report()) {
        (Some(a), Some(b)) => b.result.upside_pct.total_cmp(&a.result.upside_pct),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    outcomes
}
