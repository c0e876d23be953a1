//! DCF Engine Library
//!
//! Probabilistic fair value per share via discounted cash flow: a
//! deterministic valuation core wrapped in a scenario-weighted Monte Carlo
//! simulation, cross-checked against an independent relative-valuation
//! signal.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     ValuationOrchestrator                           │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐   │
//! │  │  Growth      │→ │  Discount    │→ │  Projection + Terminal   │   │
//! │  │  Estimator   │  │  Rate (WACC) │  │  (dominance cap)         │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────────────┘   │
//! │                                                  ↓                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐   │
//! │  │  Conviction  │← │  Conflict    │← │  Monte Carlo             │   │
//! │  │  Tier        │  │  Detector    │  │  (Bear / Base / Bull)    │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//!          ↑ inputs gathered once by providers (async, before any stage)
//! ```
//!
//! # Key Concepts
//!
//! ## Dominance cap
//! - Terminal value may not exceed a configured share of enterprise value
//! - Excess is rebalanced as `S * cap / (1 - cap)`, never by re-solving
//!   growth or the discount rate
//!
//! ## Regime sampling
//! - Draws come from Bear/Base/Bull regimes, not noise around one point
//! - The base regime keeps 80% of cleaned growth
//!
//! ## Sector priors
//! - An immutable [`SectorPriors`] table is injected as `Arc`, never global

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod batch;
pub mod conflict;
pub mod conviction;
pub mod error;
pub mod fundamentals;
pub mod orchestrator;
pub mod providers;
pub mod sector;
pub mod simulation;
pub mod valuation;

pub use batch::{rank_by_upside, value_batch, BatchOutcome};
pub use conflict::{ConflictDetector, ConflictSeverity, ConflictVerdict, RelativeSignal, RelativeValuation};
pub use conviction::ConvictionTier;
pub use error::{PipelineError, ProviderError, Result, ValuationError};
pub use fundamentals::CompanyFundamentals;
pub use orchestrator::{
    BaseCase, ParameterOverrides, Stage, ValuationConfig, ValuationInput, ValuationOrchestrator,
    ValuationReport, ValuationResult,
};
pub use providers::{gather_inputs, ProviderSet, SnapshotProvider, ValuationSnapshot};
pub use sector::{SectorPriors, SectorProfile};
pub use simulation::{MonteCarloEngine, MonteCarloSummary, ScenarioSet, SimulationConfig};
