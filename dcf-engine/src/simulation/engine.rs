//! Monte Carlo engine.
//!
//! Per iteration: draw a regime, scale growth and terminal growth by its
//! multipliers with relative Gaussian noise, perturb the discount rate,
//! then run the deterministic DCF. A draw whose discount rate does not
//! exceed its terminal growth is resampled a bounded number of times and
//! then excluded. Exclusions are counted, never clamped away.
//!
//! Iterations are split into fixed-size chunks, each with its own RNG
//! seeded from `(seed, chunk index)`, and evaluated on the rayon pool.
//! Results depend only on the seed, not on the number of threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::scenario::{ScenarioLabel, ScenarioSet};
use super::summary::{probability_above, Assessment, DistributionStats, MonteCarloSummary};
use crate::error::{Result, ValuationError};
use crate::valuation::{DcfModel, DcfParameters, TerminalMethod};

// ============================================================================
// Configuration
// ============================================================================

/// Monte Carlo settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Draws per valuation
    pub iterations: usize,
    /// Fewest draws accepted
    pub min_iterations: usize,
    /// Fixed seed; a fresh one is drawn and reported when absent
    pub seed: Option<u64>,
    /// Relative noise on growth
    pub growth_sigma: f64,
    /// Relative noise on terminal growth
    pub terminal_growth_sigma: f64,
    /// Relative noise on the discount rate
    pub wacc_sigma: f64,
    /// Lowest sampled discount rate
    pub wacc_floor: f64,
    /// Resamples before a violating draw is excluded
    pub max_resample_attempts: u32,
    /// Draws per RNG stream
    pub chunk_size: usize,
    /// Probability bands (lower, upper) for the assessment label
    pub assessment_bands: (f64, f64),
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            min_iterations: 100,
            seed: None,
            growth_sigma: 0.05,
            terminal_growth_sigma: 0.05,
            wacc_sigma: 0.10,
            wacc_floor: 0.03,
            max_resample_attempts: 10,
            chunk_size: 512,
            assessment_bands: (0.35, 0.65),
        }
    }
}

impl SimulationConfig {
    /// Reject settings that would make the summary meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 || self.iterations < self.min_iterations {
            return Err(ValuationError::configuration(format!(
                "iterations ({}) below minimum ({})",
                self.iterations,
                self.min_iterations.max(1)
            )));
        }
        for (name, sigma) in [
            ("growth_sigma", self.growth_sigma),
            ("terminal_growth_sigma", self.terminal_growth_sigma),
            ("wacc_sigma", self.wacc_sigma),
        ] {
            if !(sigma.is_finite() && sigma >= 0.0) {
                return Err(ValuationError::configuration(format!(
                    "{} must be non-negative, got {}",
                    name, sigma
                )));
            }
        }
        if !(self.wacc_floor.is_finite() && self.wacc_floor > 0.0) {
            return Err(ValuationError::configuration("wacc_floor must be positive"));
        }
        if self.chunk_size == 0 {
            return Err(ValuationError::configuration("chunk_size must be positive"));
        }
        let (lower, upper) = self.assessment_bands;
        if !(0.0 <= lower && lower < upper && upper <= 1.0) {
            return Err(ValuationError::configuration(
                "assessment bands must satisfy 0 <= lower < upper <= 1",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Draws
// ============================================================================

/// One used Monte Carlo iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDraw {
    pub scenario: ScenarioLabel,
    pub growth: f64,
    pub terminal_growth: f64,
    pub wacc: f64,
    pub fair_value: f64,
}

/// Why a draw was left out of aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// No attempt satisfied `wacc > terminal growth`
    InvariantViolation,
    /// The valuation was not a finite number
    NonFinite,
}

enum DrawOutcome {
    Used(ScenarioDraw),
    Excluded(ExclusionReason),
}

#[derive(Default)]
struct ChunkOutcome {
    draws: Vec<ScenarioDraw>,
    excluded_invariant: usize,
    excluded_non_finite: usize,
}

struct NoiseModel {
    growth: Normal<f64>,
    terminal_growth: Normal<f64>,
    wacc: Normal<f64>,
}

impl NoiseModel {
    fn new(config: &SimulationConfig) -> Result<Self> {
        let normal = |sigma: f64| {
            Normal::new(0.0, sigma).map_err(|e| {
                ValuationError::configuration(format!("invalid noise sigma {}: {}", sigma, e))
            })
        };
        Ok(Self {
            growth: normal(config.growth_sigma)?,
            terminal_growth: normal(config.terminal_growth_sigma)?,
            wacc: normal(config.wacc_sigma)?,
        })
    }
}

/// Aggregated simulation with its used draws.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloRun {
    pub summary: MonteCarloSummary,
    pub draws: Vec<ScenarioDraw>,
}

// ============================================================================
// Engine
// ============================================================================

/// Scenario-weighted Monte Carlo engine.
#[derive(Debug, Clone)]
pub struct MonteCarloEngine {
    config: SimulationConfig,
    scenarios: ScenarioSet,
    model: DcfModel,
}

impl MonteCarloEngine {
    /// Create an engine, validating its settings.
    pub fn new(config: SimulationConfig, scenarios: ScenarioSet, model: DcfModel) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scenarios,
            model,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn scenarios(&self) -> &ScenarioSet {
        &self.scenarios
    }

    /// Simulate around `base` and summarise against `current_price`.
    pub fn run(&self, base: &DcfParameters, current_price: f64) -> Result<MonteCarloRun> {
        self.run_with_cancel(base, current_price, None)
    }

    /// Like [`run`](Self::run), checking `cancel` before each chunk.
    ///
    /// A chunk that has started always completes.
    pub fn run_with_cancel(
        &self,
        base: &DcfParameters,
        current_price: f64,
        cancel: Option<&AtomicBool>,
    ) -> Result<MonteCarloRun> {
        base.validate()?;
        let noise = NoiseModel::new(&self.config)?;
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let n = self.config.iterations;
        let chunk_size = self.config.chunk_size;
        let chunks = n.div_ceil(chunk_size);

        let outcomes: Vec<Result<ChunkOutcome>> = (0..chunks)
            .into_par_iter()
            .map(|index| {
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    return Err(ValuationError::Cancelled);
                }
                let len = chunk_size.min(n - index * chunk_size);
                self.run_chunk(base, &noise, chunk_seed(seed, index as u64), len)
            })
            .collect();

        let mut merged = ChunkOutcome::default();
        for outcome in outcomes {
            let chunk = outcome?;
            merged.draws.extend(chunk.draws);
            merged.excluded_invariant += chunk.excluded_invariant;
            merged.excluded_non_finite += chunk.excluded_non_finite;
        }

        let excluded = merged.excluded_invariant + merged.excluded_non_finite;
        if excluded > 0 {
            tracing::warn!(
                excluded,
                invariant = merged.excluded_invariant,
                non_finite = merged.excluded_non_finite,
                iterations = n,
                "Monte Carlo draws excluded from aggregation"
            );
        }

        let summary = self.summarise(&merged, seed, current_price)?;
        Ok(MonteCarloRun {
            summary,
            draws: merged.draws,
        })
    }

    fn run_chunk(
        &self,
        base: &DcfParameters,
        noise: &NoiseModel,
        seed: u64,
        len: usize,
    ) -> Result<ChunkOutcome> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut outcome = ChunkOutcome {
            draws: Vec::with_capacity(len),
            ..Default::default()
        };
        for _ in 0..len {
            match self.draw(&mut rng, base, noise)? {
                DrawOutcome::Used(draw) => outcome.draws.push(draw),
                DrawOutcome::Excluded(reason) => {
                    tracing::debug!(?reason, "Draw excluded");
                    match reason {
                        ExclusionReason::InvariantViolation => outcome.excluded_invariant += 1,
                        ExclusionReason::NonFinite => outcome.excluded_non_finite += 1,
                    }
                }
            }
        }
        Ok(outcome)
    }

    /// One iteration. Only numerical failures become exclusions; any other
    /// error aborts the run.
    fn draw<R: Rng>(
        &self,
        rng: &mut R,
        base: &DcfParameters,
        noise: &NoiseModel,
    ) -> Result<DrawOutcome> {
        let scenario = self.scenarios.sample(rng);
        let growth = base.growth * scenario.growth_multiplier * (1.0 + noise.growth.sample(rng));

        for _ in 0..=self.config.max_resample_attempts {
            let terminal_growth = base.terminal_growth
                * scenario.terminal_growth_multiplier
                * (1.0 + noise.terminal_growth.sample(rng));
            let wacc = (base.wacc * (1.0 + noise.wacc.sample(rng))).max(self.config.wacc_floor);

            if base.method == TerminalMethod::Perpetuity && wacc <= terminal_growth {
                continue;
            }

            let params = DcfParameters {
                growth,
                terminal_growth,
                wacc,
                ..*base
            };
            return match self.model.value(&params) {
                Ok(dcf) if dcf.fair_value_per_share.is_finite() => {
                    Ok(DrawOutcome::Used(ScenarioDraw {
                        scenario: scenario.label,
                        growth,
                        terminal_growth,
                        wacc,
                        fair_value: dcf.fair_value_per_share,
                    }))
                }
                Ok(_) | Err(ValuationError::Computation(_)) => {
                    Ok(DrawOutcome::Excluded(ExclusionReason::NonFinite))
                }
                Err(e) => Err(e),
            };
        }

        Ok(DrawOutcome::Excluded(ExclusionReason::InvariantViolation))
    }

    fn summarise(
        &self,
        outcome: &ChunkOutcome,
        seed: u64,
        current_price: f64,
    ) -> Result<MonteCarloSummary> {
        let values: Vec<f64> = outcome.draws.iter().map(|d| d.fair_value).collect();
        let stats = DistributionStats::from_values(&values).ok_or_else(|| {
            ValuationError::computation(format!(
                "all {} Monte Carlo draws were excluded",
                self.config.iterations
            ))
        })?;

        let mut scenario_counts = BTreeMap::new();
        for draw in &outcome.draws {
            *scenario_counts.entry(draw.scenario).or_insert(0) += 1;
        }

        let probability_undervalued = probability_above(&values, current_price);
        let (lower, upper) = self.config.assessment_bands;

        Ok(MonteCarloSummary {
            iterations_requested: self.config.iterations,
            draws_used: values.len(),
            excluded_draws: outcome.excluded_invariant + outcome.excluded_non_finite,
            excluded_invariant: outcome.excluded_invariant,
            excluded_non_finite: outcome.excluded_non_finite,
            seed,
            mean: stats.mean,
            median: stats.median,
            std_dev: stats.std_dev,
            p5: stats.p5,
            p10: stats.p10,
            p90: stats.p90,
            p95: stats.p95,
            probability_undervalued,
            assessment: Assessment::from_probability(probability_undervalued, lower, upper),
            scenario_counts,
        })
    }
}

/// Independent stream seed for one chunk (splitmix64 finaliser).
fn chunk_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
