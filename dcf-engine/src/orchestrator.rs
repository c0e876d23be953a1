//! Valuation orchestrator.
//!
//! Runs one valuation through a fixed sequence of stages:
//!
//! ```text
//! INPUT_VALIDATED → GROWTH_CLEANED → RATE_COMPUTED → PROJECTED
//!   → TERMINAL_CAPPED → SIMULATED → CONFLICT_CHECKED → RESULT
//! ```
//!
//! A failure aborts with a [`PipelineError`] naming the stage that could not
//! be reached. Cancellation is observed between stages (and between Monte
//! Carlo chunks); nothing partial is ever returned.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dcf_common::ValuationSection;

use crate::conflict::{ConflictConfig, ConflictDetector, ConflictVerdict, RelativeValuation};
use crate::conviction::{ConvictionConfig, ConvictionTier};
use crate::error::{PipelineError, Result, ValuationError};
use crate::fundamentals::{CompanyFundamentals, InputQuality};
use crate::sector::{SectorPriors, SectorProfile};
use crate::simulation::{
    MonteCarloEngine, MonteCarloSummary, Scenario, ScenarioSet, SimulationConfig,
};
use crate::valuation::{
    CashFlowProjector, DcfModel, DcfParameters, DcfValuation, DiscountConfig, DiscountRate,
    DiscountRateModel, GrowthAssumption, GrowthConfig, GrowthEstimator, GrowthSchedule,
    MacroEnvironment, TerminalMethod, TerminalValueModel, DEFAULT_TERMINAL_CAP,
};

// ============================================================================
// Stages
// ============================================================================

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    InputValidated,
    GrowthCleaned,
    RateComputed,
    Projected,
    TerminalCapped,
    Simulated,
    ConflictChecked,
    Result,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputValidated => write!(f, "INPUT_VALIDATED"),
            Self::GrowthCleaned => write!(f, "GROWTH_CLEANED"),
            Self::RateComputed => write!(f, "RATE_COMPUTED"),
            Self::Projected => write!(f, "PROJECTED"),
            Self::TerminalCapped => write!(f, "TERMINAL_CAPPED"),
            Self::Simulated => write!(f, "SIMULATED"),
            Self::ConflictChecked => write!(f, "CONFLICT_CHECKED"),
            Self::Result => write!(f, "RESULT"),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Everything tunable about a valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Explicit forecast window (3-10 years)
    pub forecast_years: u32,
    /// Maximum terminal share of enterprise value
    pub terminal_cap: f64,
    pub growth_schedule: GrowthSchedule,
    pub growth: GrowthConfig,
    pub discount: DiscountConfig,
    pub simulation: SimulationConfig,
    pub scenarios: ScenarioSet,
    pub conflict: ConflictConfig,
    pub conviction: ConvictionConfig,
    /// Rates used when the macro provider supplies none
    pub default_macro: MacroEnvironment,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            forecast_years: 5,
            terminal_cap: DEFAULT_TERMINAL_CAP,
            growth_schedule: GrowthSchedule::Constant,
            growth: GrowthConfig::default(),
            discount: DiscountConfig::default(),
            simulation: SimulationConfig::default(),
            scenarios: ScenarioSet::standard(),
            conflict: ConflictConfig::default(),
            conviction: ConvictionConfig::default(),
            default_macro: MacroEnvironment::default(),
        }
    }
}

impl ValuationConfig {
    /// Defaults overlaid with the `valuation` section of the config file.
    ///
    /// Fails only when the section's scenario table cannot be built.
    pub fn from_section(section: Option<&ValuationSection>) -> Result<Self> {
        let mut config = Self::default();
        let Some(s) = section else {
            return Ok(config);
        };

        if let Some(v) = s.forecast_years {
            config.forecast_years = v;
        }
        if let Some(v) = s.terminal_cap {
            config.terminal_cap = v;
        }

        let sim = &mut config.simulation;
        if let Some(v) = s.iterations {
            sim.iterations = v;
        }
        if let Some(v) = s.min_iterations {
            sim.min_iterations = v;
        }
        if s.seed.is_some() {
            sim.seed = s.seed;
        }
        if let Some(v) = s.max_resample_attempts {
            sim.max_resample_attempts = v;
        }
        if let Some(v) = s.growth_sigma {
            sim.growth_sigma = v;
        }
        if let Some(v) = s.terminal_growth_sigma {
            sim.terminal_growth_sigma = v;
        }
        if let Some(v) = s.wacc_sigma {
            sim.wacc_sigma = v;
        }
        if let Some(v) = s.assessment_bands {
            sim.assessment_bands = v;
        }

        if let Some(v) = s.wacc_floor {
            config.discount.wacc_floor = v;
            sim.wacc_floor = v;
        }
        if let Some(v) = s.cape_low_threshold {
            config.discount.cape_low_threshold = v;
        }
        if let Some(v) = s.cape_high_threshold {
            config.discount.cape_high_threshold = v;
        }
        if let Some(v) = s.cape_ramp_width {
            config.discount.cape_ramp_width = v;
        }
        if let Some(v) = s.max_macro_adjustment {
            config.discount.max_adjustment = v;
        }
        if let Some(v) = s.risk_free_rate {
            config.default_macro.risk_free_rate = v;
        }
        if let Some(v) = s.equity_risk_premium {
            config.default_macro.equity_risk_premium = v;
        }

        if let Some(v) = s.growth_stretch_upper {
            config.growth.stretch_upper = v;
        }
        if let Some(v) = s.growth_stretch_lower {
            config.growth.stretch_lower = v;
        }
        if let Some(v) = s.growth_hard_ceiling {
            config.growth.hard_ceiling = v;
        }
        if let Some(v) = s.growth_blend_weight {
            config.growth.blend_weight = v;
        }

        if let Some(v) = s.conflict_upside_pct {
            config.conflict.upside_threshold_pct = v;
        }
        if let Some(v) = s.conflict_peg_threshold {
            config.conflict.peg_threshold = v;
        }

        let conviction = &mut config.conviction;
        if let Some(v) = s.conviction_high_upside_pct {
            conviction.high_upside_pct = v;
        }
        if let Some(v) = s.conviction_high_probability {
            conviction.high_probability = v;
        }
        if let Some(v) = s.conviction_moderate_upside_pct {
            conviction.moderate_upside_pct = v;
        }
        if let Some(v) = s.conviction_moderate_probability {
            conviction.moderate_probability = v;
        }
        if let Some(v) = s.conviction_low_probability {
            conviction.low_probability = v;
        }

        if let Some(ref weights) = s.scenarios {
            let scenarios = weights
                .iter()
                .map(|w| {
                    Ok(Scenario::new(
                        w.label.parse()?,
                        w.probability,
                        w.growth_multiplier,
                        w.terminal_growth_multiplier,
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            config.scenarios = ScenarioSet::new(scenarios)?;
        }

        Ok(config)
    }

    /// Reject parameters no valuation could run with.
    pub fn validate(&self) -> Result<()> {
        if !(3..=10).contains(&self.forecast_years) {
            return Err(ValuationError::configuration(format!(
                "forecast_years must be 3-10, got {}",
                self.forecast_years
            )));
        }
        TerminalValueModel::new(self.terminal_cap)?;
        self.simulation.validate()?;

        let d = &self.discount;
        if !(d.wacc_floor > 0.0) {
            return Err(ValuationError::configuration("wacc_floor must be positive"));
        }
        if !(d.cape_low_threshold < d.cape_high_threshold) {
            return Err(ValuationError::configuration(
                "cape_low_threshold must be below cape_high_threshold",
            ));
        }
        if !(d.cape_ramp_width > 0.0) {
            return Err(ValuationError::configuration("cape_ramp_width must be positive"));
        }

        let g = &self.growth;
        if !(0.0..=1.0).contains(&g.blend_weight) {
            return Err(ValuationError::configuration("growth blend weight must be in [0, 1]"));
        }
        if !(g.stretch_lower < g.stretch_upper && g.stretch_upper <= g.hard_ceiling) {
            return Err(ValuationError::configuration(
                "growth bands must satisfy stretch_lower < stretch_upper <= hard_ceiling",
            ));
        }

        let c = &self.conviction;
        if !(0.0 <= c.low_probability
            && c.low_probability <= c.moderate_probability
            && c.moderate_probability <= c.high_probability
            && c.high_probability <= 1.0)
        {
            return Err(ValuationError::configuration(
                "conviction probabilities must satisfy 0 <= low <= moderate <= high <= 1",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Inputs and Outputs
// ============================================================================

/// Caller-supplied replacements for derived assumptions.
///
/// Each override is reported as a warning. An overridden discount rate is
/// still floored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
    #[serde(default)]
    pub growth: Option<f64>,
    #[serde(default)]
    pub terminal_growth: Option<f64>,
    #[serde(default)]
    pub wacc: Option<f64>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        self.growth.is_none() && self.terminal_growth.is_none() && self.wacc.is_none()
    }

    /// Reject overrides no valuation could use.
    pub fn validate(&self, growth_ceiling: f64) -> Result<()> {
        if let Some(g) = self.growth {
            if !(g.is_finite() && g.abs() <= growth_ceiling) {
                return Err(ValuationError::validation(
                    "overrides.growth",
                    format!("must be finite and within ±{}", growth_ceiling),
                ));
            }
        }
        if let Some(g) = self.terminal_growth {
            if !(g.is_finite() && g > -1.0) {
                return Err(ValuationError::validation(
                    "overrides.terminal_growth",
                    "must be finite and above -100%",
                ));
            }
        }
        if let Some(w) = self.wacc {
            if !(w.is_finite() && w > 0.0) {
                return Err(ValuationError::validation("overrides.wacc", "must be positive"));
            }
        }
        Ok(())
    }
}

/// Everything gathered from collaborators for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationInput {
    pub fundamentals: CompanyFundamentals,
    #[serde(rename = "macro", default)]
    pub macro_env: Option<MacroEnvironment>,
    #[serde(default)]
    pub relative: RelativeValuation,
    /// Overrides the sector's default terminal method
    #[serde(default)]
    pub terminal_method: Option<TerminalMethod>,
    #[serde(default)]
    pub overrides: ParameterOverrides,
}

/// Headline result for display and portfolio collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub ticker: String,
    pub fair_value_per_share: f64,
    pub current_price: f64,
    /// Upside vs current price (%)
    pub upside_pct: f64,
    /// Terminal share of enterprise value after the cap (%)
    pub terminal_value_pct: f64,
    pub conviction: ConvictionTier,
    pub warnings: Vec<String>,
}

/// Deterministic stages of a valuation, up to and including the terminal
/// cap. Sensitivity, stress and scenario analysis start from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseCase {
    pub data_quality: InputQuality,
    pub sector_profile: SectorProfile,
    pub growth: GrowthAssumption,
    /// Model discount rate, before any override
    pub discount_rate: DiscountRate,
    /// Parameters actually valued, overrides applied
    pub parameters: DcfParameters,
    pub dcf: DcfValuation,
    pub warnings: Vec<String>,
}

/// Full audit trail of one valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationReport {
    pub run_id: String,
    pub result: ValuationResult,
    pub data_quality: InputQuality,
    pub sector_profile: SectorProfile,
    pub growth: GrowthAssumption,
    pub discount_rate: DiscountRate,
    /// Deterministic base case the simulation perturbs
    pub parameters: DcfParameters,
    pub overrides: ParameterOverrides,
    pub dcf: DcfValuation,
    pub monte_carlo: MonteCarloSummary,
    pub conflict: ConflictVerdict,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Sequences the valuation stages.
#[derive(Debug, Clone)]
pub struct ValuationOrchestrator {
    config: ValuationConfig,
    priors: Arc<SectorPriors>,
    growth: GrowthEstimator,
    discount: DiscountRateModel,
    dcf: DcfModel,
    monte_carlo: MonteCarloEngine,
    conflict: ConflictDetector,
}

impl ValuationOrchestrator {
    /// Build an orchestrator over an injected, read-only sector table.
    pub fn new(config: ValuationConfig, priors: Arc<SectorPriors>) -> Result<Self> {
        config.validate()?;
        let dcf = DcfModel::new(
            CashFlowProjector::new(config.growth_schedule),
            TerminalValueModel::new(config.terminal_cap)?,
        );
        let monte_carlo =
            MonteCarloEngine::new(config.simulation.clone(), config.scenarios.clone(), dcf)?;

        Ok(Self {
            growth: GrowthEstimator::new(config.growth),
            discount: DiscountRateModel::new(config.discount),
            conflict: ConflictDetector::new(config.conflict),
            dcf,
            monte_carlo,
            priors,
            config,
        })
    }

    /// Orchestrator with default settings and the standard sector table.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ValuationConfig::default(), Arc::new(SectorPriors::standard()))
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    pub fn priors(&self) -> &Arc<SectorPriors> {
        &self.priors
    }

    pub fn dcf_model(&self) -> &DcfModel {
        &self.dcf
    }

    /// Run the deterministic stages only, without simulating.
    pub fn base_case(&self, input: &ValuationInput) -> std::result::Result<BaseCase, PipelineError> {
        let ticker = input.fundamentals.ticker.as_str();
        let run_id = dcf_common::logging::generate_run_id();
        let span = tracing::info_span!("base_case", ticker = %ticker, run_id = %run_id);
        let _enter = span.enter();

        let never = AtomicBool::new(false);
        self.run_base_case(input, &never)
    }

    /// Value one company.
    pub fn value(&self, input: &ValuationInput) -> std::result::Result<ValuationReport, PipelineError> {
        let never = AtomicBool::new(false);
        self.value_with_cancel(input, &never)
    }

    /// Value one company, checking `cancel` between stages.
    pub fn value_with_cancel(
        &self,
        input: &ValuationInput,
        cancel: &AtomicBool,
    ) -> std::result::Result<ValuationReport, PipelineError> {
        let f = &input.fundamentals;
        let ticker = f.ticker.as_str();
        let run_id = dcf_common::logging::generate_run_id();
        let span = tracing::info_span!("valuation", ticker = %ticker, run_id = %run_id);
        let _enter = span.enter();

        let BaseCase {
            data_quality,
            sector_profile,
            growth,
            discount_rate,
            parameters,
            dcf,
            mut warnings,
        } = self.run_base_case(input, cancel)?;
        let fair_value_per_share = dcf.fair_value_per_share;

        // SIMULATED
        checkpoint(cancel, ticker, Stage::Simulated)?;
        let monte_carlo = self
            .monte_carlo
            .run_with_cancel(&parameters, f.current_price, Some(cancel))
            .map_err(|e| e.at(ticker, Stage::Simulated))?
            .summary;
        if monte_carlo.excluded_draws > 0 {
            warnings.push(format!(
                "{} of {} Monte Carlo draws excluded",
                monte_carlo.excluded_draws, monte_carlo.iterations_requested
            ));
        }
        tracing::debug!(
            stage = %Stage::Simulated,
            seed = monte_carlo.seed,
            median = monte_carlo.median,
            probability_undervalued = monte_carlo.probability_undervalued,
            "Stage complete"
        );

        // CONFLICT_CHECKED
        checkpoint(cancel, ticker, Stage::ConflictChecked)?;
        let upside_pct = (fair_value_per_share / f.current_price - 1.0) * 100.0;
        let conflict =
            self.conflict
                .detect(upside_pct, input.relative.signal, input.relative.peg_ratio);
        tracing::debug!(
            stage = %Stage::ConflictChecked,
            severity = %conflict.severity,
            "Stage complete"
        );

        // RESULT
        checkpoint(cancel, ticker, Stage::Result)?;
        let conviction = self.config.conviction.classify(
            upside_pct,
            monte_carlo.probability_undervalued,
            conflict.severity,
        );
        tracing::info!(
            fair_value = fair_value_per_share,
            upside_pct,
            conviction = %conviction,
            warnings = warnings.len(),
            "Valuation complete"
        );

        Ok(ValuationReport {
            run_id,
            result: ValuationResult {
                ticker: f.ticker.clone(),
                fair_value_per_share,
                current_price: f.current_price,
                upside_pct,
                terminal_value_pct: dcf.terminal.pct_of_ev * 100.0,
                conviction,
                warnings,
            },
            data_quality,
            sector_profile,
            growth,
            discount_rate,
            parameters,
            overrides: input.overrides,
            dcf,
            monte_carlo,
            conflict,
        })
    }

    /// INPUT_VALIDATED through TERMINAL_CAPPED.
    fn run_base_case(
        &self,
        input: &ValuationInput,
        cancel: &AtomicBool,
    ) -> std::result::Result<BaseCase, PipelineError> {
        let f = &input.fundamentals;
        let ticker = f.ticker.as_str();
        let overrides = &input.overrides;
        let fail = |stage: Stage| move |e: ValuationError| e.at(ticker, stage);

        // INPUT_VALIDATED
        checkpoint(cancel, ticker, Stage::InputValidated)?;
        f.validate().map_err(fail(Stage::InputValidated))?;
        overrides
            .validate(self.config.growth.hard_ceiling)
            .map_err(fail(Stage::InputValidated))?;
        if !overrides.is_empty() {
            tracing::info!(?overrides, "Parameter overrides supplied");
        }
        let data_quality = f.quality();
        let mut warnings = data_quality.warnings.clone();
        tracing::debug!(stage = %Stage::InputValidated, quality = data_quality.score, "Stage complete");

        // GROWTH_CLEANED
        checkpoint(cancel, ticker, Stage::GrowthCleaned)?;
        let profile = *self.priors.profile(f.sector.as_deref());
        let (growth, growth_warnings) =
            self.growth
                .clean_growth(f.analyst_growth, profile.growth_prior, profile.max_growth);
        warnings.extend(growth_warnings);
        let explicit_growth = match overrides.growth {
            Some(g) => {
                warnings.push(format!(
                    "Growth overridden to {:.1}% (cleaned estimate {:.1}%)",
                    g * 100.0,
                    growth.blended * 100.0
                ));
                g
            }
            None => growth.blended,
        };
        tracing::debug!(
            stage = %Stage::GrowthCleaned,
            growth = explicit_growth,
            source = %growth.source,
            "Stage complete"
        );

        // RATE_COMPUTED
        checkpoint(cancel, ticker, Stage::RateComputed)?;
        let macro_env = match input.macro_env {
            Some(env) => env,
            None => {
                warnings.push("No macro data, using default rates".to_string());
                self.config.default_macro
            }
        };
        if !macro_env.state.is_known() {
            warnings.push("No market valuation reading, macro adjustment skipped".to_string());
        }
        let discount_rate = self
            .discount
            .wacc(
                macro_env.risk_free_rate,
                f.beta,
                macro_env.equity_risk_premium,
                &macro_env.state,
            )
            .map_err(fail(Stage::RateComputed))?;
        if discount_rate.is_floored() {
            warnings.push(format!(
                "Discount rate floored at {:.1}%",
                discount_rate.rate * 100.0
            ));
        }
        let wacc = match overrides.wacc {
            Some(w) => {
                let used = w.max(self.config.discount.wacc_floor);
                warnings.push(format!(
                    "Discount rate overridden to {:.2}% (model rate {:.2}%)",
                    used * 100.0,
                    discount_rate.rate * 100.0
                ));
                used
            }
            None => discount_rate.rate,
        };
        tracing::debug!(
            stage = %Stage::RateComputed,
            wacc,
            market = %discount_rate.market_state,
            "Stage complete"
        );

        // PROJECTED
        checkpoint(cancel, ticker, Stage::Projected)?;
        let forecast = self
            .dcf
            .projector()
            .project(f.fcf, explicit_growth, self.config.forecast_years, wacc)
            .map_err(fail(Stage::Projected))?;
        tracing::debug!(stage = %Stage::Projected, pv_sum = forecast.pv_sum(), "Stage complete");

        // TERMINAL_CAPPED
        checkpoint(cancel, ticker, Stage::TerminalCapped)?;
        let method = input.terminal_method.unwrap_or(profile.terminal_method);
        let terminal_growth = match overrides.terminal_growth {
            Some(g) => {
                warnings.push(format!(
                    "Terminal growth overridden to {:.2}% (sector {:.2}%)",
                    g * 100.0,
                    profile.terminal_growth * 100.0
                ));
                g
            }
            None => profile.terminal_growth,
        };
        let terminal = self
            .dcf
            .terminal_model()
            .evaluate(method, &forecast, terminal_growth, profile.exit_multiple)
            .map_err(fail(Stage::TerminalCapped))?;
        if terminal.capped {
            warnings.push(format!(
                "Terminal value capped at {:.0}% of EV (was {:.1}%)",
                terminal.pct_of_ev * 100.0,
                terminal.raw_pct_of_ev * 100.0
            ));
        }
        let enterprise_value = forecast.pv_sum() + terminal.present_value;
        let fair_value_per_share = enterprise_value / f.shares_outstanding;
        if !fair_value_per_share.is_finite() {
            return Err(ValuationError::computation("fair value is not finite")
                .at(ticker, Stage::TerminalCapped));
        }
        tracing::debug!(
            stage = %Stage::TerminalCapped,
            method = %method,
            terminal_pct = terminal.pct_of_ev,
            fair_value = fair_value_per_share,
            "Stage complete"
        );

        Ok(BaseCase {
            data_quality,
            sector_profile: profile,
            growth,
            discount_rate,
            parameters: DcfParameters {
                fcf0: f.fcf,
                growth: explicit_growth,
                terminal_growth,
                wacc,
                years: self.config.forecast_years,
                method,
                exit_multiple: profile.exit_multiple,
                shares_outstanding: f.shares_outstanding,
            },
            dcf: DcfValuation {
                forecast,
                terminal,
                enterprise_value,
                equity_value: enterprise_value,
                fair_value_per_share,
            },
            warnings,
        })
    }
}

fn checkpoint(cancel: &AtomicBool, ticker: &str, stage: Stage) -> std::result::Result<(), PipelineError> {
    if cancel.load(Ordering::Relaxed) {
        tracing::info!(stage = %stage, "Valuation cancelled");
        Err(ValuationError::Cancelled.at(ticker, stage))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictSeverity, RelativeSignal};
    use crate::simulation::ScenarioLabel;
    use crate::valuation::MacroState;

    fn make_test_input() -> ValuationInput {
        ValuationInput {
            fundamentals: CompanyFundamentals {
                ticker: "TEST".to_string(),
                sector: Some("Industrials".to_string()),
                fcf: 10_000.0,
                shares_outstanding: 1_000.0,
                current_price: 120.0,
                beta: 1.0,
                analyst_growth: Some(0.10),
                revenue: Some(90_000.0),
            },
            macro_env: Some(MacroEnvironment {
                risk_free_rate: 0.04,
                equity_risk_premium: 0.05,
                state: MacroState::from_cape(25.0),
            }),
            relative: RelativeValuation::default(),
            terminal_method: Some(TerminalMethod::Perpetuity),
            overrides: ParameterOverrides::default(),
        }
    }

    fn make_test_orchestrator() -> ValuationOrchestrator {
        let mut config = ValuationConfig::default();
        config.simulation.iterations = 1_000;
        config.simulation.seed = Some(11);
        ValuationOrchestrator::new(config, Arc::new(SectorPriors::standard())).unwrap()
    }

    #[test]
    fn test_full_pipeline() {
        let report = make_test_orchestrator().value(&make_test_input()).unwrap();

        // Industrials: max growth 15%, terminal growth 2.5%; wacc 9%
        assert!((report.discount_rate.rate - 0.09).abs() < 1e-12);
        assert_eq!(report.growth.blended, 0.10);
        assert!(report.result.terminal_value_pct <= 65.0);
        assert!((report.result.fair_value_per_share - 146.84).abs() < 0.01);
        assert_eq!(report.monte_carlo.seed, 11);
        assert_eq!(report.conflict.severity, ConflictSeverity::None);
        assert!(!report.run_id.is_empty());
    }

    #[test]
    fn test_invalid_input_names_stage() {
        let mut input = make_test_input();
        input.fundamentals.fcf = -1.0;
        let err = make_test_orchestrator().value(&input).unwrap_err();
        assert_eq!(err.stage, Stage::InputValidated);
        assert!(err.source.is_validation());
    }

    #[test]
    fn test_negative_beta_fails_at_rate() {
        let mut input = make_test_input();
        input.fundamentals.beta = -0.4;
        let err = make_test_orchestrator().value(&input).unwrap_err();
        assert_eq!(err.stage, Stage::RateComputed);
        assert!(err.source.is_configuration());
    }

    #[test]
    fn test_wacc_below_terminal_growth_fails_at_terminal() {
        let mut config = ValuationConfig::default();
        config.simulation.iterations = 200;
        config.discount.wacc_floor = 0.01;
        let orchestrator =
            ValuationOrchestrator::new(config, Arc::new(SectorPriors::standard())).unwrap();

        let mut input = make_test_input();
        input.fundamentals.beta = 0.1;
        input.macro_env = Some(MacroEnvironment {
            risk_free_rate: 0.01,
            equity_risk_premium: 0.05,
            state: MacroState::default(),
        });
        let err = orchestrator.value(&input).unwrap_err();
        assert_eq!(err.stage, Stage::TerminalCapped);
        assert!(err.source.is_configuration());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = AtomicBool::new(true);
        let err = make_test_orchestrator()
            .value_with_cancel(&make_test_input(), &cancel)
            .unwrap_err();
        assert_eq!(err.source, ValuationError::Cancelled);
        assert_eq!(err.stage, Stage::InputValidated);
    }

    #[test]
    fn test_high_conflict_caps_conviction() {
        let mut input = make_test_input();
        input.relative = RelativeValuation {
            signal: RelativeSignal::Overvalued,
            peg_ratio: None,
        };
        input.fundamentals.current_price = 80.0;
        let report = make_test_orchestrator().value(&input).unwrap();
        assert_eq!(report.conflict.severity, ConflictSeverity::High);
        assert!(report.result.conviction <= ConvictionTier::Speculative);
    }

    #[test]
    fn test_from_section_overrides() {
        let section = ValuationSection {
            forecast_years: Some(7),
            terminal_cap: Some(0.5),
            iterations: Some(2_500),
            seed: Some(99),
            wacc_floor: Some(0.04),
            conflict_peg_threshold: Some(2.5),
            ..Default::default()
        };
        let config = ValuationConfig::from_section(Some(&section)).unwrap();
        assert_eq!(config.forecast_years, 7);
        assert_eq!(config.terminal_cap, 0.5);
        assert_eq!(config.simulation.iterations, 2_500);
        assert_eq!(config.simulation.seed, Some(99));
        assert_eq!(config.discount.wacc_floor, 0.04);
        assert_eq!(config.simulation.wacc_floor, 0.04);
        assert_eq!(config.conflict.peg_threshold, 2.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_section_conviction_and_scenarios() {
        let section = ValuationSection {
            conviction_high_upside_pct: Some(25.0),
            conviction_moderate_probability: Some(0.55),
            scenarios: Some(vec![
                dcf_common::ScenarioWeights {
                    label: "bear".to_string(),
                    probability: 0.3,
                    growth_multiplier: 0.4,
                    terminal_growth_multiplier: 0.5,
                },
                dcf_common::ScenarioWeights {
                    label: "Bull".to_string(),
                    probability: 0.7,
                    growth_multiplier: 1.1,
                    terminal_growth_multiplier: 1.0,
                },
            ]),
            ..Default::default()
        };
        let config = ValuationConfig::from_section(Some(&section)).unwrap();
        assert_eq!(config.conviction.high_upside_pct, 25.0);
        assert_eq!(config.conviction.moderate_probability, 0.55);
        assert_eq!(config.conviction.high_probability, 0.75);

        let scenarios = config.scenarios.scenarios();
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].label, ScenarioLabel::Bear);
        assert_eq!(scenarios[1].label, ScenarioLabel::Bull);
        assert_eq!(scenarios[1].probability, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_section_rejects_bad_scenarios() {
        let weights = |label: &str, probability: f64| dcf_common::ScenarioWeights {
            label: label.to_string(),
            probability,
            growth_multiplier: 1.0,
            terminal_growth_multiplier: 1.0,
        };

        let section = ValuationSection {
            scenarios: Some(vec![weights("sideways", 1.0)]),
            ..Default::default()
        };
        let err = ValuationConfig::from_section(Some(&section)).unwrap_err();
        assert!(err.is_configuration());

        let section = ValuationSection {
            scenarios: Some(vec![weights("bear", 0.5), weights("bull", 0.4)]),
            ..Default::default()
        };
        assert!(ValuationConfig::from_section(Some(&section)).is_err());
        assert!(ValuationConfig::from_section(None).is_ok());
    }

    #[test]
    fn test_inverted_conviction_thresholds_rejected() {
        let mut config = ValuationConfig::default();
        config.conviction.low_probability = 0.8;
        let err = ValuationOrchestrator::new(config, Arc::new(SectorPriors::standard())).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_base_case_matches_full_valuation() {
        let orchestrator = make_test_orchestrator();
        let input = make_test_input();
        let base = orchestrator.base_case(&input).unwrap();
        let report = orchestrator.value(&input).unwrap();

        assert_eq!(base.parameters, report.parameters);
        assert_eq!(base.dcf.fair_value_per_share, report.result.fair_value_per_share);
        assert_eq!(base.discount_rate, report.discount_rate);
        assert!(base
            .warnings
            .iter()
            .all(|w| report.result.warnings.contains(w)));
    }

    #[test]
    fn test_base_case_reports_invalid_input() {
        let mut input = make_test_input();
        input.fundamentals.shares_outstanding = 0.0;
        let err = make_test_orchestrator().base_case(&input).unwrap_err();
        assert_eq!(err.stage, Stage::InputValidated);
    }

    #[test]
    fn test_overrides_replace_derived_parameters() {
        let mut input = make_test_input();
        input.overrides = ParameterOverrides {
            growth: Some(0.05),
            terminal_growth: Some(0.02),
            wacc: Some(0.08),
        };
        let report = make_test_orchestrator().value(&input).unwrap();

        assert_eq!(report.parameters.growth, 0.05);
        assert_eq!(report.parameters.terminal_growth, 0.02);
        assert_eq!(report.parameters.wacc, 0.08);
        assert_eq!(report.overrides, input.overrides);
        // Model outputs are kept for audit
        assert_eq!(report.growth.blended, 0.10);
        assert!((report.discount_rate.rate - 0.09).abs() < 1e-12);

        let warnings = &report.result.warnings;
        assert!(warnings.iter().any(|w| w.starts_with("Growth overridden")));
        assert!(warnings.iter().any(|w| w.starts_with("Terminal growth overridden")));
        assert!(warnings.iter().any(|w| w.starts_with("Discount rate overridden")));
    }

    #[test]
    fn test_wacc_override_is_floored() {
        let mut input = make_test_input();
        input.overrides.wacc = Some(0.01);
        input.overrides.terminal_growth = Some(0.0);
        let base = make_test_orchestrator().base_case(&input).unwrap();
        assert_eq!(base.parameters.wacc, 0.03);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let orchestrator = make_test_orchestrator();

        let mut input = make_test_input();
        input.overrides.growth = Some(1.5);
        let err = orchestrator.value(&input).unwrap_err();
        assert_eq!(err.stage, Stage::InputValidated);
        assert!(err.source.is_validation());

        let mut input = make_test_input();
        input.overrides.wacc = Some(f64::NAN);
        assert!(orchestrator.value(&input).is_err());

        // An override is still subject to wacc > terminal growth
        let mut input = make_test_input();
        input.overrides.terminal_growth = Some(0.12);
        let err = orchestrator.value(&input).unwrap_err();
        assert_eq!(err.stage, Stage::TerminalCapped);
    }

    #[test]
    fn test_excluded_draws_reported_as_warning() {
        let mut config = ValuationConfig::default();
        config.simulation.iterations = 1_000;
        config.simulation.seed = Some(5);
        config.simulation.wacc_sigma = 0.3;
        config.simulation.max_resample_attempts = 0;
        let orchestrator =
            ValuationOrchestrator::new(config, Arc::new(SectorPriors::standard())).unwrap();

        let mut input = make_test_input();
        input.overrides.wacc = Some(0.04);
        input.overrides.terminal_growth = Some(0.03);
        let report = orchestrator.value(&input).unwrap();

        let mc = &report.monte_carlo;
        assert!(mc.excluded_draws > 0);
        assert!(mc.excluded_draws < mc.iterations_requested);
        let expected = format!(
            "{} of {} Monte Carlo draws excluded",
            mc.excluded_draws, mc.iterations_requested
        );
        assert!(report.result.warnings.contains(&expected));
    }

    #[test]
    fn test_missing_analyst_growth_warned_once() {
        let mut input = make_test_input();
        input.fundamentals.analyst_growth = None;
        let report = make_test_orchestrator().value(&input).unwrap();
        let mentions = report
            .result
            .warnings
            .iter()
            .filter(|w| w.contains("analyst growth"))
            .count();
        assert_eq!(mentions, 1);
        assert!(report.data_quality.score < 1.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ValuationConfig::default();
        config.forecast_years = 12;
        assert!(ValuationOrchestrator::new(config, Arc::new(SectorPriors::standard())).is_err());

        let mut config = ValuationConfig::default();
        config.simulation.iterations = 10;
        let err = ValuationOrchestrator::new(config, Arc::new(SectorPriors::standard())).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::InputValidated.to_string(), "INPUT_VALIDATED");
        assert_eq!(Stage::ConflictChecked.to_string(), "CONFLICT_CHECKED");
    }
}
