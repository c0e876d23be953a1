//! DCF Engine - values a snapshot of company inputs and prints JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dcf_common::config::Config;
use dcf_common::logging::init_logging_with_exclusions;
use dcf_engine::analysis::{self, SensitivityAxis, DEFAULT_STEPS};
use dcf_engine::batch::{rank_by_upside, value_batch, BatchOutcome};
use dcf_engine::conviction::ConvictionTier;
use dcf_engine::orchestrator::{
    ParameterOverrides, Stage, ValuationConfig, ValuationInput, ValuationOrchestrator,
};
use dcf_engine::providers::{gather_inputs, ProviderSet, SnapshotProvider};
use dcf_engine::sector::SectorPriors;
use dcf_engine::valuation::GrowthSchedule;

/// Scenario-weighted Monte Carlo DCF valuation.
#[derive(Parser, Debug)]
#[command(name = "dcf-engine")]
#[command(version)]
#[command(about = "Probabilistic DCF fair value from a JSON snapshot", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.dcf/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct SnapshotArgs {
    /// JSON snapshot with fundamentals, macro data and relative signals
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Monte Carlo iterations (overrides config)
    #[arg(long)]
    iterations: Option<usize>,

    /// RNG seed for a reproducible run (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Explicit forecast window in years (3-10)
    #[arg(long)]
    years: Option<u32>,

    /// Fade explicit growth linearly to this rate by the final year
    #[arg(long)]
    fade_to: Option<f64>,

    /// Replace the cleaned growth estimate (decimal, e.g. 0.08)
    #[arg(long)]
    growth: Option<f64>,

    /// Replace the sector terminal growth (decimal)
    #[arg(long)]
    terminal_growth: Option<f64>,

    /// Replace the model discount rate (decimal, still floored)
    #[arg(long)]
    wacc: Option<f64>,
}

impl SnapshotArgs {
    fn overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            growth: self.growth,
            terminal_growth: self.terminal_growth,
            wacc: self.wacc,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Value every company in the snapshot (or the listed tickers)
    Value {
        #[command(flatten)]
        args: SnapshotArgs,

        /// Tickers to value (default: all in the snapshot)
        #[arg(short, long)]
        ticker: Vec<String>,
    },

    /// WACC × growth fair value grid for one ticker
    Sensitivity {
        #[command(flatten)]
        args: SnapshotArgs,

        #[arg(short, long)]
        ticker: String,

        /// Growth rate varied against WACC
        #[arg(long, value_enum, default_value = "growth")]
        axis: Axis,
    },

    /// Deterministic stress scenarios for one ticker
    Stress {
        #[command(flatten)]
        args: SnapshotArgs,

        #[arg(short, long)]
        ticker: String,
    },

    /// Bear / base / bull fair values for one ticker, without noise
    Scenarios {
        #[command(flatten)]
        args: SnapshotArgs,

        #[arg(short, long)]
        ticker: String,
    },

    /// Value several tickers and rank them by upside
    Compare {
        #[command(flatten)]
        args: SnapshotArgs,

        /// Tickers to compare (default: all in the snapshot)
        #[arg(short, long)]
        ticker: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Axis {
    Growth,
    TerminalGrowth,
}

impl From<Axis> for SensitivityAxis {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::Growth => Self::Growth,
            Axis::TerminalGrowth => Self::TerminalGrowth,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );
    tracing::info!("DCF Engine v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Value { args, ticker } => {
            let outcomes = value_tickers(&config, &args, ticker).await?;
            print_json(&outcomes)
        }
        Commands::Compare { args, ticker } => {
            let outcomes = value_tickers(&config, &args, ticker).await?;
            let rows: Vec<CompareRow> = rank_by_upside(outcomes)
                .iter()
                .map(CompareRow::from)
                .collect();
            print_json(&rows)
        }
        Commands::Sensitivity { args, ticker, axis } => {
            let (orchestrator, provider) = prepare(&config, &args).await?;
            let input = single_input(&provider, &ticker, args.overrides()).await?;
            let base = orchestrator.base_case(&input)?;
            let grid = analysis::sensitivity_grid(
                orchestrator.dcf_model(),
                &base.parameters,
                axis.into(),
                &DEFAULT_STEPS,
                &DEFAULT_STEPS,
            )?;
            print_json(&TickerOutput { ticker, output: grid })
        }
        Commands::Stress { args, ticker } => {
            let (orchestrator, provider) = prepare(&config, &args).await?;
            let input = single_input(&provider, &ticker, args.overrides()).await?;
            let base = orchestrator.base_case(&input)?;
            let stress = analysis::stress_test(
                orchestrator.dcf_model(),
                &base.parameters,
                &analysis::default_scenarios(),
            )?;
            print_json(&TickerOutput {
                ticker,
                output: stress,
            })
        }
        Commands::Scenarios { args, ticker } => {
            let (orchestrator, provider) = prepare(&config, &args).await?;
            let input = single_input(&provider, &ticker, args.overrides()).await?;
            let base = orchestrator.base_case(&input)?;
            let scenarios = analysis::scenario_analysis(
                orchestrator.dcf_model(),
                &base.parameters,
                &orchestrator.config().scenarios,
            )?;
            print_json(&TickerOutput {
                ticker,
                output: scenarios,
            })
        }
    }
}

/// One line of a comparison table.
#[derive(Serialize)]
struct CompareRow {
    ticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fair_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upside_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probability_undervalued: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conviction: Option<ConvictionTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&BatchOutcome> for CompareRow {
    fn from(outcome: &BatchOutcome) -> Self {
        match outcome {
            BatchOutcome::Valued(report) => Self {
                ticker: report.result.ticker.clone(),
                fair_value: Some(report.result.fair_value_per_share),
                current_price: Some(report.result.current_price),
                upside_pct: Some(report.result.upside_pct),
                probability_undervalued: Some(report.monte_carlo.probability_undervalued),
                conviction: Some(report.result.conviction),
                error: None,
            },
            BatchOutcome::Failed {
                ticker,
                stage,
                error,
            } => Self {
                ticker: ticker.clone(),
                fair_value: None,
                current_price: None,
                upside_pct: None,
                probability_undervalued: None,
                conviction: None,
                error: Some(format!("{}: {}", stage, error)),
            },
        }
    }
}

#[derive(Serialize)]
struct TickerOutput<T: Serialize> {
    ticker: String,
    #[serde(flatten)]
    output: T,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env_overrides();
            config
        }
        None => Config::load_with_env()?,
    };
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

async fn prepare(
    config: &Config,
    args: &SnapshotArgs,
) -> Result<(ValuationOrchestrator, Arc<SnapshotProvider>)> {
    let mut valuation = ValuationConfig::from_section(config.valuation.as_ref())
        .context("Invalid valuation settings")?;
    if let Some(n) = args.iterations {
        valuation.simulation.iterations = n;
    }
    if args.seed.is_some() {
        valuation.simulation.seed = args.seed;
    }
    if let Some(years) = args.years {
        valuation.forecast_years = years;
    }
    if let Some(target) = args.fade_to {
        valuation.growth_schedule = GrowthSchedule::LinearFade { target };
    }

    let priors = SectorPriors::from_section(config.valuation.as_ref())
        .context("Invalid sector settings")?;
    let orchestrator = ValuationOrchestrator::new(valuation, Arc::new(priors))
        .context("Invalid valuation settings")?;
    let provider = Arc::new(SnapshotProvider::from_path(&args.snapshot).await?);
    Ok((orchestrator, provider))
}

/// Value the listed tickers (or the whole snapshot) in input order.
async fn value_tickers(
    config: &Config,
    args: &SnapshotArgs,
    tickers: Vec<String>,
) -> Result<Vec<BatchOutcome>> {
    let (orchestrator, provider) = prepare(config, args).await?;
    let tickers = if tickers.is_empty() {
        provider.tickers()
    } else {
        tickers
    };
    let inputs = gather(&provider, &tickers, args.overrides()).await;

    let mut valid = Vec::new();
    let mut slots = Vec::with_capacity(inputs.len());
    for (ticker, input) in inputs {
        match input {
            Ok(input) => {
                slots.push(None);
                valid.push(input);
            }
            Err(error) => slots.push(Some(BatchOutcome::Failed {
                ticker,
                stage: Stage::InputValidated.to_string(),
                error,
            })),
        }
    }

    let mut valued = value_batch(&orchestrator, &valid).into_iter();
    Ok(slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| valued.next()))
        .collect())
}

/// Gather inputs, applying the snapshot's terminal methods and the
/// command-line parameter overrides.
async fn gather(
    provider: &Arc<SnapshotProvider>,
    tickers: &[String],
    overrides: ParameterOverrides,
) -> Vec<(String, std::result::Result<ValuationInput, String>)> {
    let providers = ProviderSet::from_snapshot(provider.clone());
    gather_inputs(tickers, &providers)
        .await
        .into_iter()
        .map(|gathered| {
            let input = gathered
                .input
                .map(|mut input| {
                    input.terminal_method = provider.terminal_method(&gathered.ticker);
                    input.overrides = overrides;
                    input
                })
                .map_err(|e| e.to_string());
            (gathered.ticker, input)
        })
        .collect()
}

async fn single_input(
    provider: &Arc<SnapshotProvider>,
    ticker: &str,
    overrides: ParameterOverrides,
) -> Result<ValuationInput> {
    let mut inputs = gather(provider, &[ticker.to_string()], overrides).await;
    match inputs.pop() {
        Some((_, Ok(input))) => Ok(input),
        Some((_, Err(e))) => bail!("{}: {}", ticker, e),
        None => bail!("{}: no inputs gathered", ticker),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
