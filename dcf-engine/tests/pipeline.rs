//! End-to-end valuation pipeline tests.

use std::sync::Arc;

use dcf_engine::analysis::{scenario_analysis, stress_test, default_scenarios};
use dcf_engine::conflict::{ConflictSeverity, RelativeSignal, RelativeValuation};
use dcf_engine::orchestrator::{
    ParameterOverrides, Stage, ValuationConfig, ValuationInput, ValuationOrchestrator,
};
use dcf_engine::sector::SectorPriors;
use dcf_engine::simulation::{
    MonteCarloEngine, Scenario, ScenarioLabel, ScenarioSet, SimulationConfig,
};
use dcf_engine::valuation::{
    CashFlowProjector, DcfModel, DcfParameters, MacroEnvironment, MacroState, TerminalMethod,
    TerminalValueModel,
};
use dcf_engine::{CompanyFundamentals, ValuationError};
use proptest::prelude::*;

fn make_reference_params() -> DcfParameters {
    DcfParameters {
        fcf0: 10_000.0,
        growth: 0.10,
        terminal_growth: 0.025,
        wacc: 0.09,
        years: 5,
        method: TerminalMethod::Perpetuity,
        exit_multiple: 12.0,
        shares_outstanding: 1_000.0,
    }
}

fn make_test_input() -> ValuationInput {
    ValuationInput {
        fundamentals: CompanyFundamentals {
            ticker: "REF".to_string(),
            sector: Some("Industrials".to_string()),
            fcf: 10_000.0,
            shares_outstanding: 1_000.0,
            current_price: 130.0,
            beta: 1.0,
            analyst_growth: Some(0.10),
            revenue: Some(100_000.0),
        },
        macro_env: Some(MacroEnvironment {
            risk_free_rate: 0.04,
            equity_risk_premium: 0.05,
            state: MacroState::from_cape(20.0),
        }),
        relative: RelativeValuation::default(),
        terminal_method: Some(TerminalMethod::Perpetuity),
        overrides: ParameterOverrides::default(),
    }
}

fn make_test_orchestrator(iterations: usize, seed: u64) -> ValuationOrchestrator {
    let mut config = ValuationConfig::default();
    config.simulation.iterations = iterations;
    config.simulation.seed = Some(seed);
    ValuationOrchestrator::new(config, Arc::new(SectorPriors::standard())).unwrap()
}

#[test]
fn test_reference_scenario_to_the_cent() {
    let model = DcfModel::default();
    let explicit: f64 = (1..=5)
        .map(|t| 10_000.0 * 1.1f64.powi(t) / 1.09f64.powi(t))
        .sum();
    let expected = explicit / 0.35 / 1_000.0;

    for _ in 0..3 {
        let dcf = model.value(&make_reference_params()).unwrap();
        assert!((dcf.fair_value_per_share - expected).abs() < 0.005);
        assert_eq!(
            (dcf.fair_value_per_share * 100.0).round() / 100.0,
            146.84
        );
    }
}

#[test]
fn test_dominance_cap_scenario() {
    let projector = CashFlowProjector::default();
    let forecast = projector.project(10_000.0, 0.10, 5, 0.09).unwrap();
    let s = forecast.pv_sum();

    // Exit multiple that puts raw terminal value at 85% of EV
    let target_tv_pv = s * 0.85 / 0.15;
    let multiple = target_tv_pv / (forecast.final_fcf() * forecast.final_discount_factor());

    let model = TerminalValueModel::new(0.65).unwrap();
    let tv = model
        .evaluate(TerminalMethod::ExitMultiple, &forecast, 0.0, multiple)
        .unwrap();

    assert!((tv.raw_pct_of_ev - 0.85).abs() < 1e-9);
    assert!(tv.capped);
    assert!((tv.present_value - s * 0.65 / 0.35).abs() < 1e-6);
    assert_eq!(tv.pct_of_ev * 100.0, 65.0);
}

#[test]
fn test_full_report() {
    let report = make_test_orchestrator(2_000, 17)
        .value(&make_test_input())
        .unwrap();

    assert_eq!(report.result.ticker, "REF");
    assert!((report.result.fair_value_per_share - 146.84).abs() < 0.01);
    assert!(report.result.terminal_value_pct <= 65.0);
    assert!(report
        .result
        .warnings
        .iter()
        .any(|w| w.contains("Terminal value capped")));

    let mc = &report.monte_carlo;
    assert_eq!(mc.iterations_requested, 2_000);
    assert_eq!(mc.draws_used + mc.excluded_draws, 2_000);
    assert!(mc.p5 < mc.median && mc.median < mc.p95);

    let breakdown = &report.discount_rate;
    let sum = breakdown.risk_free_rate
        + breakdown.equity_premium
        + breakdown.macro_adjustment
        + breakdown.floor_adjustment;
    assert!((sum - breakdown.rate).abs() < 1e-12);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["monte_carlo"]["probability_undervalued"].is_number());
    assert_eq!(json["result"]["ticker"], "REF");
}

#[test]
fn test_conflict_flows_into_result() {
    let mut input = make_test_input();
    input.fundamentals.current_price = 100.0;
    input.relative = RelativeValuation {
        signal: RelativeSignal::Overvalued,
        peg_ratio: Some(1.5),
    };
    let report = make_test_orchestrator(500, 3).value(&input).unwrap();
    assert!(report.result.upside_pct > 15.0);
    assert_eq!(report.conflict.severity, ConflictSeverity::High);
}

#[test]
fn test_agreeing_signals_no_conflict() {
    let mut input = make_test_input();
    input.fundamentals.current_price = 100.0;
    input.relative = RelativeValuation {
        signal: RelativeSignal::Undervalued,
        peg_ratio: Some(1.1),
    };
    let report = make_test_orchestrator(500, 3).value(&input).unwrap();
    assert_eq!(report.conflict.severity, ConflictSeverity::None);
}

#[test]
fn test_degenerate_scenario_weights_rejected() {
    let err = ScenarioSet::new(vec![
        Scenario::new(ScenarioLabel::Bear, 0.25, 0.5, 0.6),
        Scenario::new(ScenarioLabel::Base, 0.60, 0.8, 1.0),
        Scenario::new(ScenarioLabel::Bull, 0.20, 1.2, 1.2),
    ])
    .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_zero_iterations_rejected() {
    let mut config = ValuationConfig::default();
    config.simulation.iterations = 0;
    config.simulation.min_iterations = 0;
    let err = ValuationOrchestrator::new(config, Arc::new(SectorPriors::standard())).unwrap_err();
    assert!(matches!(err, ValuationError::Configuration(_)));
}

#[test]
fn test_failure_never_returns_partial_result() {
    let mut input = make_test_input();
    input.fundamentals.shares_outstanding = 0.0;
    let err = make_test_orchestrator(500, 1).value(&input).unwrap_err();
    assert_eq!(err.stage, Stage::InputValidated);
    assert_eq!(err.ticker, "REF");
}

#[test]
fn test_analysis_runs_from_base_case() {
    let orchestrator = make_test_orchestrator(500, 3);
    let base = orchestrator.base_case(&make_test_input()).unwrap();
    assert!((base.dcf.fair_value_per_share - 146.84).abs() < 0.01);

    let scenarios = scenario_analysis(
        orchestrator.dcf_model(),
        &base.parameters,
        &orchestrator.config().scenarios,
    )
    .unwrap();
    assert_eq!(scenarios.base_fair_value, base.dcf.fair_value_per_share);
    assert_eq!(scenarios.cases.len(), 3);
    assert!(scenarios.cases.iter().all(|c| c.fair_value.is_some()));

    let stress = stress_test(orchestrator.dcf_model(), &base.parameters, &default_scenarios()).unwrap();
    assert_eq!(stress.base_fair_value, base.dcf.fair_value_per_share);
}

#[test]
fn test_overrides_from_snapshot_json() {
    let mut input: ValuationInput = serde_json::from_value(serde_json::json!({
        "fundamentals": {
            "ticker": "REF",
            "sector": "Industrials",
            "fcf": 10000.0,
            "shares_outstanding": 1000.0,
            "current_price": 130.0,
            "beta": 1.0,
            "analyst_growth": 0.25
        },
        "overrides": { "growth": 0.10, "wacc": 0.09 }
    }))
    .unwrap();
    input.terminal_method = Some(TerminalMethod::Perpetuity);
    assert_eq!(
        input.overrides,
        ParameterOverrides {
            growth: Some(0.10),
            terminal_growth: None,
            wacc: Some(0.09),
        }
    );

    // Overridden to the reference parameters despite missing macro data
    let report = make_test_orchestrator(500, 3).value(&input).unwrap();
    assert!((report.result.fair_value_per_share - 146.84).abs() < 0.01);
    assert!(report
        .result
        .warnings
        .iter()
        .any(|w| w.starts_with("Growth overridden")));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_probability_undervalued_monotone_in_base_value(
        fcf_low in 1_000.0f64..20_000.0,
        bump in 1.01f64..1.5,
    ) {
        let config = SimulationConfig {
            iterations: 400,
            seed: Some(77),
            ..Default::default()
        };
        let engine = MonteCarloEngine::new(config, ScenarioSet::standard(), DcfModel::default()).unwrap();

        let low = DcfParameters { fcf0: fcf_low, ..make_reference_params() };
        let high = DcfParameters { fcf0: fcf_low * bump, ..make_reference_params() };
        let price = 100.0;

        let p_low = engine.run(&low, price).unwrap().summary.probability_undervalued;
        let p_high = engine.run(&high, price).unwrap().summary.probability_undervalued;
        prop_assert!(p_high >= p_low);
    }
}
