//! Tests for the request-level entry points
//!
//! These tests verify that:
//! - Unknown assumption sets surface as lookup errors
//! - The model cache builds each `(id, periodicity)` once and shares it
//! - Service calls given a cache reuse its models
//! - Stored snapshots are versioned and the latest version is resolvable
//! - Service calls agree with calling the engine directly

use std::sync::Arc;

use crate::analysis::{Goal, RiskConfig, StreamingOptions};
use crate::config::{AssumptionSetBuilder, SimulationBuilder, SimulationConfig};
use crate::error::{LookupError, SimulationError};
use crate::market::CapitalMarketModel;
use crate::model::{AllocationWeights, AssumptionSetId, Periodicity};
use crate::optimization::RiskBand;
use crate::service::{
    AssumptionCache, AssumptionStore, StaticAssumptionStore, get_efficient_frontier,
    get_model_portfolio, run_simulation, simulate_outcomes, summarize_run,
};
use crate::simulation::SimulationEngine;

fn store() -> (StaticAssumptionStore, AssumptionSetId) {
    let mut store = StaticAssumptionStore::new();
    let id = store
        .insert(AssumptionSetBuilder::us_baseline().build().unwrap())
        .unwrap();
    (store, id)
}

fn config(paths: usize) -> SimulationConfig {
    SimulationBuilder::new()
        .allocation(
            AllocationWeights::from_pairs([("us_equity", 0.7), ("us_bonds", 0.3)]).unwrap(),
        )
        .years(5)
        .paths(paths)
        .seed(99)
        .initial_balance(25_000.0)
        .contribute(250.0, 0..60)
        .build()
        .unwrap()
}

#[test]
fn test_unknown_assumption_set() {
    let (store, _) = store();
    let missing = AssumptionSetId::new("nope", 3);
    let err = run_simulation(&store, &missing, &config(4), None).unwrap_err();
    assert_eq!(
        err,
        SimulationError::Lookup(LookupError::AssumptionSetNotFound(missing.clone()))
    );
    assert!(get_efficient_frontier(&store, &missing, 5).is_err());
}

#[test]
fn test_latest_version_lookup() {
    let (mut store, v1) = store();
    let v2 = store
        .insert(AssumptionSetBuilder::us_baseline().version(2).build().unwrap())
        .unwrap();
    assert_eq!(store.latest("us_baseline"), Some(v2.clone()));
    assert_eq!(store.latest("missing"), None);
    assert_eq!(store.ids(), vec![v1, v2]);
}

#[test]
fn test_service_calls_use_cached_models() {
    let (inner, id) = store();
    let cache = AssumptionCache::new(inner);

    get_efficient_frontier(&cache, &id, 5).unwrap();
    assert_eq!(cache.len(), 1);
    let annual = cache.model(&id, Periodicity::Annual).unwrap();
    let via_trait = AssumptionStore::model(&cache, &id, Periodicity::Annual).unwrap();
    assert!(Arc::ptr_eq(&annual, &via_trait));

    run_simulation(&cache, &id, &config(4), None).unwrap();
    assert_eq!(cache.len(), 2);
    simulate_outcomes(
        &cache,
        &id,
        &config(4),
        &Goal::NeverDeplete,
        &RiskConfig::default(),
        &StreamingOptions::default(),
        None,
    )
    .unwrap();
    assert_eq!(cache.len(), 2);

    // Plain stores build a fresh model each time
    let (plain, _) = store();
    let a = plain.model(&id, Periodicity::Annual).unwrap();
    let b = plain.model(&id, Periodicity::Annual).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_cache_shares_models() {
    let (store, id) = store();
    let cache = AssumptionCache::new(store);
    assert!(cache.is_empty());

    let a = cache.model(&id, Periodicity::Monthly).unwrap();
    let b = cache.model(&id, Periodicity::Monthly).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 1);

    let annual = cache.model(&id, Periodicity::Annual).unwrap();
    assert_eq!(annual.periodicity(), Periodicity::Annual);
    assert_eq!(cache.len(), 2);

    // The cache is itself a store
    assert!(Arc::ptr_eq(&cache.get(&id).unwrap(), &cache.inner().get(&id).unwrap()));

    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.model(&AssumptionSetId::new("nope", 1), Periodicity::Annual).is_err());
    assert!(cache.is_empty());
}

#[test]
fn test_run_simulation_matches_engine() {
    let (store, id) = store();
    let config = config(16);
    let via_service = run_simulation(&store, &id, &config, None).unwrap();

    let model = CapitalMarketModel::new(store.get(&id).unwrap(), Periodicity::Monthly).unwrap();
    let direct = SimulationEngine::new(&model).run(&config, None).unwrap();
    assert_eq!(via_service.balances(), direct.balances());
    assert_eq!(via_service.assumption_set(), &id);

    let summary = summarize_run(&via_service, &Goal::TerminalValue { amount: 30_000.0 }).unwrap();
    assert_eq!(summary.num_paths, 16);
}

#[test]
fn test_frontier_and_model_portfolio_requests() {
    let (store, id) = store();
    let frontier = get_efficient_frontier(&store, &id, 8).unwrap();
    assert_eq!(frontier.assumption_set, id);
    assert!((frontier.risk_free_rate - 0.03).abs() < 1e-12);
    assert!(!frontier.points.is_empty());

    let w = get_model_portfolio(RiskBand::Aggressive, 30).unwrap();
    let total: f64 = w.iter().map(|(_, x)| x).sum();
    assert!((total - 1.0).abs() < 1e-12);
}

#[test]
fn test_simulate_outcomes_switches_to_streaming() {
    let (store, id) = store();
    let goal = Goal::TerminalValue { amount: 40_000.0 };
    let risk = RiskConfig::default();

    let defaults = StreamingOptions::default();
    let exact = simulate_outcomes(&store, &id, &config(50), &goal, &risk, &defaults, None).unwrap();
    assert!(!exact.streamed);

    let options = StreamingOptions {
        threshold: 49,
        ..StreamingOptions::default()
    };
    let streamed =
        simulate_outcomes(&store, &id, &config(50), &goal, &risk, &options, None).unwrap();
    assert!(streamed.streamed);
    assert_eq!(exact.summary.success_probability, streamed.summary.success_probability);
}

#[test]
fn test_invalid_risk_config_rejected() {
    let (store, id) = store();
    let risk = RiskConfig {
        confidence: 1.5,
        ..RiskConfig::default()
    };
    let result = simulate_outcomes(
        &store,
        &id,
        &config(4),
        &Goal::NeverDeplete,
        &risk,
        &StreamingOptions::default(),
        None,
    );
    assert!(matches!(result, Err(SimulationError::Config(_))));
}
