//! Tests for rebalancing schedules
//!
//! These tests verify that:
//! - Rebalances happen once per interval and never with `Never`
//! - Intervals incompatible with the period length are rejected
//! - Recorded events agree with the per-path statistics
//! - A single-asset portfolio never trades

use super::baseline_model;
use crate::config::SimulationBuilder;
use crate::error::SimulationError;
use crate::model::{AllocationWeights, Periodicity, RebalanceFrequency};
use crate::simulation::SimulationEngine;

fn balanced() -> AllocationWeights {
    AllocationWeights::from_pairs([("us_equity", 0.6), ("us_bonds", 0.4)]).unwrap()
}

#[test]
fn test_never_rebalances() {
    let model = baseline_model(Periodicity::Monthly);
    let config = SimulationBuilder::new()
        .allocation(balanced())
        .years(5)
        .paths(8)
        .initial_balance(10_000.0)
        .rebalance(RebalanceFrequency::Never)
        .build()
        .unwrap();
    let run = SimulationEngine::new(&model).run(&config, None).unwrap();
    assert!(run.rebalancing().iter().all(|s| s.count == 0 && s.total_turnover == 0.0));
}

#[test]
fn test_quarterly_on_monthly_periods() {
    let model = baseline_model(Periodicity::Monthly);
    let config = SimulationBuilder::new()
        .allocation(balanced())
        .years(2)
        .paths(8)
        .initial_balance(10_000.0)
        .rebalance(RebalanceFrequency::Quarterly)
        .build()
        .unwrap();
    let run = SimulationEngine::new(&model).run(&config, None).unwrap();
    for stats in run.rebalancing() {
        assert_eq!(stats.count, 8);
        assert!(stats.total_turnover > 0.0);
    }
}

#[test]
fn test_annual_on_annual_periods() {
    let model = baseline_model(Periodicity::Annual);
    let config = SimulationBuilder::new()
        .allocation(balanced())
        .annual()
        .years(10)
        .paths(8)
        .initial_balance(10_000.0)
        .build()
        .unwrap();
    let run = SimulationEngine::new(&model).run(&config, None).unwrap();
    assert!(run.rebalancing().iter().all(|s| s.count == 10));
}

#[test]
fn test_sub_annual_interval_on_annual_periods_rejected() {
    let result = SimulationBuilder::new()
        .allocation(balanced())
        .annual()
        .years(10)
        .rebalance(RebalanceFrequency::Quarterly)
        .build();
    assert!(matches!(result, Err(SimulationError::Config(_))));
}

#[test]
fn test_recorded_events_match_stats() {
    let model = baseline_model(Periodicity::Monthly);
    let config = SimulationBuilder::new()
        .allocation(balanced())
        .years(3)
        .paths(6)
        .initial_balance(10_000.0)
        .rebalance(RebalanceFrequency::Monthly)
        .record_rebalance_events()
        .build()
        .unwrap();
    let run = SimulationEngine::new(&model).run(&config, None).unwrap();

    let total: usize = run.rebalancing().iter().map(|s| s.count).sum();
    assert_eq!(run.rebalance_events().len(), total);
    for (path, stats) in run.rebalancing().iter().enumerate() {
        let turnover: f64 = run
            .rebalance_events()
            .iter()
            .filter(|e| e.path == path)
            .map(|e| e.turnover)
            .sum();
        assert!((turnover - stats.total_turnover).abs() < 1e-12);
    }
    assert!(run.rebalance_events().iter().all(|e| e.turnover > 0.0 && e.turnover <= 1.0));
}

#[test]
fn test_events_not_recorded_by_default() {
    let model = baseline_model(Periodicity::Monthly);
    let config = SimulationBuilder::new()
        .allocation(balanced())
        .years(2)
        .paths(4)
        .initial_balance(10_000.0)
        .build()
        .unwrap();
    let run = SimulationEngine::new(&model).run(&config, None).unwrap();
    assert!(run.rebalance_events().is_empty());
    assert!(run.rebalancing().iter().all(|s| s.count == 2));
}

#[test]
fn test_single_asset_has_no_turnover() {
    let model = baseline_model(Periodicity::Monthly);
    let config = SimulationBuilder::new()
        .allocation(AllocationWeights::single("us_equity"))
        .years(3)
        .paths(4)
        .initial_balance(10_000.0)
        .build()
        .unwrap();
    let run = SimulationEngine::new(&model).run(&config, None).unwrap();
    assert!(run.rebalancing().iter().all(|s| s.total_turnover == 0.0));
}
