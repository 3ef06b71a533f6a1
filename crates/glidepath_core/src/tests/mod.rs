//! Integration tests for the glidepath engine
//!
//! Tests are organized by topic:
//! - `determinism` - Seeding, path independence and execution order
//! - `cashflows` - Growth, contributions, withdrawals and depletion
//! - `rebalancing` - Rebalance schedules and turnover accounting
//! - `regimes` - Regime overlays applied inside the engine
//! - `outcomes` - Summaries, risk metrics and streaming parity
//! - `portfolios` - Frontier and model portfolio properties on real assumptions
//! - `service` - Store lookups, caching and request entry points

mod determinism;
mod rebalancing;
mod service;

use std::sync::Arc;

use crate::config::AssumptionSetBuilder;
use crate::market::CapitalMarketModel;
use crate::model::{AssetClass, InflationModel, Periodicity};

/// Baseline US assumptions at the given periodicity
fn baseline_model(periodicity: Periodicity) -> CapitalMarketModel {
    let set = AssumptionSetBuilder::us_baseline().build().unwrap();
    CapitalMarketModel::new(Arc::new(set), periodicity).unwrap()
}

/// Single asset with negligible volatility, so paths are effectively
/// deterministic at `annual_return`
fn flat_model(annual_return: f64, inflation: InflationModel) -> CapitalMarketModel {
    let set = AssumptionSetBuilder::new("flat", 1)
        .as_of(2025, 1, 1)
        .asset(AssetClass::new("flat", annual_return, 1e-12))
        .inflation(inflation)
        .build()
        .unwrap();
    CapitalMarketModel::new(Arc::new(set), Periodicity::Annual).unwrap()
}
