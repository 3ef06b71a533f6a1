//! Household investment projection library
//!
//! This crate provides a capital market model, a long-only portfolio
//! optimizer and a Monte Carlo engine for long-horizon savings and
//! retirement projections. It supports:
//! - Correlated multi-asset returns with automatic repair of
//!   non-positive-definite correlation matrices
//! - Inflation models (fixed, log-normal, mean-reverting) and Markov regime
//!   switching (bull / bear / crisis)
//! - Accumulation then decumulation cashflows, optionally inflation-indexed,
//!   with periodic rebalancing
//! - Efficient frontier, maximum-Sharpe and age-banded model portfolios
//! - Outcome percentiles, success probability, Sharpe, Sortino, drawdown,
//!   VaR and CVaR, exactly or in bounded memory
//!
//! # Builder DSL
//!
//! ```ignore
//! use std::sync::Arc;
//! use glidepath_core::{AssumptionSetBuilder, CapitalMarketModel, SimulationBuilder};
//! use glidepath_core::model::{AllocationWeights, Periodicity};
//!
//! let assumptions = Arc::new(AssumptionSetBuilder::us_baseline().build()?);
//! let model = CapitalMarketModel::new(assumptions, Periodicity::Monthly)?;
//!
//! let config = SimulationBuilder::new()
//!     .allocation(AllocationWeights::from_pairs([("us_equity", 0.6), ("us_bonds", 0.4)])?)
//!     .years(30)
//!     .initial_balance(100_000.0)
//!     .contribute(1_000.0, 0..240)
//!     .withdraw_real(3_500.0, 240..360)
//!     .seed(7)
//!     .build()?;
//!
//! let run = glidepath_core::run_simulation(&model, &config, None)?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod analysis;
pub mod error;
pub mod market;
pub mod optimization;
pub mod progress;
pub mod rng;
pub mod service;
pub mod simulation;
pub mod simulation_state;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::{AssumptionSetBuilder, SimulationBuilder, SimulationConfig};
pub use error::{Result, SimulationError};
pub use market::CapitalMarketModel;
pub use progress::SimulationProgress;
pub use simulation::{PathResult, SimulationEngine, run_simulation};
