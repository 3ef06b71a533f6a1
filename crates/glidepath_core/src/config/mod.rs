//! Simulation configuration
//!
//! `SimulationConfig` holds everything the engine needs for one run apart from
//! the market assumptions, which are referenced separately by version.
//!
//! # Builder DSL
//!
//! ```ignore
//! use glidepath_core::config::{AssumptionSetBuilder, SimulationBuilder};
//! use glidepath_core::model::AllocationWeights;
//!
//! let assumptions = AssumptionSetBuilder::us_baseline().build()?;
//!
//! let config = SimulationBuilder::new()
//!     .allocation(AllocationWeights::from_pairs([("us_equity", 0.6), ("us_bonds", 0.4)])?)
//!     .years(30)
//!     .paths(10_000)
//!     .seed(42)
//!     .initial_balance(250_000.0)
//!     .contribute(1_000.0, 0..120)
//!     .withdraw_real(4_000.0, 120..360)
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::model::{AllocationWeights, CashflowSchedule, Periodicity, RebalanceFrequency};

pub mod assumption_builder;
pub mod builder;

pub use assumption_builder::AssumptionSetBuilder;
pub use builder::SimulationBuilder;

fn default_true() -> bool {
    true
}

/// Complete configuration of one Monte Carlo run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Target weights; sub-balances start at and rebalance back to these
    pub allocation: AllocationWeights,
    /// One signed cashflow per period
    pub schedule: CashflowSchedule,
    pub horizon_periods: usize,
    pub num_paths: usize,
    #[serde(default)]
    pub rebalance: RebalanceFrequency,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub initial_balance: f64,
    #[serde(default)]
    pub periodicity: Periodicity,
    /// Apply the assumption set's regime model, if it has one
    #[serde(default = "default_true")]
    pub use_regimes: bool,
    /// Keep individual rebalance events in the run (memory grows with paths)
    #[serde(default)]
    pub record_rebalance_events: bool,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.horizon_periods == 0 {
            return Err(SimulationError::config("horizon must be at least one period"));
        }
        if self.num_paths == 0 {
            return Err(SimulationError::config("number of paths must be positive"));
        }
        if !self.initial_balance.is_finite() || self.initial_balance < 0.0 {
            return Err(SimulationError::config(format!(
                "initial balance must be finite and non-negative, got {}",
                self.initial_balance
            )));
        }
        self.schedule.validate(self.horizon_periods)?;
        self.rebalance.interval_periods(self.periodicity)?;
        Ok(())
    }

    /// Horizon in years (fractional for partial years)
    #[must_use]
    pub fn horizon_years(&self) -> f64 {
        self.horizon_periods as f64 / f64::from(self.periodicity.periods_per_year())
    }

    /// Copy with a different path count, e.g. for a quick preview run
    #[must_use]
    pub fn with_paths(&self, num_paths: usize) -> Self {
        Self {
            num_paths,
            ..self.clone()
        }
    }
}
