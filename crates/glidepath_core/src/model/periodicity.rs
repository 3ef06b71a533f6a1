//! Simulation period length and rebalance schedules
//!
//! Annual figures convert to monthly ones geometrically for returns and by
//! `sqrt(12)` for volatility.

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// Length of one simulation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Periodicity {
    #[default]
    Monthly,
    Annual,
}

impl Periodicity {
    #[must_use]
    pub fn periods_per_year(self) -> u32 {
        match self {
            Periodicity::Monthly => 12,
            Periodicity::Annual => 1,
        }
    }

    #[must_use]
    pub fn months_per_period(self) -> u32 {
        12 / self.periods_per_year()
    }

    /// Geometric conversion: `(1 + annual)^(1/periods_per_year) - 1`
    #[must_use]
    #[inline]
    pub fn period_return(self, annual_return: f64) -> f64 {
        match self {
            Periodicity::Annual => annual_return,
            Periodicity::Monthly => (1.0 + annual_return).powf(1.0 / 12.0) - 1.0,
        }
    }

    /// Square-root-of-time conversion: `annual / sqrt(periods_per_year)`
    #[must_use]
    #[inline]
    pub fn period_volatility(self, annual_volatility: f64) -> f64 {
        match self {
            Periodicity::Annual => annual_volatility,
            Periodicity::Monthly => annual_volatility / 12.0_f64.sqrt(),
        }
    }
}

/// How often sub-balances are reset to target weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RebalanceFrequency {
    /// Buy and hold; weights drift with returns
    Never,
    Monthly,
    Quarterly,
    #[default]
    Annual,
}

impl RebalanceFrequency {
    #[must_use]
    pub fn months(self) -> Option<u32> {
        match self {
            RebalanceFrequency::Never => None,
            RebalanceFrequency::Monthly => Some(1),
            RebalanceFrequency::Quarterly => Some(3),
            RebalanceFrequency::Annual => Some(12),
        }
    }

    /// Number of simulation periods between rebalances.
    ///
    /// Fails when the frequency is finer than the simulation period (e.g.
    /// quarterly rebalancing of an annual simulation).
    pub fn interval_periods(
        self,
        periodicity: Periodicity,
    ) -> Result<Option<usize>, SimulationError> {
        let Some(months) = self.months() else {
            return Ok(None);
        };
        let per_period = periodicity.months_per_period();
        if months % per_period != 0 {
            return Err(SimulationError::config(format!(
                "{self:?} rebalancing is incompatible with {periodicity:?} periods"
            )));
        }
        Ok(Some((months / per_period) as usize))
    }
}
