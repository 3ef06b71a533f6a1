//! Simulation output types

use serde::{Deserialize, Serialize};

use super::correlation::CorrelationRepair;
use super::ids::AssumptionSetId;
use crate::config::SimulationConfig;

/// Dense `paths x periods` matrix stored row-major by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMatrix {
    num_paths: usize,
    num_periods: usize,
    values: Vec<f64>,
}

impl PathMatrix {
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<f64>>, num_periods: usize) -> Self {
        let num_paths = rows.len();
        let mut values = Vec::with_capacity(num_paths * num_periods);
        for row in rows {
            debug_assert_eq!(row.len(), num_periods);
            values.extend(row);
        }
        Self {
            num_paths,
            num_periods,
            values,
        }
    }

    #[must_use]
    pub fn num_paths(&self) -> usize {
        self.num_paths
    }

    #[must_use]
    pub fn num_periods(&self) -> usize {
        self.num_periods
    }

    #[must_use]
    #[inline]
    pub fn row(&self, path: usize) -> &[f64] {
        let start = path * self.num_periods;
        &self.values[start..start + self.num_periods]
    }

    #[must_use]
    #[inline]
    pub fn get(&self, path: usize, period: usize) -> f64 {
        self.values[path * self.num_periods + period]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics; a matrix with no periods has no rows to yield
        self.values.chunks(self.num_periods.max(1)).take(self.num_paths)
    }

    /// Values of one period across all paths, in path order
    #[must_use]
    pub fn column(&self, period: usize) -> Vec<f64> {
        (0..self.num_paths).map(|p| self.get(p, period)).collect()
    }

    /// Last column (empty if there are no periods)
    #[must_use]
    pub fn last_column(&self) -> Vec<f64> {
        match self.num_periods {
            0 => Vec::new(),
            n => self.column(n - 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RebalanceEvent {
    pub path: usize,
    pub period: usize,
    /// One-way turnover as a fraction of portfolio value
    pub turnover: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RebalanceStats {
    pub count: usize,
    /// Sum of one-way turnover fractions
    pub total_turnover: f64,
}

/// Complete record of a Monte Carlo run.
///
/// Created once by the simulation engine and never mutated. Carries the
/// inputs (assumption set version, config, seed) needed to reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    assumption_set: AssumptionSetId,
    config: SimulationConfig,
    balances: PathMatrix,
    returns: PathMatrix,
    depleted_at: Vec<Option<usize>>,
    rebalancing: Vec<RebalanceStats>,
    #[serde(default)]
    rebalance_events: Vec<RebalanceEvent>,
    #[serde(default)]
    correlation_repair: Option<CorrelationRepair>,
    risk_free_rate: f64,
}

impl SimulationRun {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        assumption_set: AssumptionSetId,
        config: SimulationConfig,
        balances: PathMatrix,
        returns: PathMatrix,
        depleted_at: Vec<Option<usize>>,
        rebalancing: Vec<RebalanceStats>,
        rebalance_events: Vec<RebalanceEvent>,
        correlation_repair: Option<CorrelationRepair>,
        risk_free_rate: f64,
    ) -> Self {
        Self {
            assumption_set,
            config,
            balances,
            returns,
            depleted_at,
            rebalancing,
            rebalance_events,
            correlation_repair,
            risk_free_rate,
        }
    }

    #[must_use]
    pub fn assumption_set(&self) -> &AssumptionSetId {
        &self.assumption_set
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    #[must_use]
    pub fn num_paths(&self) -> usize {
        self.balances.num_paths()
    }

    #[must_use]
    pub fn num_periods(&self) -> usize {
        self.balances.num_periods()
    }

    /// End-of-period portfolio value per path
    #[must_use]
    pub fn balances(&self) -> &PathMatrix {
        &self.balances
    }

    /// Time-weighted portfolio return per path and period
    #[must_use]
    pub fn returns(&self) -> &PathMatrix {
        &self.returns
    }

    #[must_use]
    pub fn terminal_values(&self) -> Vec<f64> {
        self.balances.last_column()
    }

    /// Period in which each path was depleted during decumulation
    #[must_use]
    pub fn depleted_at(&self) -> &[Option<usize>] {
        &self.depleted_at
    }

    #[must_use]
    pub fn rebalancing(&self) -> &[RebalanceStats] {
        &self.rebalancing
    }

    /// Individual rebalance events; empty unless requested in the config
    #[must_use]
    pub fn rebalance_events(&self) -> &[RebalanceEvent] {
        &self.rebalance_events
    }

    #[must_use]
    pub fn correlation_repair(&self) -> Option<&CorrelationRepair> {
        self.correlation_repair.as_ref()
    }

    /// Annual risk-free rate of the assumption set used for the run
    #[must_use]
    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matrix_access() {
        let m = PathMatrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]], 3);
        assert_eq!(m.num_paths(), 2);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(m.get(0, 2), 3.0);
        assert_eq!(m.column(1), vec![2.0, 5.0]);
        assert_eq!(m.last_column(), vec![3.0, 6.0]);
        assert_eq!(m.rows().count(), 2);
    }
}
