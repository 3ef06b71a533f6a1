//! Monte Carlo simulation engine
//!
//! Each path is simulated independently from its own seeded generators (see
//! [`crate::rng`]), so results are bit-identical for a given seed whether
//! paths run sequentially or in parallel, and path `i` does not depend on the
//! total number of paths.
//!
//! Within a period the order of operations is:
//! 1. switch to decumulation if this is the scheduled start period
//! 2. draw correlated asset returns (with any overlay adjustment)
//! 3. grow sub-balances, flooring each at zero
//! 4. apply the period's cashflow (inflation-indexed when flagged)
//! 5. mark the path depleted if decumulating with nothing left
//! 6. rebalance to target weights at the end of each rebalance interval

use std::ops::Range;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::SimulationConfig;
use crate::error::{Result, SimulationError};
use crate::market::CapitalMarketModel;
use crate::model::{
    PathMatrix, RebalanceEvent, RebalanceStats, ReturnOverlay, SimulationRun, cumulative_index,
};
use crate::progress::SimulationProgress;
use crate::rng::{Stream, path_rng};
use crate::simulation_state::{PathPhase, PathState};

/// Output of a single simulated path
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub index: usize,
    /// End-of-period portfolio value
    pub balances: Vec<f64>,
    /// Time-weighted portfolio return per period
    pub returns: Vec<f64>,
    pub depleted_at: Option<usize>,
    pub rebalance: RebalanceStats,
    pub events: Vec<RebalanceEvent>,
    /// Withdrawals that could not be funded
    pub shortfall: f64,
}

impl PathResult {
    #[must_use]
    pub fn terminal_value(&self) -> f64 {
        self.balances.last().copied().unwrap_or(0.0)
    }
}

struct PreparedRun<'s> {
    config: &'s SimulationConfig,
    target: Vec<f64>,
    rebalance_every: Option<usize>,
    overlay: Option<&'s dyn ReturnOverlay>,
    needs_inflation: bool,
}

/// Runs Monte Carlo simulations against one capital market model
#[derive(Debug, Clone)]
pub struct SimulationEngine<'a> {
    model: &'a CapitalMarketModel,
    overlay: Option<Arc<dyn ReturnOverlay>>,
}

impl<'a> SimulationEngine<'a> {
    #[must_use]
    pub fn new(model: &'a CapitalMarketModel) -> Self {
        Self {
            model,
            overlay: None,
        }
    }

    /// Use `overlay` instead of the assumption set's regime model
    #[must_use]
    pub fn with_overlay(mut self, overlay: Arc<dyn ReturnOverlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    #[must_use]
    pub fn model(&self) -> &CapitalMarketModel {
        self.model
    }

    fn prepare<'s>(&'s self, config: &'s SimulationConfig) -> Result<PreparedRun<'s>> {
        config.validate()?;
        if config.periodicity != self.model.periodicity() {
            return Err(SimulationError::config(format!(
                "config uses {:?} periods but the market model is {:?}",
                config.periodicity,
                self.model.periodicity()
            )));
        }
        let target = config.allocation.to_vector(self.model.ids())?;
        let rebalance_every = config.rebalance.interval_periods(config.periodicity)?;
        let overlay: Option<&dyn ReturnOverlay> = match &self.overlay {
            Some(o) => Some(o.as_ref()),
            None if config.use_regimes => self
                .model
                .assumptions()
                .regimes
                .as_ref()
                .map(|r| r as &dyn ReturnOverlay),
            None => None,
        };
        Ok(PreparedRun {
            config,
            target,
            rebalance_every,
            overlay,
            needs_inflation: config.schedule.has_inflation_adjusted(),
        })
    }

    fn run_path(&self, prep: &PreparedRun<'_>, index: usize) -> Result<PathResult> {
        let config = prep.config;
        let model = self.model;
        let periods = config.horizon_periods;
        let n = model.num_assets();

        let mut returns_rng = path_rng(config.seed, index, Stream::Returns);
        let adjustments = prep.overlay.map(|overlay| {
            let mut rng = path_rng(config.seed, index, Stream::Regime);
            overlay.adjustments(periods, &mut rng)
        });
        let price_index = if prep.needs_inflation {
            let mut rng = path_rng(config.seed, index, Stream::Inflation);
            let rates = model
                .assumptions()
                .inflation
                .sample_path(&mut rng, periods, config.periodicity);
            cumulative_index(&rates)
        } else {
            Vec::new()
        };

        let mut state = PathState::new(config.initial_balance, &prep.target);
        let mut balances = Vec::with_capacity(periods);
        let mut port_returns = Vec::with_capacity(periods);
        let mut events = Vec::new();
        let mut shortfall = 0.0;
        let mut z = vec![0.0; n];
        let mut asset_returns = vec![0.0; n];

        for t in 0..periods {
            state.advance_phase(t, config.schedule.decumulation_start);
            let adjustment = adjustments.as_ref().map(|a| &a[t]);
            model.draw_returns(&mut returns_rng, adjustment, &mut z, &mut asset_returns);

            if state.phase.is_terminal() {
                port_returns.push(state.target_return(&asset_returns));
                balances.push(0.0);
                continue;
            }

            let r = state.apply_returns(&asset_returns);
            let level = price_index.get(t).copied().unwrap_or(1.0);
            shortfall += state.apply_cashflow(config.schedule.nominal_amount(t, level));
            state.check_depletion(t);

            if let Some(every) = prep.rebalance_every
                && !state.phase.is_terminal()
                && (t + 1) % every == 0
            {
                let turnover = state.rebalance();
                if config.record_rebalance_events && turnover > 0.0 {
                    events.push(RebalanceEvent {
                        path: index,
                        period: t,
                        turnover,
                    });
                }
            }

            let total = state.total();
            if !total.is_finite() || !r.is_finite() {
                tracing::error!(path = index, period = t, "non-finite value in simulated path");
                return Err(SimulationError::NumericalInstability {
                    path: index,
                    period: t,
                });
            }
            balances.push(total);
            port_returns.push(r);
        }

        let depleted_at = match state.phase {
            PathPhase::Depleted { period } => Some(period),
            _ => None,
        };
        Ok(PathResult {
            index,
            balances,
            returns: port_returns,
            depleted_at,
            rebalance: RebalanceStats {
                count: state.rebalance_count,
                total_turnover: state.total_turnover,
            },
            events,
            shortfall,
        })
    }

    fn collect_paths(
        &self,
        prep: &PreparedRun<'_>,
        paths: Range<usize>,
        progress: Option<&SimulationProgress>,
    ) -> Result<Vec<PathResult>> {
        let run_one = |i: usize| -> Result<PathResult> {
            if progress.is_some_and(SimulationProgress::is_cancelled) {
                return Err(SimulationError::Cancelled);
            }
            let result = self.run_path(prep, i);
            if let Some(p) = progress {
                p.increment();
            }
            result
        };

        #[cfg(feature = "parallel")]
        let results: Vec<Result<PathResult>> = paths.into_par_iter().map(run_one).collect();

        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<PathResult>> = paths.map(run_one).collect();

        if progress.is_some_and(SimulationProgress::is_cancelled) {
            tracing::info!("simulation cancelled");
            return Err(SimulationError::Cancelled);
        }
        results.into_iter().collect()
    }

    /// Simulate a single path of a run. Identical to path `index` of
    /// [`Self::run`] with the same config.
    pub fn simulate_path(&self, config: &SimulationConfig, index: usize) -> Result<PathResult> {
        let prep = self.prepare(config)?;
        self.run_path(&prep, index)
    }

    /// Run all paths and keep the full per-path record
    pub fn run(
        &self,
        config: &SimulationConfig,
        progress: Option<&SimulationProgress>,
    ) -> Result<SimulationRun> {
        let prep = self.prepare(config)?;
        if let Some(p) = progress {
            p.reset(config.num_paths);
        }
        let span = tracing::info_span!(
            "simulation",
            assumption_set = %self.model.assumptions().id,
            paths = config.num_paths,
            periods = config.horizon_periods,
            seed = config.seed,
        );
        let _guard = span.enter();
        let started = std::time::Instant::now();

        let results = self.collect_paths(&prep, 0..config.num_paths, progress)?;

        let periods = config.horizon_periods;
        let mut balance_rows = Vec::with_capacity(results.len());
        let mut return_rows = Vec::with_capacity(results.len());
        let mut depleted_at = Vec::with_capacity(results.len());
        let mut rebalancing = Vec::with_capacity(results.len());
        let mut events = Vec::new();
        for r in results {
            balance_rows.push(r.balances);
            return_rows.push(r.returns);
            depleted_at.push(r.depleted_at);
            rebalancing.push(r.rebalance);
            events.extend(r.events);
        }

        let depleted = depleted_at.iter().filter(|d| d.is_some()).count();
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            depleted,
            "simulation complete"
        );

        Ok(SimulationRun::new(
            self.model.assumptions().id.clone(),
            config.clone(),
            PathMatrix::from_rows(balance_rows, periods),
            PathMatrix::from_rows(return_rows, periods),
            depleted_at,
            rebalancing,
            events,
            self.model.correlation_repair().cloned(),
            self.model.risk_free_rate(),
        ))
    }

    /// Simulate paths in chunks of `chunk_size`, handing each result to
    /// `visit` in path order. Only one chunk is held in memory at a time.
    pub fn for_each_path<F>(
        &self,
        config: &SimulationConfig,
        chunk_size: usize,
        progress: Option<&SimulationProgress>,
        mut visit: F,
    ) -> Result<()>
    where
        F: FnMut(PathResult) -> Result<()>,
    {
        let prep = self.prepare(config)?;
        if let Some(p) = progress {
            p.reset(config.num_paths);
        }
        let chunk = chunk_size.max(1);
        let mut start = 0;
        while start < config.num_paths {
            let end = (start + chunk).min(config.num_paths);
            for result in self.collect_paths(&prep, start..end, progress)? {
                visit(result)?;
            }
            start = end;
        }
        Ok(())
    }
}

/// Convenience wrapper for [`SimulationEngine::run`]
pub fn run_simulation(
    model: &CapitalMarketModel,
    config: &SimulationConfig,
    progress: Option<&SimulationProgress>,
) -> Result<SimulationRun> {
    SimulationEngine::new(model).run(config, progress)
}
