//! Subcommand implementations
//!
//! Each command returns a serializable report; `main` decides where the JSON
//! goes. The caller-owned [`AssumptionCache`] lives here, so a market model is
//! built once per assumption set and periodicity for the whole invocation.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::eyre::{Result, bail};
use glidepath_core::analysis::{OutcomeReport, StreamingOptions};
use glidepath_core::model::{
    AllocationWeights, AssetClassId, AssumptionSetId, CorrelationRepair, Periodicity,
};
use glidepath_core::optimization::{
    EfficientFrontier, EfficientFrontierPoint, InstrumentPick, RiskBand, bond_share,
    max_sharpe_portfolio, recommend_instruments,
};
use glidepath_core::service::{
    AssumptionCache, AssumptionStore, StaticAssumptionStore, analyze_model,
    get_efficient_frontier, get_model_portfolio,
};
use glidepath_core::{SimulationError, SimulationProgress};
use jiff::civil::Date;
use serde::Serialize;

use crate::scenario::{AssumptionRef, Scenario};
use crate::storage::resolve_assumptions;

/// How often the watcher logs progress while a run is in flight
const PROGRESS_TICK: Duration = Duration::from_secs(2);

pub type Cache = AssumptionCache<StaticAssumptionStore>;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Override the scenario's path count
    pub paths: Option<usize>,
    /// Cancel the run once this much wall time has passed
    pub timeout: Option<Duration>,
    pub streaming: StreamingOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub assumption_set: AssumptionSetId,
    pub periodicity: Periodicity,
    pub horizon_periods: usize,
    pub allocation: AllocationWeights,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_repair: Option<CorrelationRepair>,
    #[serde(flatten)]
    pub outcome: OutcomeReport,
}

pub fn simulate(
    cache: &Cache,
    scenario: &Scenario,
    options: &RunOptions,
) -> Result<SimulationReport> {
    let id = resolve_assumptions(cache.inner(), &scenario.assumptions)?;
    let config = scenario.to_config(options.paths)?;
    let model = cache.model(&id, config.periodicity)?;

    tracing::info!(
        scenario = %scenario.name,
        assumption_set = %id,
        paths = config.num_paths,
        periods = config.horizon_periods,
        "simulating scenario"
    );
    let started = Instant::now();
    let result = with_progress(options.timeout, config.num_paths, |progress| {
        analyze_model(
            &model,
            &config,
            &scenario.goal,
            &scenario.risk,
            &options.streaming,
            Some(progress),
        )
    });
    let outcome = match result {
        Err(SimulationError::Cancelled) => {
            bail!(
                "simulation of '{}' cancelled after {:.1}s",
                scenario.name,
                started.elapsed().as_secs_f64()
            )
        }
        other => other?,
    };
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        success_probability = outcome.summary.success_probability,
        "simulation finished"
    );

    Ok(SimulationReport {
        scenario: scenario.name.clone(),
        assumption_set: id,
        periodicity: config.periodicity,
        horizon_periods: config.horizon_periods,
        allocation: config.allocation.clone(),
        correlation_repair: model.correlation_repair().cloned(),
        outcome,
    })
}

/// Run `f` with a progress handle watched from a helper thread. The watcher
/// logs progress and cancels the run when `timeout` expires.
fn with_progress<T>(
    timeout: Option<Duration>,
    total: usize,
    f: impl FnOnce(&SimulationProgress) -> T,
) -> T {
    let progress = SimulationProgress::new(total);
    let progress = &progress;
    let deadline = timeout.map(|t| Instant::now() + t);
    let (done_tx, done_rx) = mpsc::channel::<()>();

    thread::scope(|s| {
        s.spawn(move || watch(progress, deadline, &done_rx));
        let out = f(progress);
        drop(done_tx);
        out
    })
}

fn watch(progress: &SimulationProgress, deadline: Option<Instant>, done: &Receiver<()>) {
    loop {
        let wait = match deadline {
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    tracing::warn!(
                        completed = progress.completed(),
                        total = progress.total(),
                        "timeout reached, cancelling simulation"
                    );
                    progress.cancel();
                    return;
                }
                (d - now).min(PROGRESS_TICK)
            }
            None => PROGRESS_TICK,
        };
        match done.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => tracing::debug!(
                completed = progress.completed(),
                total = progress.total(),
                "simulation progress"
            ),
            _ => return,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrontierReport {
    #[serde(flatten)]
    pub frontier: EfficientFrontier,
    pub max_sharpe: EfficientFrontierPoint,
}

/// Efficient frontier and tangency portfolio. `risk_free_rate` overrides the
/// assumption set's rate for the tangency portfolio only.
pub fn frontier(
    cache: &Cache,
    reference: &AssumptionRef,
    num_points: usize,
    risk_free_rate: Option<f64>,
) -> Result<FrontierReport> {
    let id = resolve_assumptions(cache.inner(), reference)?;
    let frontier = get_efficient_frontier(cache, &id, num_points)?;
    let model = cache.model(&id, Periodicity::Annual)?;
    let rf = risk_free_rate.unwrap_or_else(|| model.risk_free_rate());
    let max_sharpe = max_sharpe_portfolio(&model, rf)?;
    if frontier.skipped > 0 {
        tracing::warn!(skipped = frontier.skipped, "some frontier targets were infeasible");
    }
    Ok(FrontierReport {
        frontier,
        max_sharpe,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub band: RiskBand,
    pub age: u32,
    pub bond_share: f64,
    pub weights: AllocationWeights,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruments: Option<BTreeMap<AssetClassId, InstrumentPick>>,
}

/// Model portfolio for a band and age, optionally mapped to funds
pub fn portfolio(
    band: RiskBand,
    age: u32,
    cost_sensitivity: Option<f64>,
) -> Result<PortfolioReport> {
    let weights = get_model_portfolio(band, age)?;
    let instruments = cost_sensitivity
        .map(|cs| recommend_instruments(&weights, cs))
        .transpose()?;
    Ok(PortfolioReport {
        band,
        age,
        bond_share: bond_share(band, age),
        weights,
        instruments,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AssumptionSummary {
    pub id: AssumptionSetId,
    pub as_of: Date,
    pub asset_classes: Vec<AssetClassId>,
    pub risk_free_rate: f64,
    pub has_regimes: bool,
    pub repaired_correlations: bool,
}

pub fn list_assumptions(store: &StaticAssumptionStore) -> Result<Vec<AssumptionSummary>> {
    store
        .ids()
        .into_iter()
        .map(|id| {
            let set = store.get(&id)?;
            Ok(AssumptionSummary {
                as_of: set.as_of,
                asset_classes: set.ids(),
                risk_free_rate: set.risk_free_rate,
                has_regimes: set.regimes.is_some(),
                repaired_correlations: set.correlation.was_repaired(),
                id,
            })
        })
        .collect()
}
