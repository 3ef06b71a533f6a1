//! Request-level entry points
//!
//! Plain data in and out. Assumption sets are resolved through an
//! [`AssumptionStore`] owned by the caller; nothing here keeps state between
//! calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

use crate::analysis::{
    Goal, OutcomeReport, OutcomeSummary, RiskConfig, StreamingOptions, analyze_run,
    analyze_streaming, summarize,
};
use crate::config::SimulationConfig;
use crate::error::{LookupError, Result};
use crate::market::CapitalMarketModel;
use crate::model::{
    AllocationWeights, AssumptionSetId, MarketAssumptionSet, Periodicity, SimulationRun,
};
use crate::optimization::{
    EfficientFrontier, RiskBand, compute_efficient_frontier, model_portfolio_for,
};
use crate::progress::SimulationProgress;
use crate::simulation::SimulationEngine;

/// Read-only lookup of assumption snapshots by id and version
pub trait AssumptionStore: Send + Sync {
    fn get(&self, id: &AssumptionSetId) -> Result<Arc<MarketAssumptionSet>>;

    /// Market model for a stored set. Stores that cache models override this.
    fn model(
        &self,
        id: &AssumptionSetId,
        periodicity: Periodicity,
    ) -> Result<Arc<CapitalMarketModel>> {
        Ok(Arc::new(CapitalMarketModel::new(self.get(id)?, periodicity)?))
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct StaticAssumptionStore {
    sets: FxHashMap<AssumptionSetId, Arc<MarketAssumptionSet>>,
}

impl StaticAssumptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a snapshot, replacing any with the same id
    pub fn insert(&mut self, set: MarketAssumptionSet) -> Result<AssumptionSetId> {
        set.validate()?;
        let id = set.id.clone();
        self.sets.insert(id.clone(), Arc::new(set));
        Ok(id)
    }

    pub fn with_set(mut self, set: MarketAssumptionSet) -> Result<Self> {
        self.insert(set)?;
        Ok(self)
    }

    /// Ids in ascending order
    #[must_use]
    pub fn ids(&self) -> Vec<AssumptionSetId> {
        let mut ids: Vec<_> = self.sets.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Highest version stored under `name`
    #[must_use]
    pub fn latest(&self, name: &str) -> Option<AssumptionSetId> {
        self.sets
            .keys()
            .filter(|id| id.name == name)
            .max_by_key(|id| id.version)
            .cloned()
    }
}

impl AssumptionStore for StaticAssumptionStore {
    fn get(&self, id: &AssumptionSetId) -> Result<Arc<MarketAssumptionSet>> {
        self.sets
            .get(id)
            .cloned()
            .ok_or_else(|| LookupError::AssumptionSetNotFound(id.clone()).into())
    }
}

/// Caller-owned cache of capital market models in front of another store.
///
/// Snapshots are immutable per id, so entries never go stale; building a
/// model (validation, correlation repair, Cholesky) happens once per
/// `(id, periodicity)`.
#[derive(Debug)]
pub struct AssumptionCache<S> {
    inner: S,
    models: Mutex<ModelMap>,
}

type ModelMap = FxHashMap<(AssumptionSetId, Periodicity), Arc<CapitalMarketModel>>;

impl<S: AssumptionStore> AssumptionCache<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            models: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn model(
        &self,
        id: &AssumptionSetId,
        periodicity: Periodicity,
    ) -> Result<Arc<CapitalMarketModel>> {
        let key = (id.clone(), periodicity);
        if let Some(m) = self.lock().get(&key) {
            return Ok(Arc::clone(m));
        }
        let model = Arc::new(CapitalMarketModel::new(self.inner.get(id)?, periodicity)?);
        tracing::debug!(assumption_set = %id, ?periodicity, "cached market model");
        Ok(Arc::clone(self.lock().entry(key).or_insert(model)))
    }

    /// Number of cached models
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, ModelMap> {
        self.models.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: AssumptionStore> AssumptionStore for AssumptionCache<S> {
    fn get(&self, id: &AssumptionSetId) -> Result<Arc<MarketAssumptionSet>> {
        self.inner.get(id)
    }

    fn model(
        &self,
        id: &AssumptionSetId,
        periodicity: Periodicity,
    ) -> Result<Arc<CapitalMarketModel>> {
        AssumptionCache::model(self, id, periodicity)
    }
}

/// Run a full simulation against a stored assumption set
pub fn run_simulation(
    store: &dyn AssumptionStore,
    assumption_set: &AssumptionSetId,
    config: &SimulationConfig,
    progress: Option<&SimulationProgress>,
) -> Result<SimulationRun> {
    let model = store.model(assumption_set, config.periodicity)?;
    SimulationEngine::new(&model).run(config, progress)
}

/// Efficient frontier for a stored assumption set, on annual figures
pub fn get_efficient_frontier(
    store: &dyn AssumptionStore,
    assumption_set: &AssumptionSetId,
    num_points: usize,
) -> Result<EfficientFrontier> {
    let model = store.model(assumption_set, Periodicity::Annual)?;
    compute_efficient_frontier(&model, num_points)
}

pub fn get_model_portfolio(band: RiskBand, age: u32) -> Result<AllocationWeights> {
    model_portfolio_for(band, age)
}

pub fn summarize_run(run: &SimulationRun, goal: &Goal) -> Result<OutcomeSummary> {
    summarize(run, goal)
}

/// Simulate and analyze in one call.
///
/// Runs above `options.threshold` paths use streaming analytics so memory
/// stays bounded; smaller runs are materialized and analyzed exactly.
pub fn simulate_outcomes(
    store: &dyn AssumptionStore,
    assumption_set: &AssumptionSetId,
    config: &SimulationConfig,
    goal: &Goal,
    risk: &RiskConfig,
    options: &StreamingOptions,
    progress: Option<&SimulationProgress>,
) -> Result<OutcomeReport> {
    let model = store.model(assumption_set, config.periodicity)?;
    analyze_model(&model, config, goal, risk, options, progress)
}

/// [`simulate_outcomes`] against an already built model
pub fn analyze_model(
    model: &CapitalMarketModel,
    config: &SimulationConfig,
    goal: &Goal,
    risk: &RiskConfig,
    options: &StreamingOptions,
    progress: Option<&SimulationProgress>,
) -> Result<OutcomeReport> {
    risk.validate()?;
    let engine = SimulationEngine::new(model);
    if config.num_paths > options.threshold {
        tracing::info!(
            paths = config.num_paths,
            threshold = options.threshold,
            "using streaming analytics"
        );
        analyze_streaming(&engine, config, goal, risk, options, progress)
    } else {
        let run = engine.run(config, progress)?;
        analyze_run(&run, goal, risk)
    }
}
