//! Outcome analytics
//!
//! Summaries and risk metrics are computed either from a complete
//! [`SimulationRun`] held in memory, or in streaming mode where paths are
//! folded into bounded accumulators as they are simulated.

pub mod percentiles;
pub mod risk;
pub mod streaming;
pub mod summary;

pub use percentiles::{STANDARD_PERCENTILES, find_percentile_value, percentile_sorted, percentiles};
pub use risk::{
    DrawdownSummary, RiskConfig, RiskMetrics, VarBasis, cumulative_return, historical_var_cvar,
    max_drawdown, risk_metrics, risk_metrics_from_returns,
};
pub use streaming::{OnlineMoments, P2Quantile, StreamingAnalytics, StreamingOptions, TailSample};
pub use summary::{Goal, OutcomeSummary, PercentileBand, summarize, summarize_with};

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::model::SimulationRun;
use crate::progress::SimulationProgress;
use crate::simulation::SimulationEngine;

/// Outcome summary and risk metrics for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub summary: OutcomeSummary,
    pub risk: RiskMetrics,
    /// Whether the figures came from streaming estimators
    pub streamed: bool,
}

/// Exact analytics over a materialized run
pub fn analyze_run(run: &SimulationRun, goal: &Goal, risk: &RiskConfig) -> Result<OutcomeReport> {
    Ok(OutcomeReport {
        summary: summarize(run, goal)?,
        risk: risk_metrics(run, risk)?,
        streamed: false,
    })
}

/// Simulate and summarize without keeping per-path records
pub fn analyze_streaming(
    engine: &SimulationEngine<'_>,
    config: &SimulationConfig,
    goal: &Goal,
    risk: &RiskConfig,
    options: &StreamingOptions,
    progress: Option<&SimulationProgress>,
) -> Result<OutcomeReport> {
    let mut acc = StreamingAnalytics::new(
        *goal,
        &STANDARD_PERCENTILES,
        config.horizon_periods,
        config.num_paths,
        config.periodicity,
        engine.model().risk_free_rate(),
        risk.clone(),
        options,
    )?;
    engine.for_each_path(config, options.chunk_size, progress, |path| {
        acc.observe(&path);
        Ok(())
    })?;
    tracing::debug!(paths = acc.paths_seen(), "streaming analytics complete");
    let (summary, risk) = acc.finish()?;
    Ok(OutcomeReport {
        summary,
        risk,
        streamed: true,
    })
}
