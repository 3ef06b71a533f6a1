//! Outcome summaries: terminal-wealth percentiles, success probability and
//! per-period percentile bands

use serde::{Deserialize, Serialize};

use super::percentiles::{STANDARD_PERCENTILES, percentile_sorted, percentiles};
use crate::error::{Result, SimulationError};
use crate::model::SimulationRun;

/// What counts as success for a path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum Goal {
    /// Terminal balance at least `amount` (nominal dollars)
    TerminalValue { amount: f64 },
    /// Never depleted during decumulation
    #[default]
    NeverDeplete,
}

impl Goal {
    #[must_use]
    #[inline]
    pub fn is_met(&self, terminal_value: f64, depleted_at: Option<usize>) -> bool {
        match self {
            Goal::TerminalValue { amount } => terminal_value >= *amount,
            Goal::NeverDeplete => depleted_at.is_none(),
        }
    }
}

/// Balance percentiles for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    pub period: usize,
    /// `(percentile, value)` pairs
    pub values: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub goal: Goal,
    pub num_paths: usize,
    /// Fraction of paths meeting the goal, in [0, 1]
    pub success_probability: f64,
    /// Terminal balance `(percentile, value)` pairs
    pub terminal_percentiles: Vec<(f64, f64)>,
    pub mean_terminal_value: f64,
    /// Fraction of paths depleted during decumulation
    pub depletion_probability: f64,
    /// Median depletion period among depleted paths
    pub median_depletion_period: Option<f64>,
    /// Per-period balance percentiles (fan chart)
    pub bands: Vec<PercentileBand>,
}

impl OutcomeSummary {
    /// Terminal value at a percentile present in the summary
    #[must_use]
    pub fn terminal_percentile(&self, p: f64) -> Option<f64> {
        super::percentiles::find_percentile_value(&self.terminal_percentiles, p)
    }
}

pub(crate) fn median_of(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(percentile_sorted(values, 0.5))
}

/// Summarize a run against a goal using [`STANDARD_PERCENTILES`].
///
/// Fails with `InsufficientData` for a run with no paths.
pub fn summarize(run: &SimulationRun, goal: &Goal) -> Result<OutcomeSummary> {
    summarize_with(run, goal, &STANDARD_PERCENTILES)
}

pub fn summarize_with(run: &SimulationRun, goal: &Goal, ps: &[f64]) -> Result<OutcomeSummary> {
    let n = run.num_paths();
    if n == 0 || run.num_periods() == 0 {
        return Err(SimulationError::InsufficientData {
            statistic: "outcome summary",
            required: 1,
            actual: n.min(run.num_periods()),
        });
    }

    let terminal = run.terminal_values();
    let depleted = run.depleted_at();
    let successes = terminal
        .iter()
        .zip(depleted)
        .filter(|(v, d)| goal.is_met(**v, **d))
        .count();
    let mut depletion_periods: Vec<f64> = depleted
        .iter()
        .filter_map(|d| d.map(|p| p as f64))
        .collect();

    let balances = run.balances();
    let mut column = vec![0.0; n];
    let bands = (0..run.num_periods())
        .map(|t| {
            for (p, v) in column.iter_mut().enumerate() {
                *v = balances.get(p, t);
            }
            column.sort_by(f64::total_cmp);
            PercentileBand {
                period: t,
                values: ps.iter().map(|&q| (q, percentile_sorted(&column, q))).collect(),
            }
        })
        .collect();

    Ok(OutcomeSummary {
        goal: *goal,
        num_paths: n,
        success_probability: successes as f64 / n as f64,
        terminal_percentiles: percentiles(&terminal, ps),
        mean_terminal_value: terminal.iter().sum::<f64>() / n as f64,
        depletion_probability: depletion_periods.len() as f64 / n as f64,
        median_depletion_period: median_of(&mut depletion_periods),
        bands,
    })
}
