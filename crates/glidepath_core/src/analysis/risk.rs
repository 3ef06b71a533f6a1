//! Risk metrics over simulated portfolio returns
//!
//! Annualized return and volatility are pooled across every path and period:
//! `mean * ppy` and `std * sqrt(ppy)`. Drawdowns are measured on each path's
//! time-weighted wealth index so cashflows do not register as gains or
//! losses. VaR and CVaR are historical (empirical quantile and tail mean)
//! and reported as positive loss fractions.

use serde::{Deserialize, Serialize};

use super::percentiles::{percentile_sorted, percentiles};
use super::streaming::OnlineMoments;
use crate::error::{Result, SimulationError};
use crate::model::{PathMatrix, Periodicity, SimulationRun};

/// Sample used for VaR/CVaR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VarBasis {
    /// Every per-period portfolio return across all paths
    #[default]
    Periodic,
    /// Each path's cumulative time-weighted return over the horizon
    Terminal,
}

fn default_confidence() -> f64 {
    0.95
}

fn default_drawdown_percentiles() -> Vec<f64> {
    vec![0.50, 0.90, 0.95]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// VaR/CVaR confidence level in (0, 1)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub basis: VarBasis,
    #[serde(default = "default_drawdown_percentiles")]
    pub drawdown_percentiles: Vec<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            basis: VarBasis::default(),
            drawdown_percentiles: default_drawdown_percentiles(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(SimulationError::config(format!(
                "confidence must be in (0, 1), got {}",
                self.confidence
            )));
        }
        if self
            .drawdown_percentiles
            .iter()
            .any(|p| !(0.0..=1.0).contains(p))
        {
            return Err(SimulationError::config(
                "drawdown percentiles must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownSummary {
    /// Mean of per-path maximum drawdowns
    pub mean: f64,
    /// Largest drawdown of any path
    pub worst: f64,
    /// `(percentile, value)` pairs over per-path maximum drawdowns
    pub percentiles: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub num_paths: usize,
    pub periods_per_year: u32,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub risk_free_rate: f64,
    /// `None` when volatility is zero
    pub sharpe_ratio: Option<f64>,
    /// `None` when there is no downside deviation
    pub sortino_ratio: Option<f64>,
    pub max_drawdown: DrawdownSummary,
    pub confidence: f64,
    pub basis: VarBasis,
    pub value_at_risk: f64,
    pub conditional_value_at_risk: f64,
}

/// Annualized return, volatility, Sharpe and Sortino from pooled per-period
/// moments. `downside_mean_sq` is the mean of `min(r - rf_period, 0)^2`.
pub(crate) fn annualized_ratios(
    moments: &OnlineMoments,
    downside_mean_sq: f64,
    periods_per_year: u32,
    risk_free_rate: f64,
) -> (f64, f64, Option<f64>, Option<f64>) {
    let ppy = f64::from(periods_per_year);
    let annual_return = moments.mean() * ppy;
    let annual_vol = moments.std_dev() * ppy.sqrt();
    let excess = annual_return - risk_free_rate;
    let sharpe = (annual_vol > 0.0).then(|| excess / annual_vol);
    let downside_dev = downside_mean_sq.sqrt() * ppy.sqrt();
    let sortino = (downside_dev > 0.0).then(|| excess / downside_dev);
    (annual_return, annual_vol, sharpe, sortino)
}

/// Risk-free return per period
pub(crate) fn period_risk_free(periodicity: Periodicity, risk_free_rate: f64) -> f64 {
    periodicity.period_return(risk_free_rate)
}

/// Largest peak-to-trough decline of the wealth index built from `returns`,
/// as a fraction of the peak. The index starts at 1.0.
#[must_use]
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for r in returns {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        if peak > 0.0 {
            worst = worst.max((peak - wealth) / peak);
        }
    }
    worst
}

/// Cumulative time-weighted return over a path
#[must_use]
pub fn cumulative_return(returns: &[f64]) -> f64 {
    returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
}

/// Historical VaR and CVaR at `confidence` from a sample of returns.
///
/// VaR is the loss at the `1 - confidence` quantile; CVaR is the mean loss of
/// returns at or below that quantile. Both are floored at zero and CVaR is
/// never below VaR. Sorts `returns` in place.
pub fn historical_var_cvar(returns: &mut [f64], confidence: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    returns.sort_by(f64::total_cmp);
    let q = percentile_sorted(returns, 1.0 - confidence);
    let tail_len = returns.partition_point(|r| *r <= q);
    let tail = &returns[..tail_len.max(1)];
    let tail_mean = tail.iter().sum::<f64>() / tail.len() as f64;
    let var = (-q).max(0.0);
    let cvar = (-tail_mean).max(var);
    (var, cvar)
}

pub(crate) fn insufficient_paths(actual: usize) -> SimulationError {
    SimulationError::InsufficientData {
        statistic: "risk metrics",
        required: 2,
        actual,
    }
}

/// Risk metrics for a run, using the run's risk-free rate
pub fn risk_metrics(run: &SimulationRun, config: &RiskConfig) -> Result<RiskMetrics> {
    risk_metrics_from_returns(
        run.returns(),
        run.config().periodicity,
        run.risk_free_rate(),
        config,
    )
}

/// Risk metrics from a `paths x periods` matrix of portfolio returns.
///
/// Fails with `InsufficientData` for fewer than two paths.
pub fn risk_metrics_from_returns(
    returns: &PathMatrix,
    periodicity: Periodicity,
    risk_free_rate: f64,
    config: &RiskConfig,
) -> Result<RiskMetrics> {
    config.validate()?;
    let n = returns.num_paths();
    if n < 2 || returns.num_periods() == 0 {
        return Err(insufficient_paths(if returns.num_periods() == 0 { 0 } else { n }));
    }

    let rf_period = period_risk_free(periodicity, risk_free_rate);
    let mut moments = OnlineMoments::default();
    let mut downside_sq = 0.0;
    let mut drawdowns = Vec::with_capacity(n);
    let mut terminal = Vec::with_capacity(n);
    for row in returns.rows() {
        for r in row {
            moments.push(*r);
            let shortfall = (r - rf_period).min(0.0);
            downside_sq += shortfall * shortfall;
        }
        drawdowns.push(max_drawdown(row));
        terminal.push(cumulative_return(row));
    }

    let downside_mean_sq = downside_sq / moments.count() as f64;
    let (annualized_return, annualized_volatility, sharpe_ratio, sortino_ratio) =
        annualized_ratios(
            &moments,
            downside_mean_sq,
            periodicity.periods_per_year(),
            risk_free_rate,
        );

    let mut var_sample: Vec<f64> = match config.basis {
        VarBasis::Periodic => returns.rows().flatten().copied().collect(),
        VarBasis::Terminal => terminal,
    };
    let (value_at_risk, conditional_value_at_risk) =
        historical_var_cvar(&mut var_sample, config.confidence);

    let max_drawdown = DrawdownSummary {
        mean: drawdowns.iter().sum::<f64>() / n as f64,
        worst: drawdowns.iter().copied().fold(0.0, f64::max),
        percentiles: percentiles(&drawdowns, &config.drawdown_percentiles),
    };

    Ok(RiskMetrics {
        num_paths: n,
        periods_per_year: periodicity.periods_per_year(),
        annualized_return,
        annualized_volatility,
        risk_free_rate,
        sharpe_ratio,
        sortino_ratio,
        max_drawdown,
        confidence: config.confidence,
        basis: config.basis,
        value_at_risk,
        conditional_value_at_risk,
    })
}
