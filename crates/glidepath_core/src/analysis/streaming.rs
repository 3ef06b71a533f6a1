//! Bounded-memory analytics for very large path counts
//!
//! Paths are folded in one at a time, in path order, into constant-size
//! accumulators: Welford moments, P² quantile estimators (Jain and Chlamtac,
//! 1985) and a bounded sample of the worst outcomes for VaR/CVaR. Results
//! approximate the in-memory summaries; tail statistics are exact while the
//! tail sample can hold every observation at or below the VaR quantile.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use super::percentiles::percentile_sorted;
use super::risk::{
    DrawdownSummary, RiskConfig, RiskMetrics, VarBasis, annualized_ratios, cumulative_return,
    insufficient_paths, max_drawdown, period_risk_free,
};
use super::summary::{Goal, OutcomeSummary, PercentileBand};
use crate::error::{Result, SimulationError};
use crate::model::Periodicity;
use crate::simulation::PathResult;

/// Running count, mean and variance (Welford)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OnlineMoments {
    count: u64,
    mean: f64,
    m2: f64,
}

impl OnlineMoments {
    #[inline]
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Combine two accumulators (Chan et al.)
    pub fn merge(&mut self, other: &OnlineMoments) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let total = self.count + other.count;
        let delta = other.mean - self.mean;
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        self.mean += delta * n_b / total as f64;
        self.m2 += other.m2 + delta * delta * n_a * n_b / total as f64;
        self.count = total;
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0)
        }
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Single-quantile P² estimator with five markers
#[derive(Debug, Clone, PartialEq)]
pub struct P2Quantile {
    p: f64,
    count: usize,
    heights: [f64; 5],
    positions: [f64; 5],
    desired: [f64; 5],
    increments: [f64; 5],
}

impl P2Quantile {
    #[must_use]
    pub fn new(p: f64) -> Self {
        let p = p.clamp(0.0, 1.0);
        Self {
            p,
            count: 0,
            heights: [0.0; 5],
            positions: [0.0, 1.0, 2.0, 3.0, 4.0],
            desired: [0.0, 2.0 * p, 4.0 * p, 2.0 + 2.0 * p, 4.0],
            increments: [0.0, p / 2.0, p, (1.0 + p) / 2.0, 1.0],
        }
    }

    #[must_use]
    pub fn quantile(&self) -> f64 {
        self.p
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn observe(&mut self, x: f64) {
        if self.count < 5 {
            self.heights[self.count] = x;
            self.count += 1;
            if self.count == 5 {
                self.heights.sort_by(f64::total_cmp);
            }
            return;
        }
        self.count += 1;

        let h = &mut self.heights;
        let k = if x < h[0] {
            h[0] = x;
            0
        } else if x >= h[4] {
            h[4] = x;
            3
        } else {
            (0..4).find(|&i| x < h[i + 1]).unwrap_or(3)
        };

        for pos in &mut self.positions[k + 1..] {
            *pos += 1.0;
        }
        for (d, inc) in self.desired.iter_mut().zip(&self.increments) {
            *d += inc;
        }

        for i in 1..4 {
            let d = self.desired[i] - self.positions[i];
            let n = &self.positions;
            if (d >= 1.0 && n[i + 1] - n[i] > 1.0) || (d <= -1.0 && n[i - 1] - n[i] < -1.0) {
                let s = d.signum();
                let candidate = self.parabolic(i, s);
                let next = if self.heights[i - 1] < candidate && candidate < self.heights[i + 1] {
                    candidate
                } else {
                    self.linear(i, s)
                };
                self.heights[i] = next;
                self.positions[i] += s;
            }
        }
    }

    fn parabolic(&self, i: usize, s: f64) -> f64 {
        let q = &self.heights;
        let n = &self.positions;
        q[i] + s / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + s) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - s) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, s: f64) -> f64 {
        let j = if s > 0.0 { i + 1 } else { i - 1 };
        let q = &self.heights;
        let n = &self.positions;
        q[i] + s * (q[j] - q[i]) / (n[j] - n[i])
    }

    /// Current estimate; exact while fewer than five values have been seen.
    /// NaN before any observation.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        if self.count < 5 {
            let mut seen = self.heights[..self.count].to_vec();
            seen.sort_by(f64::total_cmp);
            return percentile_sorted(&seen, self.p);
        }
        self.heights[2]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ordered(f64);

impl Eq for Ordered {}

impl PartialOrd for Ordered {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ordered {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Keeps the `capacity` smallest values seen
#[derive(Debug, Clone)]
pub struct TailSample {
    capacity: usize,
    heap: BinaryHeap<Ordered>,
}

impl TailSample {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(1 << 20)),
        }
    }

    pub fn observe(&mut self, x: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Ordered(x));
        } else if self.heap.peek().is_some_and(|top| x < top.0) {
            self.heap.pop();
            self.heap.push(Ordered(x));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Retained values in ascending order
    #[must_use]
    pub fn sorted(&self) -> Vec<f64> {
        let mut v: Vec<f64> = self.heap.iter().map(|o| o.0).collect();
        v.sort_by(f64::total_cmp);
        v
    }
}

/// Tail-sample size needed for exact VaR/CVaR over `observations` values
fn exact_tail_len(observations: usize, confidence: f64) -> usize {
    let rank = (1.0 - confidence) * observations.saturating_sub(1) as f64;
    rank.floor() as usize + 2
}

/// VaR/CVaR from a tail sample plus a P² fallback when the sample is too
/// small to contain the quantile
fn tail_var_cvar(
    tail: &TailSample,
    fallback: &P2Quantile,
    observations: usize,
    confidence: f64,
) -> (f64, f64) {
    let sorted = tail.sorted();
    if sorted.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let rank = (1.0 - confidence) * observations.saturating_sub(1) as f64;
    let hi = rank.ceil() as usize;
    let q = if hi < sorted.len() {
        let lo = rank.floor() as usize;
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    } else {
        fallback.estimate()
    };
    let tail_len = sorted.partition_point(|r| *r <= q).max(1);
    let tail_mean = sorted[..tail_len].iter().sum::<f64>() / tail_len as f64;
    let var = (-q).max(0.0);
    (var, (-tail_mean).max(var))
}

/// Options for streaming analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingOptions {
    /// Path count above which callers should switch to streaming
    pub threshold: usize,
    /// Paths simulated per parallel chunk
    pub chunk_size: usize,
    /// Upper bound on the VaR/CVaR tail sample
    pub max_tail_sample: usize,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            threshold: 100_000,
            chunk_size: 8_192,
            max_tail_sample: 250_000,
        }
    }
}

/// Accumulates outcome and risk statistics one path at a time
#[derive(Debug, Clone)]
pub struct StreamingAnalytics {
    goal: Goal,
    percentiles: Vec<f64>,
    periodicity: Periodicity,
    risk_free_rate: f64,
    rf_period: f64,
    risk: RiskConfig,

    paths: usize,
    successes: usize,
    depleted: usize,
    terminal_sum: f64,
    terminal: Vec<P2Quantile>,
    bands: Vec<Vec<P2Quantile>>,
    depletion_median: P2Quantile,

    returns: OnlineMoments,
    downside_sq: f64,
    drawdown_sum: f64,
    drawdown_worst: f64,
    drawdowns: Vec<P2Quantile>,

    var_fallback: P2Quantile,
    tail: TailSample,
    var_observations: usize,
}

impl StreamingAnalytics {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        goal: Goal,
        percentiles: &[f64],
        num_periods: usize,
        expected_paths: usize,
        periodicity: Periodicity,
        risk_free_rate: f64,
        risk: RiskConfig,
        options: &StreamingOptions,
    ) -> Result<Self> {
        risk.validate()?;
        let observations = match risk.basis {
            VarBasis::Periodic => expected_paths.saturating_mul(num_periods),
            VarBasis::Terminal => expected_paths,
        };
        let tail_capacity =
            exact_tail_len(observations, risk.confidence).min(options.max_tail_sample);
        let estimators = |ps: &[f64]| ps.iter().map(|&p| P2Quantile::new(p)).collect::<Vec<_>>();

        Ok(Self {
            goal,
            percentiles: percentiles.to_vec(),
            periodicity,
            risk_free_rate,
            rf_period: period_risk_free(periodicity, risk_free_rate),
            paths: 0,
            successes: 0,
            depleted: 0,
            terminal_sum: 0.0,
            terminal: estimators(percentiles),
            bands: (0..num_periods).map(|_| estimators(percentiles)).collect(),
            depletion_median: P2Quantile::new(0.5),
            returns: OnlineMoments::default(),
            downside_sq: 0.0,
            drawdown_sum: 0.0,
            drawdown_worst: 0.0,
            drawdowns: estimators(&risk.drawdown_percentiles),
            var_fallback: P2Quantile::new(1.0 - risk.confidence),
            tail: TailSample::new(tail_capacity),
            var_observations: 0,
            risk,
        })
    }

    #[must_use]
    pub fn paths_seen(&self) -> usize {
        self.paths
    }

    pub fn observe(&mut self, path: &PathResult) {
        self.paths += 1;
        let terminal = path.terminal_value();
        if self.goal.is_met(terminal, path.depleted_at) {
            self.successes += 1;
        }
        if let Some(period) = path.depleted_at {
            self.depleted += 1;
            self.depletion_median.observe(period as f64);
        }
        self.terminal_sum += terminal;
        for est in &mut self.terminal {
            est.observe(terminal);
        }
        for (band, value) in self.bands.iter_mut().zip(&path.balances) {
            for est in band {
                est.observe(*value);
            }
        }

        for r in &path.returns {
            self.returns.push(*r);
            let shortfall = (r - self.rf_period).min(0.0);
            self.downside_sq += shortfall * shortfall;
        }
        let dd = max_drawdown(&path.returns);
        self.drawdown_sum += dd;
        self.drawdown_worst = self.drawdown_worst.max(dd);
        for est in &mut self.drawdowns {
            est.observe(dd);
        }

        match self.risk.basis {
            VarBasis::Periodic => {
                for r in &path.returns {
                    self.var_fallback.observe(*r);
                    self.tail.observe(*r);
                    self.var_observations += 1;
                }
            }
            VarBasis::Terminal => {
                let r = cumulative_return(&path.returns);
                self.var_fallback.observe(r);
                self.tail.observe(r);
                self.var_observations += 1;
            }
        }
    }

    /// Final summary and risk metrics.
    ///
    /// Same data requirements as the exact path: the summary needs one path,
    /// the risk metrics need two.
    pub fn finish(self) -> Result<(OutcomeSummary, RiskMetrics)> {
        Ok((self.summary()?, self.risk_metrics()?))
    }

    /// Outcome summary of the paths observed so far.
    ///
    /// Fails with `InsufficientData` if no paths were observed.
    pub fn summary(&self) -> Result<OutcomeSummary> {
        let n = self.paths;
        if n == 0 || self.bands.is_empty() {
            return Err(SimulationError::InsufficientData {
                statistic: "outcome summary",
                required: 1,
                actual: n.min(self.bands.len()),
            });
        }
        let nf = n as f64;

        Ok(OutcomeSummary {
            goal: self.goal,
            num_paths: n,
            success_probability: self.successes as f64 / nf,
            terminal_percentiles: self
                .terminal
                .iter()
                .map(|e| (e.quantile(), e.estimate()))
                .collect(),
            mean_terminal_value: self.terminal_sum / nf,
            depletion_probability: self.depleted as f64 / nf,
            median_depletion_period: (self.depleted > 0).then(|| self.depletion_median.estimate()),
            bands: self
                .bands
                .iter()
                .enumerate()
                .map(|(period, band)| PercentileBand {
                    period,
                    values: band.iter().map(|e| (e.quantile(), e.estimate())).collect(),
                })
                .collect(),
        })
    }

    /// Risk metrics of the paths observed so far.
    ///
    /// Fails with `InsufficientData` if fewer than two paths were observed.
    pub fn risk_metrics(&self) -> Result<RiskMetrics> {
        let n = self.paths;
        if n < 2 || self.bands.is_empty() {
            return Err(insufficient_paths(if self.bands.is_empty() { 0 } else { n }));
        }
        let nf = n as f64;

        let downside_mean_sq = if self.returns.count() > 0 {
            self.downside_sq / self.returns.count() as f64
        } else {
            0.0
        };
        let (annualized_return, annualized_volatility, sharpe_ratio, sortino_ratio) =
            annualized_ratios(
                &self.returns,
                downside_mean_sq,
                self.periodicity.periods_per_year(),
                self.risk_free_rate,
            );
        let (value_at_risk, conditional_value_at_risk) = tail_var_cvar(
            &self.tail,
            &self.var_fallback,
            self.var_observations,
            self.risk.confidence,
        );
        let drawdown_percentiles = self
            .drawdowns
            .iter()
            .map(|e| (e.quantile(), e.estimate()))
            .collect();

        Ok(RiskMetrics {
            num_paths: n,
            periods_per_year: self.periodicity.periods_per_year(),
            annualized_return,
            annualized_volatility,
            risk_free_rate: self.risk_free_rate,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown: DrawdownSummary {
                mean: self.drawdown_sum / nf,
                worst: self.drawdown_worst,
                percentiles: drawdown_percentiles,
            },
            confidence: self.risk.confidence,
            basis: self.risk.basis,
            value_at_risk,
            conditional_value_at_risk,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::analysis::percentiles::percentiles;

    #[test]
    fn test_online_moments_match_batch() {
        let xs = [1.0, 2.0, 4.0, 8.0, 16.0];
        let mut m = OnlineMoments::default();
        xs.iter().for_each(|x| m.push(*x));
        let mean = xs.iter().sum::<f64>() / 5.0;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 5.0;
        assert!((m.mean() - mean).abs() < 1e-12);
        assert!((m.variance() - var).abs() < 1e-12);

        let mut a = OnlineMoments::default();
        let mut b = OnlineMoments::default();
        xs[..2].iter().for_each(|x| a.push(*x));
        xs[2..].iter().for_each(|x| b.push(*x));
        a.merge(&b);
        assert_eq!(a.count(), 5);
        assert!((a.variance() - var).abs() < 1e-12);
    }

    #[test]
    fn test_p2_tracks_uniform_quantiles() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(17);
        let mut ests: Vec<P2Quantile> =
            [0.1, 0.5, 0.9].iter().map(|p| P2Quantile::new(*p)).collect();
        for _ in 0..100_000 {
            let x: f64 = rng.random();
            ests.iter_mut().for_each(|e| e.observe(x));
        }
        for e in &ests {
            assert!(
                (e.estimate() - e.quantile()).abs() < 0.01,
                "p={} est={}",
                e.quantile(),
                e.estimate()
            );
        }
    }

    #[test]
    fn test_p2_exact_for_small_samples() {
        let mut e = P2Quantile::new(0.5);
        assert!(e.estimate().is_nan());
        e.observe(3.0);
        e.observe(1.0);
        e.observe(2.0);
        assert_eq!(e.estimate(), 2.0);
    }

    #[test]
    fn test_tail_sample_keeps_smallest() {
        let mut t = TailSample::new(3);
        for x in [5.0, 1.0, 4.0, 2.0, 3.0, 0.5] {
            t.observe(x);
        }
        assert_eq!(t.sorted(), vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_tail_var_is_exact_when_sample_is_large_enough() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(23);
        let values: Vec<f64> = (0..10_000).map(|_| rng.random_range(-0.5..0.5)).collect();
        let mut tail = TailSample::new(exact_tail_len(values.len(), 0.95));
        let mut fallback = P2Quantile::new(0.05);
        for v in &values {
            tail.observe(*v);
            fallback.observe(*v);
        }
        let (var, cvar) = tail_var_cvar(&tail, &fallback, values.len(), 0.95);
        let mut copy = values.clone();
        let (var_exact, cvar_exact) = super::super::risk::historical_var_cvar(&mut copy, 0.95);
        assert!((var - var_exact).abs() < 1e-12);
        assert!((cvar - cvar_exact).abs() < 1e-12);
        let p5 = percentiles(&values, &[0.05])[0].1;
        assert!((var + p5).abs() < 1e-12);
    }
}
