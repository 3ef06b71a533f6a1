//! Long-only minimum-variance quadratic program
//!
//! Solves
//!
//! ```text
//! minimize    wᵀ Σ w
//! subject to  Σ w_i = 1
//!             μᵀ w  = target      (optional)
//!             w_i  >= 0
//! ```
//!
//! with a primal active-set method. Each iteration solves the equality-
//! constrained subproblem on the free assets through its KKT system (SVD
//! least squares, so rank-deficient constraint sets are tolerated), steps
//! toward that solution until a bound blocks, and releases the bound with the
//! most negative multiplier once no step is possible.

use nalgebra::{DMatrix, DVector};

use crate::error::OptimizationError;

const STEP_TOLERANCE: f64 = 1e-12;
const MULTIPLIER_TOLERANCE: f64 = 1e-10;
const SVD_EPS: f64 = 1e-14;
/// Allowed miss on the return target after solving
pub const TARGET_TOLERANCE: f64 = 1e-7;

/// Mean-variance problem over `n` assets
#[derive(Debug, Clone)]
pub struct MeanVarianceProblem<'a> {
    /// Row-major `n x n` covariance
    covariance: &'a [f64],
    expected_returns: &'a [f64],
    n: usize,
}

impl<'a> MeanVarianceProblem<'a> {
    pub fn new(
        covariance: &'a [f64],
        expected_returns: &'a [f64],
    ) -> Result<Self, OptimizationError> {
        let n = expected_returns.len();
        if n == 0 {
            return Err(OptimizationError::EmptyUniverse);
        }
        if covariance.len() != n * n {
            return Err(OptimizationError::infeasible(format!(
                "covariance has {} entries for {n} assets",
                covariance.len()
            )));
        }
        Ok(Self {
            covariance,
            expected_returns,
            n,
        })
    }

    #[inline]
    fn cov(&self, i: usize, j: usize) -> f64 {
        self.covariance[i * self.n + j]
    }

    #[must_use]
    pub fn portfolio_return(&self, w: &[f64]) -> f64 {
        w.iter().zip(self.expected_returns).map(|(a, b)| a * b).sum()
    }

    #[must_use]
    pub fn portfolio_variance(&self, w: &[f64]) -> f64 {
        let mut var = 0.0;
        for i in 0..self.n {
            for j in 0..self.n {
                var += w[i] * w[j] * self.cov(i, j);
            }
        }
        var.max(0.0)
    }

    #[must_use]
    pub fn min_return(&self) -> f64 {
        self.expected_returns.iter().copied().fold(f64::INFINITY, f64::min)
    }

    #[must_use]
    pub fn max_return(&self) -> f64 {
        self.expected_returns
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn lowest_variance_asset(&self, among: impl Iterator<Item = usize>) -> usize {
        among
            .min_by(|&a, &b| self.cov(a, a).total_cmp(&self.cov(b, b)).then(a.cmp(&b)))
            .unwrap_or(0)
    }

    /// Feasible starting point with at most two non-zero weights
    fn initial_point(&self, target: Option<f64>) -> Result<Vec<f64>, OptimizationError> {
        let mut w = vec![0.0; self.n];
        let Some(target) = target else {
            w[self.lowest_variance_asset(0..self.n)] = 1.0;
            return Ok(w);
        };

        let (lo_ret, hi_ret) = (self.min_return(), self.max_return());
        if target < lo_ret - TARGET_TOLERANCE || target > hi_ret + TARGET_TOLERANCE {
            return Err(OptimizationError::infeasible(format!(
                "target return {target} outside achievable range [{lo_ret}, {hi_ret}]"
            )));
        }
        let mu = self.expected_returns;
        let lo = self.lowest_variance_asset((0..self.n).filter(|&i| mu[i] == lo_ret));
        let hi = self.lowest_variance_asset((0..self.n).filter(|&i| mu[i] == hi_ret));
        if hi_ret - lo_ret <= STEP_TOLERANCE {
            w[lo] = 1.0;
            return Ok(w);
        }
        let alpha = ((target - lo_ret) / (hi_ret - lo_ret)).clamp(0.0, 1.0);
        w[lo] += 1.0 - alpha;
        w[hi] += alpha;
        Ok(w)
    }

    /// Minimize variance, optionally at a target expected return
    pub fn solve(&self, target: Option<f64>) -> Result<Vec<f64>, OptimizationError> {
        let n = self.n;
        let m = if target.is_some() { 2 } else { 1 };
        let mut w = self.initial_point(target)?;
        let mut at_bound: Vec<bool> = w.iter().map(|x| *x == 0.0).collect();
        let max_iterations = 50 * (n + 2);

        for _ in 0..max_iterations {
            let free: Vec<usize> = (0..n).filter(|&i| !at_bound[i]).collect();
            let k = free.len();

            // KKT system for the free block:
            // [ 2Σ_FF  A_Fᵀ ] [ w_F ]   [ 0 ]
            // [ A_F    0    ] [ λ   ] = [ b ]
            let mut kkt = DMatrix::<f64>::zeros(k + m, k + m);
            let mut rhs = DVector::<f64>::zeros(k + m);
            for (a, &i) in free.iter().enumerate() {
                for (b, &j) in free.iter().enumerate() {
                    kkt[(a, b)] = 2.0 * self.cov(i, j);
                }
                kkt[(a, k)] = 1.0;
                kkt[(k, a)] = 1.0;
                if m == 2 {
                    kkt[(a, k + 1)] = self.expected_returns[i];
                    kkt[(k + 1, a)] = self.expected_returns[i];
                }
            }
            rhs[k] = 1.0;
            if let Some(t) = target {
                rhs[k + 1] = t;
            }
            let solution = kkt
                .svd(true, true)
                .solve(&rhs, SVD_EPS)
                .map_err(|e| OptimizationError::infeasible(e.to_string()))?;

            let mut step = vec![0.0; n];
            for (a, &i) in free.iter().enumerate() {
                step[i] = solution[a] - w[i];
            }
            let step_size = step.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));

            if step_size <= STEP_TOLERANCE {
                // Stationary on the current working set: check bound multipliers
                let lambda: Vec<f64> = (0..m).map(|c| solution[k + c]).collect();
                let mut release: Option<(usize, f64)> = None;
                for i in (0..n).filter(|&i| at_bound[i]) {
                    let grad: f64 = (0..n).map(|j| 2.0 * self.cov(i, j) * w[j]).sum();
                    let mut s = grad + lambda[0];
                    if m == 2 {
                        s += lambda[1] * self.expected_returns[i];
                    }
                    if s < -MULTIPLIER_TOLERANCE && release.is_none_or(|(_, best)| s < best) {
                        release = Some((i, s));
                    }
                }
                match release {
                    None => return self.finish(w, target),
                    Some((i, _)) => {
                        at_bound[i] = false;
                        continue;
                    }
                }
            }

            let mut alpha = 1.0;
            let mut blocking = None;
            for &i in &free {
                if step[i] < 0.0 {
                    let ratio = -w[i] / step[i];
                    if ratio < alpha {
                        alpha = ratio;
                        blocking = Some(i);
                    }
                }
            }
            for i in 0..n {
                w[i] += alpha * step[i];
            }
            if let Some(i) = blocking {
                w[i] = 0.0;
                at_bound[i] = true;
            }
        }

        Err(OptimizationError::DidNotConverge {
            iterations: max_iterations,
        })
    }

    fn finish(&self, mut w: Vec<f64>, target: Option<f64>) -> Result<Vec<f64>, OptimizationError> {
        for x in &mut w {
            if *x < 0.0 {
                *x = 0.0;
            }
        }
        let sum: f64 = w.iter().sum();
        if sum <= 0.0 || !sum.is_finite() {
            return Err(OptimizationError::infeasible("solution has no positive weight"));
        }
        for x in &mut w {
            *x /= sum;
        }
        if let Some(t) = target {
            let achieved = self.portfolio_return(&w);
            if (achieved - t).abs() > TARGET_TOLERANCE {
                return Err(OptimizationError::infeasible(format!(
                    "target return {t} not reached (got {achieved})"
                )));
            }
        }
        Ok(w)
    }
}
