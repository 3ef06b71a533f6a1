//! Efficient frontier and maximum-Sharpe portfolio

use serde::{Deserialize, Serialize};

use super::qp::MeanVarianceProblem;
use crate::error::{OptimizationError, Result, SimulationError};
use crate::market::CapitalMarketModel;
use crate::model::{AllocationWeights, AssumptionSetId};

/// Golden-section refinement iterations for the max-Sharpe search
const SHARPE_REFINE_ITERATIONS: usize = 80;
/// Minimum grid size for the initial max-Sharpe scan
const SHARPE_SCAN_POINTS: usize = 41;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficientFrontierPoint {
    pub target_return: f64,
    pub expected_return: f64,
    pub volatility: f64,
    /// `None` when volatility is zero
    pub sharpe_ratio: Option<f64>,
    pub weights: AllocationWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficientFrontier {
    pub assumption_set: AssumptionSetId,
    pub risk_free_rate: f64,
    /// Ordered by ascending target return
    pub points: Vec<EfficientFrontierPoint>,
    /// Targets that could not be solved and were skipped
    pub skipped: usize,
}

impl EfficientFrontier {
    #[must_use]
    pub fn min_variance(&self) -> Option<&EfficientFrontierPoint> {
        self.points.first()
    }

    /// Point with the highest Sharpe ratio on the sampled frontier
    #[must_use]
    pub fn best_sharpe(&self) -> Option<&EfficientFrontierPoint> {
        self.points
            .iter()
            .filter(|p| p.sharpe_ratio.is_some())
            .max_by(|a, b| {
                a.sharpe_ratio
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&b.sharpe_ratio.unwrap_or(f64::NEG_INFINITY))
            })
    }
}

struct FrontierSolver<'m> {
    model: &'m CapitalMarketModel,
    covariance: Vec<f64>,
    risk_free_rate: f64,
}

impl<'m> FrontierSolver<'m> {
    fn new(model: &'m CapitalMarketModel, risk_free_rate: f64) -> Self {
        Self {
            model,
            covariance: model.covariance(),
            risk_free_rate,
        }
    }

    fn problem(&self) -> std::result::Result<MeanVarianceProblem<'_>, OptimizationError> {
        MeanVarianceProblem::new(&self.covariance, self.model.expected_returns())
    }

    fn point(&self, target: Option<f64>) -> Result<EfficientFrontierPoint> {
        let problem = self.problem()?;
        let raw = problem.solve(target)?;
        let weights = AllocationWeights::from_solution(self.model.ids(), &raw)?;
        let dense = weights.to_vector(self.model.ids())?;
        let expected_return = problem.portfolio_return(&dense);
        let volatility = problem.portfolio_variance(&dense).sqrt();
        let rf = self.risk_free_rate;
        Ok(EfficientFrontierPoint {
            target_return: target.unwrap_or(expected_return),
            expected_return,
            volatility,
            sharpe_ratio: (volatility > 0.0).then(|| (expected_return - rf) / volatility),
            weights,
        })
    }

    /// Target returns from the minimum-variance return to the highest asset return
    fn targets(&self, min_variance_return: f64, num_points: usize) -> Vec<f64> {
        let hi = self.model.expected_returns().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if num_points <= 1 || hi - min_variance_return <= 1e-12 {
            return vec![min_variance_return];
        }
        let step = (hi - min_variance_return) / (num_points - 1) as f64;
        (0..num_points)
            .map(|k| {
                if k == num_points - 1 {
                    hi
                } else {
                    min_variance_return + step * k as f64
                }
            })
            .collect()
    }
}

/// Sample the long-only efficient frontier at `num_points` evenly spaced
/// target returns between the minimum-variance portfolio and the highest
/// expected asset return. Sharpe ratios use the assumption set's risk-free
/// rate.
///
/// Targets the solver cannot satisfy are skipped and logged. Fails if no
/// point can be solved.
pub fn compute_efficient_frontier(
    model: &CapitalMarketModel,
    num_points: usize,
) -> Result<EfficientFrontier> {
    frontier_with_rate(model, num_points, model.risk_free_rate())
}

fn frontier_with_rate(
    model: &CapitalMarketModel,
    num_points: usize,
    risk_free_rate: f64,
) -> Result<EfficientFrontier> {
    if num_points == 0 {
        return Err(SimulationError::config("frontier needs at least one point"));
    }
    let solver = FrontierSolver::new(model, risk_free_rate);
    let min_var = solver.point(None)?;

    let mut points = Vec::with_capacity(num_points);
    let mut skipped = 0;
    for (k, target) in solver.targets(min_var.expected_return, num_points).into_iter().enumerate() {
        if k == 0 {
            points.push(EfficientFrontierPoint {
                target_return: target,
                ..min_var.clone()
            });
            continue;
        }
        match solver.point(Some(target)) {
            Ok(p) => points.push(p),
            Err(SimulationError::Optimization(e)) => {
                tracing::debug!(target_return = target, error = %e, "skipping frontier point");
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if points.is_empty() {
        return Err(OptimizationError::infeasible("no frontier point could be solved").into());
    }
    tracing::debug!(
        assumption_set = %model.assumptions().id,
        points = points.len(),
        skipped,
        "computed efficient frontier"
    );
    Ok(EfficientFrontier {
        assumption_set: model.assumptions().id.clone(),
        risk_free_rate,
        points,
        skipped,
    })
}

/// Long-only minimum-variance portfolio
pub fn min_variance_portfolio(model: &CapitalMarketModel) -> Result<EfficientFrontierPoint> {
    FrontierSolver::new(model, model.risk_free_rate()).point(None)
}

/// Long-only portfolio with the highest Sharpe ratio against `risk_free_rate`.
///
/// Scans the frontier, then refines around the best grid point by
/// golden-section search on the target return (Sharpe is unimodal along the
/// frontier). A single-asset universe returns that asset at weight 1.0.
pub fn max_sharpe_portfolio(
    model: &CapitalMarketModel,
    risk_free_rate: f64,
) -> Result<EfficientFrontierPoint> {
    if !risk_free_rate.is_finite() {
        return Err(SimulationError::config("risk-free rate must be finite"));
    }
    let frontier = frontier_with_rate(model, SHARPE_SCAN_POINTS, risk_free_rate)?;
    let solver = FrontierSolver::new(model, risk_free_rate);

    let best_idx = frontier
        .points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.sharpe_ratio
                .unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&b.sharpe_ratio.unwrap_or(f64::NEG_INFINITY))
        })
        .map(|(i, _)| i)
        .ok_or_else(|| OptimizationError::infeasible("empty frontier"))?;
    let mut best = frontier.points[best_idx].clone();
    if frontier.points.len() < 3 {
        return Ok(best);
    }

    let lo_idx = best_idx.saturating_sub(1);
    let hi_idx = (best_idx + 1).min(frontier.points.len() - 1);
    let mut a = frontier.points[lo_idx].target_return;
    let mut b = frontier.points[hi_idx].target_return;
    let sharpe_at = |t: f64| -> Option<EfficientFrontierPoint> {
        solver.point(Some(t)).ok().filter(|p| p.sharpe_ratio.is_some())
    };
    let score = |p: &Option<EfficientFrontierPoint>| {
        p.as_ref()
            .and_then(|p| p.sharpe_ratio)
            .unwrap_or(f64::NEG_INFINITY)
    };

    let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut pc = sharpe_at(c);
    let mut pd = sharpe_at(d);
    for _ in 0..SHARPE_REFINE_ITERATIONS {
        if (b - a).abs() < 1e-12 {
            break;
        }
        if score(&pc) >= score(&pd) {
            b = d;
            d = c;
            pd = pc;
            c = b - ratio * (b - a);
            pc = sharpe_at(c);
        } else {
            a = c;
            c = d;
            pc = pd;
            d = a + ratio * (b - a);
            pd = sharpe_at(d);
        }
    }

    for candidate in [pc, pd].into_iter().flatten() {
        if candidate.sharpe_ratio.unwrap_or(f64::NEG_INFINITY)
            > best.sharpe_ratio.unwrap_or(f64::NEG_INFINITY)
        {
            best = candidate;
        }
    }
    Ok(best)
}
