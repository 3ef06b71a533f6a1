//! Capital market model
//!
//! Wraps a validated [`MarketAssumptionSet`] with the precomputed quantities
//! the optimizer and simulation engine need: per-period means and
//! volatilities, the annual covariance matrix and the Cholesky factor of the
//! (repaired) correlation matrix.
//!
//! Correlated shocks for one period are `x = L z` with `z` i.i.d. standard
//! normal and `R = L Lᵀ`; asset returns are `mean_p + vol_p * x`.

use std::sync::Arc;

use rand::{Rng, distr::Distribution};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{LookupError, SimulationError};
use crate::model::{
    AssetClassId, CorrelationRepair, MarketAssumptionSet, PeriodAdjustment, Periodicity,
    RegimeLabel,
};
use crate::rng::{PathRng, Stream, path_rng};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub expected_return: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone)]
pub struct CapitalMarketModel {
    assumptions: Arc<MarketAssumptionSet>,
    periodicity: Periodicity,
    ids: Vec<AssetClassId>,
    annual_returns: Vec<f64>,
    annual_vols: Vec<f64>,
    period_returns: Vec<f64>,
    period_vols: Vec<f64>,
    /// Row-major lower-triangular Cholesky factor of the correlation matrix
    cholesky: Vec<f64>,
}

impl CapitalMarketModel {
    pub fn new(
        assumptions: Arc<MarketAssumptionSet>,
        periodicity: Periodicity,
    ) -> Result<Self, SimulationError> {
        assumptions.validate()?;
        let ids = assumptions.ids();
        let annual_returns: Vec<f64> = assumptions
            .asset_classes
            .iter()
            .map(|a| a.expected_return)
            .collect();
        let annual_vols: Vec<f64> = assumptions
            .asset_classes
            .iter()
            .map(|a| a.volatility)
            .collect();
        let period_returns = annual_returns
            .iter()
            .map(|r| periodicity.period_return(*r))
            .collect();
        let period_vols = annual_vols
            .iter()
            .map(|v| periodicity.period_volatility(*v))
            .collect();
        let cholesky = assumptions.correlation.cholesky_lower()?;

        if let Some(repair) = assumptions.correlation.repair() {
            tracing::debug!(
                assumption_set = %assumptions.id,
                clipped = repair.clipped_eigenvalues,
                "using repaired correlation matrix"
            );
        }

        Ok(Self {
            assumptions,
            periodicity,
            ids,
            annual_returns,
            annual_vols,
            period_returns,
            period_vols,
            cholesky,
        })
    }

    #[must_use]
    pub fn assumptions(&self) -> &MarketAssumptionSet {
        &self.assumptions
    }

    #[must_use]
    pub fn periodicity(&self) -> Periodicity {
        self.periodicity
    }

    #[must_use]
    pub fn ids(&self) -> &[AssetClassId] {
        &self.ids
    }

    #[must_use]
    pub fn num_assets(&self) -> usize {
        self.ids.len()
    }

    pub fn index_of(&self, id: &AssetClassId) -> Result<usize, LookupError> {
        self.ids
            .iter()
            .position(|x| x == id)
            .ok_or_else(|| LookupError::AssetClassNotFound(id.clone()))
    }

    #[must_use]
    pub fn correlation_repair(&self) -> Option<&CorrelationRepair> {
        self.assumptions.correlation.repair()
    }

    #[must_use]
    pub fn risk_free_rate(&self) -> f64 {
        self.assumptions.risk_free_rate
    }

    #[must_use]
    pub fn expected_returns(&self) -> &[f64] {
        &self.annual_returns
    }

    #[must_use]
    pub fn volatilities(&self) -> &[f64] {
        &self.annual_vols
    }

    #[must_use]
    pub fn period_returns(&self) -> &[f64] {
        &self.period_returns
    }

    #[must_use]
    pub fn period_volatilities(&self) -> &[f64] {
        &self.period_vols
    }

    /// Annual covariance `Σ_ij = σ_i σ_j ρ_ij`, row-major
    #[must_use]
    pub fn covariance(&self) -> Vec<f64> {
        self.covariance_with(&self.annual_vols)
    }

    /// Covariance of per-period returns at the model's periodicity
    #[must_use]
    pub fn period_covariance(&self) -> Vec<f64> {
        self.covariance_with(&self.period_vols)
    }

    fn covariance_with(&self, vols: &[f64]) -> Vec<f64> {
        let n = self.num_assets();
        let corr = &self.assumptions.correlation;
        let mut out = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                out[i * n + j] = vols[i] * vols[j] * corr.at(i, j);
            }
        }
        out
    }

    /// Expected annual return of a dense weight vector
    #[must_use]
    pub fn portfolio_return(&self, weights: &[f64]) -> f64 {
        weights.iter().zip(&self.annual_returns).map(|(w, r)| w * r).sum()
    }

    /// Annual volatility of a dense weight vector
    #[must_use]
    pub fn portfolio_volatility(&self, weights: &[f64]) -> f64 {
        let n = self.num_assets();
        let cov = self.covariance();
        let mut var = 0.0;
        for i in 0..n {
            for j in 0..n {
                var += weights[i] * weights[j] * cov[i * n + j];
            }
        }
        var.max(0.0).sqrt()
    }

    /// Annual expected return and volatility of a dense weight vector
    #[must_use]
    pub fn portfolio_stats(&self, weights: &[f64]) -> PortfolioStats {
        PortfolioStats {
            expected_return: self.portfolio_return(weights),
            volatility: self.portfolio_volatility(weights),
        }
    }

    /// Fill `out` with correlated standard normal shocks.
    ///
    /// Draws exactly `num_assets` normals from `rng`; `z` is scratch space of
    /// the same length.
    #[inline]
    pub fn draw_correlated<R: Rng + ?Sized>(&self, rng: &mut R, z: &mut [f64], out: &mut [f64]) {
        let n = self.num_assets();
        for zi in z.iter_mut() {
            *zi = StandardNormal.sample(rng);
        }
        for i in 0..n {
            let row = &self.cholesky[i * n..i * n + i + 1];
            out[i] = row.iter().zip(&z[..=i]).map(|(l, z)| l * z).sum();
        }
    }

    /// Per-period asset returns for one period, in asset order.
    ///
    /// With a non-identity adjustment the annual means are shifted and the
    /// volatilities scaled before conversion to the period.
    pub fn draw_returns<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        adjustment: Option<&PeriodAdjustment>,
        z: &mut [f64],
        out: &mut [f64],
    ) {
        self.draw_correlated(rng, z, out);
        match adjustment.filter(|a| !a.is_identity()) {
            None => {
                for i in 0..out.len() {
                    out[i] = self.period_returns[i] + self.period_vols[i] * out[i];
                }
            }
            Some(adj) => {
                for i in 0..out.len() {
                    let shifted = (self.annual_returns[i] + adj.return_shift).max(-0.99);
                    let mean = self.periodicity.period_return(shifted);
                    let vol = self.period_vols[i] * adj.volatility_scale;
                    out[i] = mean + vol * out[i];
                }
            }
        }
    }

    /// Correlated return path `[period][asset]` for one path of a run
    #[must_use]
    pub fn simulate_return_path(
        &self,
        seed: u64,
        path_index: usize,
        num_periods: usize,
    ) -> Vec<Vec<f64>> {
        let n = self.num_assets();
        let mut rng = path_rng(seed, path_index, Stream::Returns);
        let mut z = vec![0.0; n];
        (0..num_periods)
            .map(|_| {
                let mut out = vec![0.0; n];
                self.draw_returns(&mut rng, None, &mut z, &mut out);
                out
            })
            .collect()
    }

    /// Per-period inflation path using the path's inflation stream
    #[must_use]
    pub fn simulate_inflation_path(
        &self,
        seed: u64,
        path_index: usize,
        num_periods: usize,
    ) -> Vec<f64> {
        let mut rng = path_rng(seed, path_index, Stream::Inflation);
        self.assumptions
            .inflation
            .sample_path(&mut rng, num_periods, self.periodicity)
    }

    /// `num_paths` inflation paths; row `i` is the path simulation path `i`
    /// sees for the same seed
    #[must_use]
    pub fn simulate_inflation_paths(
        &self,
        num_paths: usize,
        num_periods: usize,
        seed: u64,
    ) -> Vec<Vec<f64>> {
        (0..num_paths)
            .map(|i| self.simulate_inflation_path(seed, i, num_periods))
            .collect()
    }

    /// Regime sequence using the path's regime stream.
    ///
    /// Fails if the assumption set has no regime model.
    pub fn simulate_regime_path(
        &self,
        seed: u64,
        path_index: usize,
        num_periods: usize,
    ) -> Result<Vec<RegimeLabel>, SimulationError> {
        let regimes = self.assumptions.regimes.as_ref().ok_or_else(|| {
            SimulationError::config(format!(
                "assumption set {} has no regime model",
                self.assumptions.id
            ))
        })?;
        let mut rng: PathRng = path_rng(seed, path_index, Stream::Regime);
        Ok(regimes.sample_labels(&mut rng, num_periods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssumptionSetBuilder;
    use crate::model::AssetClass;

    fn two_asset(rho: f64) -> CapitalMarketModel {
        let set = AssumptionSetBuilder::new("t", 1)
            .as_of(2025, 1, 1)
            .asset(AssetClass::new("a", 0.08, 0.20))
            .asset(AssetClass::new("b", 0.03, 0.05))
            .correlation("a", "b", rho)
            .build()
            .unwrap();
        CapitalMarketModel::new(Arc::new(set), Periodicity::Annual).unwrap()
    }

    #[test]
    fn test_covariance_and_portfolio_stats() {
        let m = two_asset(0.5);
        let cov = m.covariance();
        assert!((cov[0] - 0.04).abs() < 1e-15);
        assert!((cov[1] - 0.2 * 0.05 * 0.5).abs() < 1e-15);
        assert_eq!(cov[1], cov[2]);
        assert!((m.portfolio_return(&[0.5, 0.5]) - 0.055).abs() < 1e-15);
        let var: f64 = 0.25 * 0.04 + 0.25 * 0.0025 + 2.0 * 0.25 * 0.005;
        assert!((m.portfolio_volatility(&[0.5, 0.5]) - var.sqrt()).abs() < 1e-12);
        let stats = m.portfolio_stats(&[0.5, 0.5]);
        assert!((stats.volatility - var.sqrt()).abs() < 1e-12);
        assert!((stats.expected_return - 0.055).abs() < 1e-15);
    }

    #[test]
    fn test_period_covariance_scales_annual() {
        let set = AssumptionSetBuilder::new("t", 1)
            .as_of(2025, 1, 1)
            .asset(AssetClass::new("a", 0.08, 0.20))
            .asset(AssetClass::new("b", 0.03, 0.05))
            .correlation("a", "b", 0.4)
            .build()
            .unwrap();
        let m = CapitalMarketModel::new(Arc::new(set), Periodicity::Monthly).unwrap();
        let annual = m.covariance();
        for (p, a) in m.period_covariance().iter().zip(&annual) {
            assert!((p * 12.0 - a).abs() < 1e-15);
        }
    }

    #[test]
    fn test_sample_correlation_matches_target() {
        let m = two_asset(-0.6);
        let path = m.simulate_return_path(99, 0, 50_000);
        let n = path.len() as f64;
        let mean = |k: usize| path.iter().map(|r| r[k]).sum::<f64>() / n;
        let (ma, mb) = (mean(0), mean(1));
        let cov: f64 = path.iter().map(|r| (r[0] - ma) * (r[1] - mb)).sum::<f64>() / n;
        let sa = (path.iter().map(|r| (r[0] - ma).powi(2)).sum::<f64>() / n).sqrt();
        let sb = (path.iter().map(|r| (r[1] - mb).powi(2)).sum::<f64>() / n).sqrt();
        let rho = cov / (sa * sb);
        assert!((rho + 0.6).abs() < 0.02, "sample correlation {rho}");
        assert!((ma - 0.08).abs() < 0.005);
        assert!((sa - 0.20).abs() < 0.005);
    }

    #[test]
    fn test_monthly_parameters_are_converted() {
        let set = AssumptionSetBuilder::us_baseline().build().unwrap();
        let m = CapitalMarketModel::new(Arc::new(set), Periodicity::Monthly).unwrap();
        let idx = m.index_of(&"us_equity".into()).unwrap();
        assert!(((1.0 + m.period_returns()[idx]).powi(12) - 1.07).abs() < 1e-12);
        assert!((m.period_volatilities()[idx] - 0.16 / 12.0_f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn test_regime_path_requires_model() {
        let m = two_asset(0.0);
        assert!(matches!(
            m.simulate_regime_path(1, 0, 12),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn test_identity_adjustment_matches_unadjusted() {
        use rand::SeedableRng;

        let m = two_asset(0.3);
        let mut z = vec![0.0; 2];
        let mut a = vec![0.0; 2];
        let mut b = vec![0.0; 2];
        let mut r1 = PathRng::seed_from_u64(4);
        let mut r2 = PathRng::seed_from_u64(4);
        m.draw_returns(&mut r1, None, &mut z, &mut a);
        m.draw_returns(&mut r2, Some(&PeriodAdjustment::IDENTITY), &mut z, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_inflation_rows_match_single_paths() {
        let set = AssumptionSetBuilder::us_baseline().build().unwrap();
        let m = CapitalMarketModel::new(Arc::new(set), Periodicity::Monthly).unwrap();
        let rows = m.simulate_inflation_paths(4, 24, 7);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2], m.simulate_inflation_path(7, 2, 24));
        assert_ne!(rows[0], rows[1]);
    }
}
