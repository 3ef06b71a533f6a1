//! Inflation models and price indices
//!
//! Inflation paths are sampled per period and compounded into a price index
//! starting at 1.0, which scales inflation-adjusted cashflows.

use rand::{Rng, distr::Distribution};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::periodicity::Periodicity;
use crate::error::SimulationError;

/// Stochastic model of annual inflation.
///
/// Rates are annual; [`InflationModel::sample_path`] converts them to
/// per-period rates for the simulation periodicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum InflationModel {
    #[default]
    None,
    Fixed {
        rate: f64,
    },
    /// Log of annual gross inflation `ln(1 + i)` is normal with the given
    /// mean/std expressed as simple rates
    LogNormal {
        mean: f64,
        std_dev: f64,
    },
    /// Ornstein-Uhlenbeck process on the annualized rate, discretized per
    /// period. Models the persistence of high and low inflation episodes.
    MeanReverting {
        long_run_mean: f64,
        volatility: f64,
        /// Speed of reversion per year (0 = random walk)
        reversion_speed: f64,
        /// Starting annualized rate; defaults to `long_run_mean`
        #[serde(default)]
        initial: Option<f64>,
    },
}

impl InflationModel {
    // US CPI (FRED CPIAUCSL), 1948-2025
    pub const US_HISTORICAL_FIXED: InflationModel = InflationModel::Fixed { rate: 0.0343 };
    pub const US_HISTORICAL_LOG_NORMAL: InflationModel = InflationModel::LogNormal {
        mean: 0.0347,
        std_dev: 0.0279,
    };
    pub const US_HISTORICAL_MEAN_REVERTING: InflationModel = InflationModel::MeanReverting {
        long_run_mean: 0.0347,
        volatility: 0.012,
        reversion_speed: 0.35,
        initial: None,
    };

    pub fn validate(&self) -> Result<(), SimulationError> {
        let ok = match self {
            InflationModel::None => true,
            InflationModel::Fixed { rate } => rate.is_finite() && *rate > -1.0,
            InflationModel::LogNormal { mean, std_dev } => {
                mean.is_finite() && *mean > -1.0 && std_dev.is_finite() && *std_dev >= 0.0
            }
            InflationModel::MeanReverting {
                long_run_mean,
                volatility,
                reversion_speed,
                initial,
            } => {
                long_run_mean.is_finite()
                    && *long_run_mean > -1.0
                    && volatility.is_finite()
                    && *volatility >= 0.0
                    && reversion_speed.is_finite()
                    && *reversion_speed >= 0.0
                    && initial.is_none_or(|x| x.is_finite() && x > -1.0)
            }
        };
        if ok {
            Ok(())
        } else {
            Err(SimulationError::config(format!(
                "invalid inflation model parameters: {self:?}"
            )))
        }
    }

    /// Long-run expected annual rate
    #[must_use]
    pub fn expected_annual_rate(&self) -> f64 {
        match self {
            InflationModel::None => 0.0,
            InflationModel::Fixed { rate } => *rate,
            InflationModel::LogNormal { mean, .. } => *mean,
            InflationModel::MeanReverting { long_run_mean, .. } => *long_run_mean,
        }
    }

    /// Sample per-period inflation rates for one path.
    ///
    /// `None` and `Fixed` consume no randomness.
    pub fn sample_path<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        num_periods: usize,
        periodicity: Periodicity,
    ) -> Vec<f64> {
        let ppy = f64::from(periodicity.periods_per_year());
        match self {
            InflationModel::None => vec![0.0; num_periods],
            InflationModel::Fixed { rate } => {
                vec![periodicity.period_return(*rate); num_periods]
            }
            InflationModel::LogNormal { mean, std_dev } => {
                let mu = (1.0 + mean).ln() / ppy;
                let sigma = std_dev / ppy.sqrt();
                (0..num_periods)
                    .map(|_| {
                        let z: f64 = StandardNormal.sample(rng);
                        (mu + sigma * z).exp() - 1.0
                    })
                    .collect()
            }
            InflationModel::MeanReverting {
                long_run_mean,
                volatility,
                reversion_speed,
                initial,
            } => {
                let dt = 1.0 / ppy;
                let shock_scale = volatility * dt.sqrt();
                let mut rate = initial.unwrap_or(*long_run_mean);
                let mut out = Vec::with_capacity(num_periods);
                for _ in 0..num_periods {
                    let z: f64 = StandardNormal.sample(rng);
                    rate += reversion_speed * (long_run_mean - rate) * dt + shock_scale * z;
                    // Deflation below -99% is not meaningful
                    rate = rate.max(-0.99);
                    out.push((1.0 + rate).powf(dt) - 1.0);
                }
                out
            }
        }
    }
}

/// Cumulative price index at the start of each period, starting at 1.0.
///
/// `index[t] = prod(1 + rate[s]) for s < t`, so amounts in period 0 are in
/// today's dollars.
#[must_use]
pub fn cumulative_index(per_period_rates: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(per_period_rates.len());
    let mut level = 1.0;
    for r in per_period_rates {
        out.push(level);
        level *= 1.0 + r;
    }
    out
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_fixed_inflation_compounds_to_annual_rate() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(1);
        let path =
            InflationModel::Fixed { rate: 0.03 }.sample_path(&mut rng, 24, Periodicity::Monthly);
        let index = cumulative_index(&path);
        assert_eq!(index[0], 1.0);
        let after_year: f64 = path[..12].iter().map(|r| 1.0 + r).product();
        assert!((after_year - 1.03).abs() < 1e-12);
    }

    #[test]
    fn test_lognormal_mean_is_close() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(42);
        let model = InflationModel::LogNormal {
            mean: 0.03,
            std_dev: 0.02,
        };
        let path = model.sample_path(&mut rng, 20_000, Periodicity::Annual);
        let mean_log: f64 = path.iter().map(|r| (1.0 + r).ln()).sum::<f64>() / path.len() as f64;
        assert!((mean_log - 1.03_f64.ln()).abs() < 0.001, "mean log {mean_log}");
    }

    #[test]
    fn test_mean_reverting_pulls_toward_long_run() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(3);
        let model = InflationModel::MeanReverting {
            long_run_mean: 0.025,
            volatility: 0.0,
            reversion_speed: 0.5,
            initial: Some(0.10),
        };
        let path = model.sample_path(&mut rng, 40, Periodicity::Annual);
        assert!(path[0] < 0.10);
        assert!((path[39] - 0.025).abs() < 1e-6);
        assert!(path.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_validate_rejects_negative_volatility() {
        let model = InflationModel::LogNormal {
            mean: 0.02,
            std_dev: -0.1,
        };
        assert!(model.validate().is_err());
        assert!(InflationModel::US_HISTORICAL_MEAN_REVERTING.validate().is_ok());
    }
}
