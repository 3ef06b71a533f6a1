//! Market regimes and return overlays
//!
//! A regime model is a Markov chain over labelled market states. Each state
//! shifts expected returns and scales volatility for every asset class. The
//! chain is one implementation of [`ReturnOverlay`], the seam through which
//! the simulation engine accepts time-varying adjustments to the base
//! capital market assumptions.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::rng::PathRng;

/// Tolerance on transition matrix row sums
pub const TRANSITION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegimeLabel {
    Bull,
    Bear,
    Crisis,
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegimeLabel::Bull => "bull",
            RegimeLabel::Bear => "bear",
            RegimeLabel::Crisis => "crisis",
        };
        f.write_str(s)
    }
}

/// Per-period adjustment applied on top of the base assumptions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodAdjustment {
    /// Added to every asset's annual expected return
    pub return_shift: f64,
    /// Multiplies every asset's volatility
    pub volatility_scale: f64,
}

impl PeriodAdjustment {
    pub const IDENTITY: PeriodAdjustment = PeriodAdjustment {
        return_shift: 0.0,
        volatility_scale: 1.0,
    };

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.return_shift == 0.0 && self.volatility_scale == 1.0
    }
}

impl Default for PeriodAdjustment {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Time-varying adjustment to base return assumptions.
///
/// Implementations draw any randomness from the supplied generator, which is
/// dedicated to the overlay for one path.
pub trait ReturnOverlay: Send + Sync + fmt::Debug {
    fn adjustments(&self, num_periods: usize, rng: &mut PathRng) -> Vec<PeriodAdjustment>;
}

/// Deterministic overlay, e.g. a stress scenario with a crash in a given year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledOverlay {
    /// Adjustment per period; periods beyond the schedule are unadjusted
    pub schedule: Vec<PeriodAdjustment>,
}

impl ReturnOverlay for ScheduledOverlay {
    fn adjustments(&self, num_periods: usize, _rng: &mut PathRng) -> Vec<PeriodAdjustment> {
        (0..num_periods)
            .map(|t| self.schedule.get(t).copied().unwrap_or_default())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeDefinition {
    pub label: RegimeLabel,
    /// Added to annual expected returns while in this regime
    pub return_shift: f64,
    /// Multiplies volatilities while in this regime
    pub volatility_scale: f64,
}

impl RegimeDefinition {
    fn adjustment(&self) -> PeriodAdjustment {
        PeriodAdjustment {
            return_shift: self.return_shift,
            volatility_scale: self.volatility_scale,
        }
    }
}

/// Markov chain over market regimes.
///
/// `transitions[i][j]` is the probability of moving from regime `i` to regime
/// `j` between consecutive simulation periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeModel {
    pub regimes: Vec<RegimeDefinition>,
    pub transitions: Vec<Vec<f64>>,
    /// Index into `regimes` of the starting state
    #[serde(default)]
    pub initial: usize,
}

impl RegimeModel {
    pub fn new(
        regimes: Vec<RegimeDefinition>,
        transitions: Vec<Vec<f64>>,
    ) -> Result<Self, SimulationError> {
        let model = Self {
            regimes,
            transitions,
            initial: 0,
        };
        model.validate()?;
        Ok(model)
    }

    #[must_use]
    pub fn starting_in(mut self, initial: usize) -> Self {
        self.initial = initial;
        self
    }

    /// Three-state preset calibrated for monthly periods
    #[must_use]
    pub fn bull_bear_crisis_monthly() -> Self {
        Self {
            regimes: vec![
                RegimeDefinition {
                    label: RegimeLabel::Bull,
                    return_shift: 0.02,
                    volatility_scale: 0.9,
                },
                RegimeDefinition {
                    label: RegimeLabel::Bear,
                    return_shift: -0.08,
                    volatility_scale: 1.3,
                },
                RegimeDefinition {
                    label: RegimeLabel::Crisis,
                    return_shift: -0.25,
                    volatility_scale: 2.0,
                },
            ],
            transitions: vec![
                vec![0.980, 0.015, 0.005],
                vec![0.060, 0.920, 0.020],
                vec![0.050, 0.150, 0.800],
            ],
            initial: 0,
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let n = self.regimes.len();
        if n == 0 {
            return Err(SimulationError::config("regime model has no regimes"));
        }
        if self.initial >= n {
            return Err(SimulationError::config(format!(
                "initial regime index {} out of range for {n} regimes",
                self.initial
            )));
        }
        for (i, a) in self.regimes.iter().enumerate() {
            if self.regimes[..i].iter().any(|b| b.label == a.label) {
                return Err(SimulationError::config(format!(
                    "duplicate regime label {}",
                    a.label
                )));
            }
            if !a.return_shift.is_finite()
                || !a.volatility_scale.is_finite()
                || a.volatility_scale <= 0.0
            {
                return Err(SimulationError::config(format!(
                    "regime {} has invalid parameters",
                    a.label
                )));
            }
        }
        if self.transitions.len() != n {
            return Err(SimulationError::config(format!(
                "transition matrix has {} rows, expected {n}",
                self.transitions.len()
            )));
        }
        for (i, row) in self.transitions.iter().enumerate() {
            if row.len() != n {
                return Err(SimulationError::config(format!(
                    "transition row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            if row.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
                return Err(SimulationError::config(format!(
                    "transition row {i} has a probability outside [0, 1]"
                )));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > TRANSITION_TOLERANCE {
                return Err(SimulationError::config(format!(
                    "transition row {i} sums to {sum}, expected 1.0"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn labels(&self) -> Vec<RegimeLabel> {
        self.regimes.iter().map(|r| r.label).collect()
    }

    fn next_state<R: Rng + ?Sized>(&self, rng: &mut R, current: usize) -> usize {
        let u: f64 = rng.random();
        let row = &self.transitions[current];
        let mut acc = 0.0;
        for (j, p) in row.iter().enumerate() {
            acc += p;
            if u < acc {
                return j;
            }
        }
        // Row sums may fall short of 1.0 by rounding
        row.iter().rposition(|p| *p > 0.0).unwrap_or(current)
    }

    /// Regime indices for each period. Period 0 is the initial state.
    pub fn sample_states<R: Rng + ?Sized>(&self, rng: &mut R, num_periods: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(num_periods);
        let mut state = self.initial;
        for t in 0..num_periods {
            if t > 0 {
                state = self.next_state(rng, state);
            }
            out.push(state);
        }
        out
    }

    pub fn sample_labels<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        num_periods: usize,
    ) -> Vec<RegimeLabel> {
        self.sample_states(rng, num_periods)
            .into_iter()
            .map(|s| self.regimes[s].label)
            .collect()
    }

    /// Long-run share of time spent in each regime (power iteration)
    #[must_use]
    pub fn stationary_distribution(&self) -> Vec<f64> {
        let n = self.regimes.len();
        let mut pi = vec![1.0 / n as f64; n];
        for _ in 0..10_000 {
            let mut next = vec![0.0; n];
            for (i, row) in self.transitions.iter().enumerate() {
                for (j, p) in row.iter().enumerate() {
                    next[j] += pi[i] * p;
                }
            }
            let delta: f64 = next.iter().zip(&pi).map(|(a, b)| (a - b).abs()).sum();
            pi = next;
            if delta < 1e-14 {
                break;
            }
        }
        pi
    }
}

impl ReturnOverlay for RegimeModel {
    fn adjustments(&self, num_periods: usize, rng: &mut PathRng) -> Vec<PeriodAdjustment> {
        self.sample_states(rng, num_periods)
            .into_iter()
            .map(|s| self.regimes[s].adjustment())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_preset_is_valid() {
        let model = RegimeModel::bull_bear_crisis_monthly();
        assert!(model.validate().is_ok());
        let pi = model.stationary_distribution();
        assert!((pi.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(pi[0] > pi[1] && pi[1] > pi[2]);
    }

    #[test]
    fn test_rejects_bad_rows() {
        let regimes = RegimeModel::bull_bear_crisis_monthly().regimes;
        let bad = vec![vec![0.5, 0.5, 0.1], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
        assert!(RegimeModel::new(regimes.clone(), bad).is_err());
        let short = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        assert!(RegimeModel::new(regimes, short).is_err());
    }

    #[test]
    fn test_absorbing_state_sticks() {
        let model = RegimeModel::new(
            RegimeModel::bull_bear_crisis_monthly().regimes,
            vec![vec![0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0]],
        )
        .unwrap();
        let mut rng = PathRng::seed_from_u64(5);
        let labels = model.sample_labels(&mut rng, 10);
        assert_eq!(labels[0], RegimeLabel::Bull);
        assert!(labels[1..].iter().all(|l| *l == RegimeLabel::Bear));
    }

    #[test]
    fn test_overlay_matches_states() {
        let model = RegimeModel::bull_bear_crisis_monthly();
        let mut a = PathRng::seed_from_u64(11);
        let mut b = PathRng::seed_from_u64(11);
        let states = model.sample_states(&mut a, 120);
        let adj = model.adjustments(120, &mut b);
        for (s, a) in states.iter().zip(&adj) {
            assert_eq!(a.return_shift, model.regimes[*s].return_shift);
        }
    }

    #[test]
    fn test_scheduled_overlay_pads_with_identity() {
        let overlay = ScheduledOverlay {
            schedule: vec![PeriodAdjustment {
                return_shift: -0.3,
                volatility_scale: 1.5,
            }],
        };
        let mut rng = PathRng::seed_from_u64(0);
        let adj = overlay.adjustments(3, &mut rng);
        assert_eq!(adj[0].return_shift, -0.3);
        assert!(adj[1].is_identity() && adj[2].is_identity());
    }
}
