//! Per-path simulation state
//!
//! Each path moves from accumulation to decumulation at a fixed period. It
//! becomes depleted only when its balance is exhausted while drawing down.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of one simulated path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathPhase {
    Accumulating,
    Decumulating,
    /// Balance reached zero during decumulation; no further cashflows apply
    Depleted { period: usize },
}

impl PathPhase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, PathPhase::Depleted { .. })
    }
}

/// Mutable state of one path: per-asset sub-balances and phase.
///
/// Sub-balances never go negative. Cashflows are applied pro rata to the
/// current holdings so the drifted mix is preserved between rebalances.
#[derive(Debug, Clone)]
pub struct PathState {
    pub phase: PathPhase,
    pub sub_balances: Vec<f64>,
    target: Vec<f64>,
    pub rebalance_count: usize,
    pub total_turnover: f64,
}

impl PathState {
    #[must_use]
    pub fn new(initial_balance: f64, target: &[f64]) -> Self {
        Self {
            phase: PathPhase::Accumulating,
            sub_balances: target.iter().map(|w| initial_balance * w).collect(),
            target: target.to_vec(),
            rebalance_count: 0,
            total_turnover: 0.0,
        }
    }

    #[must_use]
    #[inline]
    pub fn total(&self) -> f64 {
        self.sub_balances.iter().sum()
    }

    /// Move to decumulation when `period` is the scheduled start
    pub fn advance_phase(&mut self, period: usize, decumulation_start: Option<usize>) {
        if self.phase == PathPhase::Accumulating && decumulation_start == Some(period) {
            self.phase = PathPhase::Decumulating;
        }
    }

    /// Grow each sub-balance by its asset's return, flooring at zero.
    ///
    /// Returns the time-weighted portfolio return for the period. An empty
    /// portfolio reports the target-weighted return.
    pub fn apply_returns(&mut self, returns: &[f64]) -> f64 {
        let before = self.total();
        for (b, r) in self.sub_balances.iter_mut().zip(returns) {
            *b = (*b * (1.0 + r)).max(0.0);
        }
        if before > 0.0 {
            self.total() / before - 1.0
        } else {
            self.target_return(returns)
        }
    }

    #[must_use]
    #[inline]
    pub fn target_return(&self, returns: &[f64]) -> f64 {
        self.target.iter().zip(returns).map(|(w, r)| w * r).sum()
    }

    /// Apply a signed cashflow. Returns the shortfall: the part of a
    /// withdrawal that could not be funded.
    pub fn apply_cashflow(&mut self, amount: f64) -> f64 {
        if amount == 0.0 {
            return 0.0;
        }
        let total = self.total();
        if amount > 0.0 {
            if total > 0.0 {
                let scale = (total + amount) / total;
                for b in &mut self.sub_balances {
                    *b *= scale;
                }
            } else {
                for (b, w) in self.sub_balances.iter_mut().zip(&self.target) {
                    *b = amount * w;
                }
            }
            return 0.0;
        }

        let withdrawal = -amount;
        if withdrawal >= total {
            self.sub_balances.iter_mut().for_each(|b| *b = 0.0);
            return withdrawal - total;
        }
        let scale = (total - withdrawal) / total;
        for b in &mut self.sub_balances {
            *b *= scale;
        }
        0.0
    }

    /// Mark the path depleted if it is decumulating with nothing left
    pub fn check_depletion(&mut self, period: usize) -> bool {
        if self.phase == PathPhase::Decumulating && self.total() <= 0.0 {
            self.sub_balances.iter_mut().for_each(|b| *b = 0.0);
            self.phase = PathPhase::Depleted { period };
            return true;
        }
        false
    }

    /// Reset sub-balances to target weights. Returns one-way turnover as a
    /// fraction of portfolio value (0 for an empty portfolio).
    pub fn rebalance(&mut self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let mut traded = 0.0;
        for (b, w) in self.sub_balances.iter_mut().zip(&self.target) {
            let desired = total * w;
            traded += (desired - *b).abs();
            *b = desired;
        }
        let turnover = 0.5 * traded / total;
        self.rebalance_count += 1;
        self.total_turnover += turnover;
        turnover
    }

    /// Current weights (target weights when empty)
    #[must_use]
    pub fn weights(&self) -> Vec<f64> {
        let total = self.total();
        if total <= 0.0 {
            return self.target.clone();
        }
        self.sub_balances.iter().map(|b| b / total).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_floor_at_zero() {
        let mut s = PathState::new(100.0, &[0.5, 0.5]);
        let r = s.apply_returns(&[-1.5, 0.5]);
        assert_eq!(s.sub_balances, vec![0.0, 75.0]);
        assert_eq!(r, -0.25);
    }

    #[test]
    fn test_withdrawal_shortfall() {
        let mut s = PathState::new(100.0, &[1.0]);
        assert_eq!(s.apply_cashflow(-30.0), 0.0);
        assert!((s.total() - 70.0).abs() < 1e-12);
        let shortfall = s.apply_cashflow(-100.0);
        assert!((shortfall - 30.0).abs() < 1e-12);
        assert_eq!(s.total(), 0.0);
    }

    #[test]
    fn test_contribution_into_empty_uses_target() {
        let mut s = PathState::new(0.0, &[0.25, 0.75]);
        s.apply_cashflow(100.0);
        assert_eq!(s.sub_balances, vec![25.0, 75.0]);
    }

    #[test]
    fn test_depletion_only_when_decumulating() {
        let mut s = PathState::new(10.0, &[1.0]);
        s.apply_cashflow(-50.0);
        assert!(!s.check_depletion(0));
        assert_eq!(s.phase, PathPhase::Accumulating);

        s.advance_phase(3, Some(3));
        assert_eq!(s.phase, PathPhase::Decumulating);
        assert!(s.check_depletion(3));
        assert_eq!(s.phase, PathPhase::Depleted { period: 3 });
        assert!(s.phase.is_terminal());
    }

    #[test]
    fn test_rebalance_turnover() {
        let mut s = PathState::new(100.0, &[0.5, 0.5]);
        s.apply_returns(&[1.0, 0.0]);
        // 100 / 50 -> 75 / 75: 25 moved out of 150
        let turnover = s.rebalance();
        assert!((turnover - 25.0 / 150.0).abs() < 1e-12);
        assert_eq!(s.sub_balances, vec![75.0, 75.0]);
        assert_eq!(s.rebalance_count, 1);
    }
}
