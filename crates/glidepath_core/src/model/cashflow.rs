//! Contribution and withdrawal schedules
//!
//! A schedule holds one signed amount per simulation period: positive for
//! contributions, negative for withdrawals. Amounts marked inflation-adjusted
//! are stated in today's dollars and grown by the path's cumulative inflation
//! before they are applied.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowSchedule {
    /// Signed amount per period (contributions > 0, withdrawals < 0)
    pub amounts: Vec<f64>,
    /// Whether each period's amount is in today's dollars
    pub inflation_adjusted: Vec<bool>,
    /// First period of the decumulation phase; `None` for accumulation only
    #[serde(default)]
    pub decumulation_start: Option<usize>,
}

impl CashflowSchedule {
    /// Schedule with no cashflows
    #[must_use]
    pub fn empty(num_periods: usize) -> Self {
        Self {
            amounts: vec![0.0; num_periods],
            inflation_adjusted: vec![false; num_periods],
            decumulation_start: None,
        }
    }

    #[must_use]
    pub fn builder(num_periods: usize) -> CashflowScheduleBuilder {
        CashflowScheduleBuilder {
            schedule: Self::empty(num_periods),
            explicit_start: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    #[must_use]
    pub fn has_inflation_adjusted(&self) -> bool {
        self.inflation_adjusted
            .iter()
            .zip(&self.amounts)
            .any(|(adj, amount)| *adj && *amount != 0.0)
    }

    /// Nominal amount for period `t` given the cumulative price index at the
    /// start of that period
    #[must_use]
    #[inline]
    pub fn nominal_amount(&self, t: usize, price_index: f64) -> f64 {
        let amount = self.amounts[t];
        if self.inflation_adjusted[t] {
            amount * price_index
        } else {
            amount
        }
    }

    pub fn total_contributions(&self) -> f64 {
        self.amounts.iter().filter(|a| **a > 0.0).sum()
    }

    pub fn total_withdrawals(&self) -> f64 {
        -self.amounts.iter().filter(|a| **a < 0.0).sum::<f64>()
    }

    pub fn validate(&self, horizon_periods: usize) -> Result<(), SimulationError> {
        if self.amounts.len() != horizon_periods {
            return Err(SimulationError::config(format!(
                "cashflow schedule has {} periods, horizon is {horizon_periods}",
                self.amounts.len()
            )));
        }
        if self.inflation_adjusted.len() != self.amounts.len() {
            return Err(SimulationError::config(format!(
                "cashflow schedule has {} amounts but {} inflation flags",
                self.amounts.len(),
                self.inflation_adjusted.len()
            )));
        }
        if let Some(t) = self.amounts.iter().position(|a| !a.is_finite()) {
            return Err(SimulationError::config(format!(
                "cashflow in period {t} is not finite"
            )));
        }
        if let Some(start) = self.decumulation_start
            && start > horizon_periods
        {
            return Err(SimulationError::config(format!(
                "decumulation start {start} is beyond the horizon of {horizon_periods} periods"
            )));
        }
        Ok(())
    }
}

/// Fluent construction of a [`CashflowSchedule`].
///
/// Ranges are clipped to the horizon. Unless set explicitly, decumulation
/// starts at the first period of the earliest withdrawal added.
#[derive(Debug, Clone)]
pub struct CashflowScheduleBuilder {
    schedule: CashflowSchedule,
    explicit_start: Option<usize>,
}

impl CashflowScheduleBuilder {
    fn clip(&self, periods: Range<usize>) -> Range<usize> {
        let n = self.schedule.len();
        periods.start.min(n)..periods.end.min(n)
    }

    /// Add a contribution of `amount` per period
    #[must_use]
    pub fn contribute(mut self, amount: f64, periods: Range<usize>) -> Self {
        for t in self.clip(periods) {
            self.schedule.amounts[t] += amount.abs();
        }
        self
    }

    /// Add a contribution in today's dollars
    #[must_use]
    pub fn contribute_real(mut self, amount: f64, periods: Range<usize>) -> Self {
        for t in self.clip(periods) {
            self.schedule.amounts[t] += amount.abs();
            self.schedule.inflation_adjusted[t] = true;
        }
        self
    }

    /// Add a withdrawal of `amount` per period
    #[must_use]
    pub fn withdraw(
        mut self,
        amount: f64,
        periods: Range<usize>,
        inflation_adjusted: bool,
    ) -> Self {
        let range = self.clip(periods);
        if !range.is_empty() {
            let start = self
                .schedule
                .decumulation_start
                .map_or(range.start, |s| s.min(range.start));
            self.schedule.decumulation_start = Some(start);
        }
        for t in range {
            self.schedule.amounts[t] -= amount.abs();
            self.schedule.inflation_adjusted[t] |= inflation_adjusted;
        }
        self
    }

    /// Override the accumulation to decumulation transition
    #[must_use]
    pub fn decumulate_from(mut self, period: usize) -> Self {
        self.explicit_start = Some(period);
        self
    }

    #[must_use]
    pub fn build(mut self) -> CashflowSchedule {
        if let Some(start) = self.explicit_start {
            self.schedule.decumulation_start = Some(start);
        }
        self.schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_phases() {
        let s = CashflowSchedule::builder(24)
            .contribute(500.0, 0..12)
            .withdraw(1_000.0, 12..24, true)
            .build();
        assert_eq!(s.decumulation_start, Some(12));
        assert_eq!(s.amounts[0], 500.0);
        assert_eq!(s.amounts[12], -1_000.0);
        assert!(!s.inflation_adjusted[0]);
        assert!(s.inflation_adjusted[12]);
        assert_eq!(s.total_contributions(), 6_000.0);
        assert_eq!(s.total_withdrawals(), 12_000.0);
        assert!(s.validate(24).is_ok());
    }

    #[test]
    fn test_ranges_are_clipped() {
        let s = CashflowSchedule::builder(5).withdraw(10.0, 3..100, false).build();
        assert_eq!(s.len(), 5);
        assert_eq!(s.amounts, vec![0.0, 0.0, 0.0, -10.0, -10.0]);
    }

    #[test]
    fn test_explicit_decumulation_start() {
        let s = CashflowSchedule::builder(10)
            .withdraw(10.0, 8..10, false)
            .decumulate_from(6)
            .build();
        assert_eq!(s.decumulation_start, Some(6));
    }

    #[test]
    fn test_nominal_amount_uses_index_only_when_adjusted() {
        let s = CashflowSchedule::builder(2)
            .contribute(100.0, 0..1)
            .withdraw(100.0, 1..2, true)
            .build();
        assert_eq!(s.nominal_amount(0, 1.5), 100.0);
        assert_eq!(s.nominal_amount(1, 1.5), -150.0);
    }

    #[test]
    fn test_validate_rejects_length_mismatch() {
        let s = CashflowSchedule::empty(10);
        assert!(s.validate(12).is_err());
    }
}
