//! Simulation Builder
//!
//! Fluent construction of [`SimulationConfig`]. Cashflows are recorded as
//! pending operations and laid onto the schedule once the horizon is known,
//! so `years()` may be called before or after `contribute()`.

use std::ops::Range;

use super::SimulationConfig;
use crate::error::SimulationError;
use crate::model::{AllocationWeights, CashflowSchedule, Periodicity, RebalanceFrequency};

#[derive(Debug, Clone)]
enum PendingCashflow {
    Contribute {
        amount: f64,
        periods: Range<usize>,
        real: bool,
    },
    Withdraw {
        amount: f64,
        periods: Range<usize>,
        real: bool,
    },
}

/// Builder for [`SimulationConfig`]
#[derive(Debug, Clone)]
pub struct SimulationBuilder {
    allocation: Option<AllocationWeights>,
    periodicity: Periodicity,
    horizon_periods: Option<usize>,
    horizon_years: Option<usize>,
    num_paths: usize,
    seed: u64,
    initial_balance: f64,
    rebalance: RebalanceFrequency,
    use_regimes: bool,
    record_rebalance_events: bool,
    decumulation_start: Option<usize>,
    schedule: Option<CashflowSchedule>,
    pending: Vec<PendingCashflow>,
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocation: None,
            periodicity: Periodicity::Monthly,
            horizon_periods: None,
            horizon_years: None,
            num_paths: 10_000,
            seed: 0,
            initial_balance: 0.0,
            rebalance: RebalanceFrequency::Annual,
            use_regimes: true,
            record_rebalance_events: false,
            decumulation_start: None,
            schedule: None,
            pending: Vec::new(),
        }
    }

    // =========================================================================
    // Portfolio
    // =========================================================================

    #[must_use]
    pub fn allocation(mut self, allocation: AllocationWeights) -> Self {
        self.allocation = Some(allocation);
        self
    }

    #[must_use]
    pub fn initial_balance(mut self, balance: f64) -> Self {
        self.initial_balance = balance;
        self
    }

    #[must_use]
    pub fn rebalance(mut self, frequency: RebalanceFrequency) -> Self {
        self.rebalance = frequency;
        self
    }

    // =========================================================================
    // Horizon
    // =========================================================================

    #[must_use]
    pub fn monthly(mut self) -> Self {
        self.periodicity = Periodicity::Monthly;
        self
    }

    #[must_use]
    pub fn annual(mut self) -> Self {
        self.periodicity = Periodicity::Annual;
        self
    }

    /// Horizon in whole years, converted with the periodicity at build time
    #[must_use]
    pub fn years(mut self, years: usize) -> Self {
        self.horizon_years = Some(years);
        self.horizon_periods = None;
        self
    }

    #[must_use]
    pub fn periods(mut self, periods: usize) -> Self {
        self.horizon_periods = Some(periods);
        self.horizon_years = None;
        self
    }

    // =========================================================================
    // Monte Carlo
    // =========================================================================

    #[must_use]
    pub fn paths(mut self, num_paths: usize) -> Self {
        self.num_paths = num_paths;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn without_regimes(mut self) -> Self {
        self.use_regimes = false;
        self
    }

    #[must_use]
    pub fn record_rebalance_events(mut self) -> Self {
        self.record_rebalance_events = true;
        self
    }

    // =========================================================================
    // Cashflows
    // =========================================================================

    /// Use a prebuilt schedule; pending cashflows are added on top of it
    #[must_use]
    pub fn schedule(mut self, schedule: CashflowSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Nominal contribution per period over `periods`
    #[must_use]
    pub fn contribute(mut self, amount: f64, periods: Range<usize>) -> Self {
        self.pending.push(PendingCashflow::Contribute {
            amount,
            periods,
            real: false,
        });
        self
    }

    /// Contribution per period in today's dollars
    #[must_use]
    pub fn contribute_real(mut self, amount: f64, periods: Range<usize>) -> Self {
        self.pending.push(PendingCashflow::Contribute {
            amount,
            periods,
            real: true,
        });
        self
    }

    /// Nominal withdrawal per period over `periods`
    #[must_use]
    pub fn withdraw(mut self, amount: f64, periods: Range<usize>) -> Self {
        self.pending.push(PendingCashflow::Withdraw {
            amount,
            periods,
            real: false,
        });
        self
    }

    /// Withdrawal per period in today's dollars
    #[must_use]
    pub fn withdraw_real(mut self, amount: f64, periods: Range<usize>) -> Self {
        self.pending.push(PendingCashflow::Withdraw {
            amount,
            periods,
            real: true,
        });
        self
    }

    /// Override where decumulation begins
    #[must_use]
    pub fn decumulate_from(mut self, period: usize) -> Self {
        self.decumulation_start = Some(period);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, SimulationError> {
        let allocation = self
            .allocation
            .ok_or_else(|| SimulationError::config("allocation is required"))?;
        let horizon_periods = match (self.horizon_periods, self.horizon_years) {
            (Some(p), _) => p,
            (None, Some(y)) => y * self.periodicity.periods_per_year() as usize,
            (None, None) => return Err(SimulationError::config("horizon is required")),
        };

        let base = self
            .schedule
            .unwrap_or_else(|| CashflowSchedule::empty(horizon_periods));
        if base.len() != horizon_periods {
            return Err(SimulationError::config(format!(
                "schedule has {} periods, horizon is {horizon_periods}",
                base.len()
            )));
        }
        let mut builder = CashflowSchedule::builder(horizon_periods);
        for op in self.pending {
            builder = match op {
                PendingCashflow::Contribute {
                    amount,
                    periods,
                    real: false,
                } => builder.contribute(amount, periods),
                PendingCashflow::Contribute {
                    amount,
                    periods,
                    real: true,
                } => builder.contribute_real(amount, periods),
                PendingCashflow::Withdraw {
                    amount,
                    periods,
                    real,
                } => builder.withdraw(amount, periods, real),
            };
        }
        let added = builder.build();

        let mut schedule = base;
        for t in 0..horizon_periods {
            schedule.amounts[t] += added.amounts[t];
            schedule.inflation_adjusted[t] |= added.inflation_adjusted[t];
        }
        schedule.decumulation_start = self
            .decumulation_start
            .or(match (schedule.decumulation_start, added.decumulation_start) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            });

        let config = SimulationConfig {
            allocation,
            schedule,
            horizon_periods,
            num_paths: self.num_paths,
            rebalance: self.rebalance,
            seed: self.seed,
            initial_balance: self.initial_balance,
            periodicity: self.periodicity,
            use_regimes: self.use_regimes,
            record_rebalance_events: self.record_rebalance_events,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_years_convert_with_periodicity() {
        let alloc = AllocationWeights::single("eq");
        let monthly = SimulationBuilder::new().allocation(alloc.clone()).years(5).build().unwrap();
        assert_eq!(monthly.horizon_periods, 60);
        let annual = SimulationBuilder::new().allocation(alloc).annual().years(5).build().unwrap();
        assert_eq!(annual.horizon_periods, 5);
    }

    #[test]
    fn test_cashflows_applied_after_horizon_known() {
        let config = SimulationBuilder::new()
            .allocation(AllocationWeights::single("eq"))
            .contribute(100.0, 0..12)
            .withdraw_real(50.0, 12..24)
            .years(2)
            .build()
            .unwrap();
        assert_eq!(config.schedule.amounts[0], 100.0);
        assert_eq!(config.schedule.amounts[23], -50.0);
        assert!(config.schedule.inflation_adjusted[23]);
        assert_eq!(config.schedule.decumulation_start, Some(12));
    }

    #[test]
    fn test_missing_allocation_or_horizon() {
        assert!(SimulationBuilder::new().years(1).build().is_err());
        assert!(
            SimulationBuilder::new()
                .allocation(AllocationWeights::single("eq"))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_zero_paths_rejected() {
        let result = SimulationBuilder::new()
            .allocation(AllocationWeights::single("eq"))
            .years(1)
            .paths(0)
            .build();
        assert!(matches!(result, Err(SimulationError::Config(_))));
    }
}
