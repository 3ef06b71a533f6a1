//! Domain types: asset classes, assumption sets, allocations, cashflows and
//! simulation results

mod allocation;
mod asset;
mod assumptions;
mod cashflow;
mod correlation;
mod ids;
mod inflation;
mod periodicity;
mod regime;
mod results;

pub use allocation::{AllocationWeights, WEIGHT_TOLERANCE};
pub use asset::{AssetClass, AssetKind};
pub use assumptions::MarketAssumptionSet;
pub use cashflow::{CashflowSchedule, CashflowScheduleBuilder};
pub use correlation::{
    CorrelationMatrix, CorrelationRepair, EIGENVALUE_FLOOR, MIN_ACCEPTED_EIGENVALUE,
    SYMMETRY_TOLERANCE, build_correlation_matrix,
};
pub use ids::{AssetClassId, AssumptionSetId};
pub use inflation::{InflationModel, cumulative_index};
pub use periodicity::{Periodicity, RebalanceFrequency};
pub use regime::{
    PeriodAdjustment, RegimeDefinition, RegimeLabel, RegimeModel, ReturnOverlay,
    ScheduledOverlay, TRANSITION_TOLERANCE,
};
pub use results::{PathMatrix, RebalanceEvent, RebalanceStats, SimulationRun};
