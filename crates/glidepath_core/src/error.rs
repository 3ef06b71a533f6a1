use std::fmt;

use crate::model::{AssetClassId, AssumptionSetId};

/// Errors related to resource lookups
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    AssumptionSetNotFound(AssumptionSetId),
    AssetClassNotFound(AssetClassId),
    NoInstrument(AssetClassId),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::AssumptionSetNotFound(id) => write!(f, "assumption set {id} not found"),
            LookupError::AssetClassNotFound(id) => write!(f, "asset class {id} not found"),
            LookupError::NoInstrument(id) => {
                write!(f, "no instrument available for asset class {id}")
            }
        }
    }
}

impl std::error::Error for LookupError {}

/// Malformed correlation or covariance input
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixError {
    Empty,
    NotSquare {
        rows: usize,
        row: usize,
        len: usize,
    },
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },
    NotSymmetric {
        row: usize,
        col: usize,
        delta: f64,
    },
    NonFinite {
        row: usize,
        col: usize,
    },
    UnknownAssetClass(AssetClassId),
    /// Cholesky factorization failed even after repair
    NotFactorizable,
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixError::Empty => write!(f, "matrix is empty"),
            MatrixError::NotSquare { rows, row, len } => {
                write!(f, "matrix is not square: row {row} has {len} entries, expected {rows}")
            }
            MatrixError::DimensionMismatch { expected, actual } => {
                write!(f, "matrix dimension {actual} does not match {expected} asset classes")
            }
            MatrixError::NotSymmetric { row, col, delta } => {
                write!(f, "matrix is not symmetric at ({row}, {col}): difference {delta:e}")
            }
            MatrixError::NonFinite { row, col } => {
                write!(f, "matrix entry ({row}, {col}) is not finite")
            }
            MatrixError::UnknownAssetClass(id) => {
                write!(f, "matrix references unknown asset class {id}")
            }
            MatrixError::NotFactorizable => write!(f, "matrix could not be factorized"),
        }
    }
}

impl std::error::Error for MatrixError {}

/// Allocation weights that cannot be used as a portfolio target
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationError {
    Empty,
    NegativeWeight { asset: AssetClassId, weight: f64 },
    NonFinite { asset: AssetClassId },
    SumMismatch { sum: f64 },
    UnknownAssetClass(AssetClassId),
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::Empty => write!(f, "allocation has no weights"),
            AllocationError::NegativeWeight { asset, weight } => {
                write!(f, "weight for {asset} is negative ({weight})")
            }
            AllocationError::NonFinite { asset } => write!(f, "weight for {asset} is not finite"),
            AllocationError::SumMismatch { sum } => {
                write!(f, "weights sum to {sum}, expected 1.0")
            }
            AllocationError::UnknownAssetClass(id) => {
                write!(f, "allocation references unknown asset class {id}")
            }
        }
    }
}

impl std::error::Error for AllocationError {}

/// Portfolio optimization could not produce a valid weight vector
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationError {
    EmptyUniverse,
    Infeasible { reason: String },
    DidNotConverge { iterations: usize },
}

impl OptimizationError {
    pub(crate) fn infeasible(reason: impl Into<String>) -> Self {
        OptimizationError::Infeasible {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for OptimizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationError::EmptyUniverse => write!(f, "asset universe is empty"),
            OptimizationError::Infeasible { reason } => write!(f, "infeasible: {reason}"),
            OptimizationError::DidNotConverge { iterations } => {
                write!(f, "solver did not converge after {iterations} iterations")
            }
        }
    }
}

impl std::error::Error for OptimizationError {}

/// Top-level error for market model construction, simulation and analytics
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Lookup(LookupError),
    InvalidMatrix(MatrixError),
    InvalidAllocation(AllocationError),
    Optimization(OptimizationError),
    /// Too few paths or periods for the requested statistic
    InsufficientData {
        statistic: &'static str,
        required: usize,
        actual: usize,
    },
    /// Inconsistent or unusable configuration
    Config(String),
    /// A non-finite value appeared in a simulated path
    NumericalInstability {
        path: usize,
        period: usize,
    },
    /// The run was cancelled before all paths completed
    Cancelled,
}

impl SimulationError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SimulationError::Config(msg.into())
    }
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Lookup(e) => write!(f, "{e}"),
            SimulationError::InvalidMatrix(e) => write!(f, "invalid matrix: {e}"),
            SimulationError::InvalidAllocation(e) => write!(f, "invalid allocation: {e}"),
            SimulationError::Optimization(e) => write!(f, "optimization failed: {e}"),
            SimulationError::InsufficientData {
                statistic,
                required,
                actual,
            } => write!(
                f,
                "insufficient data for {statistic}: need at least {required}, got {actual}"
            ),
            SimulationError::Config(msg) => write!(f, "configuration error: {msg}"),
            SimulationError::NumericalInstability { path, period } => {
                write!(f, "non-finite value in path {path} at period {period}")
            }
            SimulationError::Cancelled => write!(f, "simulation cancelled"),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Lookup(e) => Some(e),
            SimulationError::InvalidMatrix(e) => Some(e),
            SimulationError::InvalidAllocation(e) => Some(e),
            SimulationError::Optimization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LookupError> for SimulationError {
    fn from(e: LookupError) -> Self {
        SimulationError::Lookup(e)
    }
}

impl From<MatrixError> for SimulationError {
    fn from(e: MatrixError) -> Self {
        SimulationError::InvalidMatrix(e)
    }
}

impl From<AllocationError> for SimulationError {
    fn from(e: AllocationError) -> Self {
        SimulationError::InvalidAllocation(e)
    }
}

impl From<OptimizationError> for SimulationError {
    fn from(e: OptimizationError) -> Self {
        SimulationError::Optimization(e)
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
