//! Correlation matrices with positive-definite repair
//!
//! Correlation estimates assembled from pairwise historical data are often
//! inconsistent (not positive semi-definite). Before a matrix can be used to
//! draw correlated shocks it is repaired by clipping eigenvalues to
//! [`EIGENVALUE_FLOOR`], reconstructing, and re-normalizing the diagonal to
//! 1.0. The repair is recorded on the matrix so callers can report it.

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use super::ids::AssetClassId;
use crate::error::MatrixError;

/// Eigenvalues below this value are clipped up to it during repair
pub const EIGENVALUE_FLOOR: f64 = 1e-8;

/// Matrices whose smallest eigenvalue is at least this are used without repair.
/// Below [`EIGENVALUE_FLOOR`] so a repaired matrix is a fixed point of the repair.
pub const MIN_ACCEPTED_EIGENVALUE: f64 = 1e-10;

/// Maximum absolute asymmetry `|a[i][j] - a[j][i]|` accepted as input
pub const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Record of a correction applied to a correlation matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRepair {
    /// Number of eigenvalues that were below the floor
    pub clipped_eigenvalues: usize,
    /// Smallest eigenvalue of the input matrix
    pub min_eigenvalue: f64,
    /// Largest absolute change to any entry
    pub max_adjustment: f64,
}

/// Serialized form; deserialization goes through [`build_correlation_matrix`].
/// The repair record travels with the repaired rows, which are themselves
/// accepted without further repair.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CorrelationMatrixRepr {
    ids: Vec<AssetClassId>,
    rows: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repair: Option<CorrelationRepair>,
}

/// Square, symmetric, unit-diagonal, positive-definite correlation matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CorrelationMatrixRepr", into = "CorrelationMatrixRepr")]
pub struct CorrelationMatrix {
    ids: Vec<AssetClassId>,
    /// Row-major n x n values
    values: Vec<f64>,
    repair: Option<CorrelationRepair>,
}

impl TryFrom<CorrelationMatrixRepr> for CorrelationMatrix {
    type Error = MatrixError;

    fn try_from(repr: CorrelationMatrixRepr) -> Result<Self, Self::Error> {
        let mut matrix = build_correlation_matrix(&repr.ids, &repr.rows)?;
        if matrix.repair.is_none() {
            matrix.repair = repr.repair;
        }
        Ok(matrix)
    }
}

impl From<CorrelationMatrix> for CorrelationMatrixRepr {
    fn from(m: CorrelationMatrix) -> Self {
        let rows = m.rows();
        Self {
            ids: m.ids,
            rows,
            repair: m.repair,
        }
    }
}

impl CorrelationMatrix {
    /// Identity correlation (uncorrelated asset classes)
    #[must_use]
    pub fn identity(ids: Vec<AssetClassId>) -> Self {
        let n = ids.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
        }
        Self {
            ids,
            values,
            repair: None,
        }
    }

    /// Build from pairwise estimates; unspecified pairs are uncorrelated.
    pub fn from_pairwise(
        ids: &[AssetClassId],
        pairs: &[(AssetClassId, AssetClassId, f64)],
    ) -> Result<Self, MatrixError> {
        let n = ids.len();
        if n == 0 {
            return Err(MatrixError::Empty);
        }
        let mut rows = vec![vec![0.0; n]; n];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        for (a, b, rho) in pairs {
            let i = ids.iter().position(|id| id == a);
            let j = ids.iter().position(|id| id == b);
            let (Some(i), Some(j)) = (i, j) else {
                let missing = if i.is_none() { a } else { b };
                return Err(MatrixError::UnknownAssetClass(missing.clone()));
            };
            rows[i][j] = *rho;
            rows[j][i] = *rho;
        }
        build_correlation_matrix(ids, &rows)
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn ids(&self) -> &[AssetClassId] {
        &self.ids
    }

    #[must_use]
    pub fn repair(&self) -> Option<&CorrelationRepair> {
        self.repair.as_ref()
    }

    #[must_use]
    pub fn was_repaired(&self) -> bool {
        self.repair.is_some()
    }

    /// Entry by position
    #[must_use]
    #[inline]
    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.dim() + j]
    }

    /// Entry by asset class identifiers
    #[must_use]
    pub fn get(&self, a: &AssetClassId, b: &AssetClassId) -> Option<f64> {
        let i = self.ids.iter().position(|id| id == a)?;
        let j = self.ids.iter().position(|id| id == b)?;
        Some(self.at(i, j))
    }

    #[must_use]
    pub fn rows(&self) -> Vec<Vec<f64>> {
        let n = self.dim();
        self.values.chunks(n).map(<[f64]>::to_vec).collect()
    }

    /// Eigenvalues in ascending order
    #[must_use]
    pub fn eigenvalues(&self) -> Vec<f64> {
        let n = self.dim();
        let eigen = SymmetricEigen::new(DMatrix::from_row_slice(n, n, &self.values));
        let mut values: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
        values.sort_by(f64::total_cmp);
        values
    }

    /// Lower Cholesky factor `L` (row-major, zeros above the diagonal) with `R = L Lᵀ`
    pub fn cholesky_lower(&self) -> Result<Vec<f64>, MatrixError> {
        let n = self.dim();
        let chol = Cholesky::new(DMatrix::from_row_slice(n, n, &self.values))
            .ok_or(MatrixError::NotFactorizable)?;
        let l = chol.l();
        let mut out = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..=i {
                out[i * n + j] = l[(i, j)];
            }
        }
        Ok(out)
    }

    /// Restrict to a subset of asset classes, in the given order
    pub fn select(&self, ids: &[AssetClassId]) -> Result<Self, MatrixError> {
        let idx = ids
            .iter()
            .map(|id| {
                self.ids
                    .iter()
                    .position(|x| x == id)
                    .ok_or_else(|| MatrixError::UnknownAssetClass(id.clone()))
            })
            .collect::<Result<Vec<usize>, _>>()?;
        let n = idx.len();
        let mut values = vec![0.0; n * n];
        for (a, &i) in idx.iter().enumerate() {
            for (b, &j) in idx.iter().enumerate() {
                values[a * n + b] = self.at(i, j);
            }
        }
        Ok(Self {
            ids: ids.to_vec(),
            values,
            repair: self.repair.clone(),
        })
    }
}

fn validate_input(ids: &[AssetClassId], rows: &[Vec<f64>]) -> Result<usize, MatrixError> {
    let n = rows.len();
    if n == 0 {
        return Err(MatrixError::Empty);
    }
    for (row, values) in rows.iter().enumerate() {
        if values.len() != n {
            return Err(MatrixError::NotSquare {
                rows: n,
                row,
                len: values.len(),
            });
        }
    }
    if ids.len() != n {
        return Err(MatrixError::DimensionMismatch {
            expected: ids.len(),
            actual: n,
        });
    }
    for i in 0..n {
        for j in 0..n {
            if !rows[i][j].is_finite() {
                return Err(MatrixError::NonFinite { row: i, col: j });
            }
        }
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let delta = (rows[i][j] - rows[j][i]).abs();
            if delta > SYMMETRY_TOLERANCE {
                return Err(MatrixError::NotSymmetric {
                    row: i,
                    col: j,
                    delta,
                });
            }
        }
    }
    Ok(n)
}

/// Build a usable correlation matrix from possibly inconsistent estimates.
///
/// Fails if the input is not square, not symmetric within
/// [`SYMMETRY_TOLERANCE`], contains non-finite entries, or does not match
/// `ids`. Matrices that are not positive definite (or whose diagonal is not
/// 1.0) are repaired and the repair is recorded. Deterministic for identical
/// input.
pub fn build_correlation_matrix(
    ids: &[AssetClassId],
    rows: &[Vec<f64>],
) -> Result<CorrelationMatrix, MatrixError> {
    let n = validate_input(ids, rows)?;

    let input = DMatrix::from_fn(n, n, |i, j| 0.5 * (rows[i][j] + rows[j][i]));
    let eigen = SymmetricEigen::new(input.clone());
    let min_eigenvalue = eigen
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let unit_diagonal = (0..n).all(|i| (input[(i, i)] - 1.0).abs() <= SYMMETRY_TOLERANCE);

    if unit_diagonal
        && min_eigenvalue >= MIN_ACCEPTED_EIGENVALUE
        && Cholesky::new(input.clone()).is_some()
    {
        let mut values: Vec<f64> = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                values.push(if i == j { 1.0 } else { input[(i, j)] });
            }
        }
        return Ok(CorrelationMatrix {
            ids: ids.to_vec(),
            values,
            repair: None,
        });
    }

    let clipped_eigenvalues = eigen
        .eigenvalues
        .iter()
        .filter(|&&v| v < EIGENVALUE_FLOOR)
        .count();
    let clipped = eigen.eigenvalues.map(|v| v.max(EIGENVALUE_FLOOR));
    let q = &eigen.eigenvectors;
    let rebuilt = q * DMatrix::from_diagonal(&clipped) * q.transpose();

    let scale: Vec<f64> = (0..n).map(|i| rebuilt[(i, i)].sqrt()).collect();
    let mut values = vec![0.0; n * n];
    for i in 0..n {
        values[i * n + i] = 1.0;
        for j in (i + 1)..n {
            let upper = rebuilt[(i, j)] / (scale[i] * scale[j]);
            let lower = rebuilt[(j, i)] / (scale[j] * scale[i]);
            let v = (0.5 * (upper + lower)).clamp(-1.0, 1.0);
            values[i * n + j] = v;
            values[j * n + i] = v;
        }
    }

    let max_adjustment = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| (values[i * n + j] - rows[i][j]).abs())
        .fold(0.0, f64::max);

    tracing::warn!(
        clipped_eigenvalues,
        min_eigenvalue,
        max_adjustment,
        "correlation matrix was not positive definite; repaired"
    );

    Ok(CorrelationMatrix {
        ids: ids.to_vec(),
        values,
        repair: Some(CorrelationRepair {
            clipped_eigenvalues,
            min_eigenvalue,
            max_adjustment,
        }),
    })
}
