//! Sparse per-stand transfer matrices and the batched `Op` they compose into.
//!
//! Construction is coordinate (COO) — the natural shape for hand- or
//! table-built matrix specs (spec.md §4.2, §9 "Sparse matrix
//! representation"). `SparseMatrix::from_triples` finalizes a COO triple
//! list into CSR-by-row once, materializing implied diagonals, so the hot
//! loop in `kernel::compute` never re-derives them.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, CoreError, DimensionError, DomainError};
use crate::pools::{PoolId, ProcessTag};

/// One `P×P` transfer matrix: `pools' = pools · M`.
///
/// Stored CSR-by-row: `row_start[r]..row_start[r+1]` indexes into `cols`/
/// `coeffs` for the nonzero entries of row `r`. Diagonals are always
/// materialized (defaulted to 1.0 unless a triple overrides them).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseMatrix {
    dim: usize,
    row_start: Vec<usize>,
    cols: Vec<PoolId>,
    coeffs: Vec<f64>,
}

impl SparseMatrix {
    /// Build from a list of `(row, col, coefficient)` triples. Omitted
    /// diagonal entries default to 1.0 (retained fraction); omitted
    /// off-diagonal entries default to 0. Rejects a duplicate coordinate,
    /// a nonfinite or negative coefficient, or a source row whose total
    /// outflow exceeds 1.0 — per spec.md §4.1 and §7 DomainError.
    pub fn from_triples(dim: usize, triples: &[(PoolId, PoolId, f64)]) -> Result<Self, CoreError> {
        for &(r, c, _) in triples {
            if r >= dim {
                return Err(DimensionError::TripleIndexOutOfRange { index: r, n_pools: dim }.into());
            }
            if c >= dim {
                return Err(DimensionError::TripleIndexOutOfRange { index: c, n_pools: dim }.into());
            }
        }

        // dense[r][c] accumulates the explicit entries; None marks "not set".
        let mut dense: Vec<Vec<Option<f64>>> = vec![vec![None; dim]; dim];
        for &(r, c, v) in triples {
            if dense[r][c].is_some() {
                return Err(ConfigurationError::DuplicateCoordinate { row: r, col: c }.into());
            }
            dense[r][c] = Some(v);
        }

        let mut row_start = Vec::with_capacity(dim + 1);
        let mut cols = Vec::new();
        let mut coeffs = Vec::new();
        row_start.push(0);

        for r in 0..dim {
            for c in 0..dim {
                let v = match dense[r][c] {
                    Some(v) => v,
                    None if r == c => 1.0,
                    None => continue,
                };
                cols.push(c);
                coeffs.push(v);
            }
            row_start.push(cols.len());
        }

        Ok(Self { dim, row_start, cols, coeffs })
    }

    /// The `dim × dim` identity matrix (a disturbance-type-0 / no-op).
    pub fn identity(dim: usize) -> Self {
        Self::from_triples(dim, &[]).expect("identity construction cannot fail")
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Nonzero `(col, coefficient)` entries of row `r`, in column order.
    pub fn row(&self, r: usize) -> impl Iterator<Item = (PoolId, f64)> + '_ {
        let start = self.row_start[r];
        let end = self.row_start[r + 1];
        self.cols[start..end]
            .iter()
            .copied()
            .zip(self.coeffs[start..end].iter().copied())
    }

    /// Validate the domain contract: finite, non-negative coefficients and
    /// row sums ≤ 1 on the source side. Assembly (§4.2) is responsible for
    /// calling this on every matrix it builds; the kernel itself does not
    /// re-validate on every application (spec.md §4.1 "Numerics").
    pub fn validate_domain(&self) -> Result<(), DomainError> {
        self.validate_domain_excluding(None)
    }

    /// As `validate_domain`, but skips the row-sum ≤ 1 check for
    /// `exempt_row` — used for the constant-1 `Input` pool's row, which
    /// retains its diagonal *and* distributes growth increments
    /// elsewhere without being depleted (spec.md §4.1 "growth is
    /// modeled by draining from the constant-1 Input column").
    pub fn validate_domain_excluding(&self, exempt_row: Option<PoolId>) -> Result<(), DomainError> {
        for r in 0..self.dim {
            let mut sum = 0.0;
            for (c, v) in self.row(r) {
                if !v.is_finite() {
                    return Err(DomainError::NonfiniteCoefficient { row: r, col: c, value: v });
                }
                if v < 0.0 {
                    return Err(DomainError::NegativeCoefficient { row: r, col: c, value: v });
                }
                sum += v;
            }
            if Some(r) == exempt_row {
                continue;
            }
            if sum > 1.0 + 1e-9 {
                return Err(DomainError::RowSumExceedsOne { row: r, sum });
            }
        }
        Ok(())
    }
}

/// A batch of sparse matrices plus a per-stand selector — the unit the
/// kernel (C1) applies. `process_tag` attributes flux to indicators
/// (spec.md §3 "Matrix operation (Op)").
#[derive(Debug, Clone)]
pub struct Op {
    pub name: String,
    pub matrices: Vec<SparseMatrix>,
    pub matrix_index: Vec<u32>,
    pub process_tag: ProcessTag,
}

impl Op {
    pub fn new(name: impl Into<String>, matrices: Vec<SparseMatrix>, matrix_index: Vec<u32>, process_tag: ProcessTag) -> Self {
        Self { name: name.into(), matrices, matrix_index, process_tag }
    }

    /// An Op that is the identity for every stand — a legal no-op
    /// (spec.md §4.1 "Empty op lists are legal no-ops").
    pub fn identity(name: impl Into<String>, n_pools: usize, n_stands: usize, process_tag: ProcessTag) -> Self {
        Self {
            name: name.into(),
            matrices: vec![SparseMatrix::identity(n_pools)],
            matrix_index: vec![0; n_stands],
            process_tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implied_diagonal_defaults_to_one() {
        // An omitted diagonal always defaults to 1.0, even alongside an
        // explicit off-diagonal entry — it is the caller's job to supply
        // an explicit diagonal when the source pool should lose mass.
        let m = SparseMatrix::from_triples(2, &[(0, 1, 0.3)]).unwrap();
        let row0: Vec<_> = m.row(0).collect();
        assert_eq!(row0, vec![(0, 1.0), (1, 0.3)]);
    }

    #[test]
    fn explicit_diagonal_overrides_default() {
        let m = SparseMatrix::from_triples(2, &[(0, 0, 0.7), (0, 1, 0.3)]).unwrap();
        let row0: Vec<_> = m.row(0).collect();
        assert_eq!(row0, vec![(0, 0.7), (1, 0.3)]);
    }

    #[test]
    fn duplicate_coordinate_errors() {
        let err = SparseMatrix::from_triples(2, &[(0, 1, 0.3), (0, 1, 0.1)]).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(ConfigurationError::DuplicateCoordinate { row: 0, col: 1 })));
    }

    #[test]
    fn out_of_range_triple_index_errors() {
        let err = SparseMatrix::from_triples(2, &[(0, 5, 0.3)]).unwrap_err();
        assert!(matches!(err, CoreError::Dimension(DimensionError::TripleIndexOutOfRange { index: 5, n_pools: 2 })));
    }

    #[test]
    fn identity_has_all_diagonal_ones() {
        let m = SparseMatrix::identity(3);
        for r in 0..3 {
            let row: Vec<_> = m.row(r).collect();
            assert_eq!(row, vec![(r, 1.0)]);
        }
    }

    #[test]
    fn row_sum_over_one_is_rejected_by_validate() {
        let m = SparseMatrix::from_triples(2, &[(0, 0, 0.9), (0, 1, 0.5)]).unwrap();
        let err = m.validate_domain().unwrap_err();
        assert!(matches!(err, DomainError::RowSumExceedsOne { row: 0, .. }));
    }

    #[test]
    fn negative_coefficient_is_rejected() {
        let m = SparseMatrix::from_triples(2, &[(0, 1, -0.1)]).unwrap();
        let err = m.validate_domain().unwrap_err();
        assert!(matches!(err, DomainError::NegativeCoefficient { .. }));
    }
}
