//! The pool/flux kernel (spec.md §4.1, component C1).
//!
//! `compute_pools` and `compute_flux` are the only two entry points. Both
//! iterate stands independently — each stand's row is a function of its
//! own row only (spec.md §5), so an implementation is free to parallelize
//! internally; this one does not, favoring the simplest correct sequential
//! form. Op order within one call is significant and is the sole control
//! over operator composition (spec.md §4.1 "Numerics").

use crate::error::{CoreError, DimensionError, DomainError};
use crate::matrix::{Op, SparseMatrix};
use crate::pools::FluxIndicatorDefinition;

/// Dense `N × P` pool (or flux) matrix, row-major: `data[i * n_cols + j]`.
/// This is the contiguous, kernel-facing storage the spec contrasts with
/// the dataframe-like view assembly works with (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct PoolMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl PoolMatrix {
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self { n_rows, n_cols, data: vec![0.0; n_rows * n_cols] }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn fill_row(&mut self, i: usize, value: f64) {
        self.row_mut(i).iter_mut().for_each(|x| *x = value);
    }

    pub fn zero_all(&mut self) {
        self.data.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Total mass across every stand and pool (used by mass-conservation
    /// test harnesses, spec.md §8 property 1/5).
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }
}

fn validate_op(op: &Op, n_stands: usize, n_pools: usize) -> Result<(), DimensionError> {
    if op.matrix_index.len() != n_stands {
        return Err(DimensionError::IndexLength {
            op: op.name.clone(),
            got: op.matrix_index.len(),
            expected: n_stands,
        });
    }
    for m in &op.matrices {
        if m.dim() != n_pools {
            return Err(DimensionError::PoolCount {
                op: op.name.clone(),
                got: m.dim(),
                expected: n_pools,
            });
        }
    }
    for (stand, &idx) in op.matrix_index.iter().enumerate() {
        if idx as usize >= op.matrices.len() {
            return Err(DimensionError::MatrixIndexOutOfRange {
                op: op.name.clone(),
                stand,
                index: idx,
                n_matrices: op.matrices.len(),
            });
        }
    }
    Ok(())
}

/// `pools[i] ← pools[i] · M` for each enabled stand `i`, in op order.
/// Stands with `enabled[i] = false` are left untouched (spec.md §4.1).
pub fn compute_pools(ops: &[Op], pools: &mut PoolMatrix, enabled: &[bool]) -> Result<(), CoreError> {
    let n_stands = pools.n_rows();
    let n_pools = pools.n_cols();
    if enabled.len() != n_stands {
        return Err(DimensionError::IndexLength { op: "<enabled mask>".into(), got: enabled.len(), expected: n_stands }.into());
    }

    let mut scratch = vec![0.0; n_pools];
    for op in ops {
        validate_op(op, n_stands, n_pools)?;
        for i in 0..n_stands {
            if !enabled[i] {
                continue;
            }
            let m = &op.matrices[op.matrix_index[i] as usize];
            apply_matrix_into(pools.row(i), m, &mut scratch);
            pools.row_mut(i).copy_from_slice(&scratch);
        }
    }
    Ok(())
}

/// As `compute_pools`, but before each vector-matrix product, accumulate
/// `F = diag(pools[i]) · (M − I)` into every flux indicator whose process
/// tag matches this op's (spec.md §4.1). Only off-diagonal (transferred,
/// not retained) mass is counted.
pub fn compute_flux(
    ops: &[Op],
    flux_indicators: &[FluxIndicatorDefinition],
    pools: &mut PoolMatrix,
    flux: &mut PoolMatrix,
    enabled: &[bool],
) -> Result<(), CoreError> {
    let n_stands = pools.n_rows();
    let n_pools = pools.n_cols();
    if enabled.len() != n_stands {
        return Err(DimensionError::IndexLength { op: "<enabled mask>".into(), got: enabled.len(), expected: n_stands }.into());
    }
    if flux.n_rows() != n_stands {
        return Err(DimensionError::IndexLength { op: "<flux rows>".into(), got: flux.n_rows(), expected: n_stands }.into());
    }
    if flux.n_cols() != flux_indicators.len() {
        return Err(DimensionError::ColumnLength {
            name: "<flux columns>".into(),
            got: flux.n_cols(),
            expected: flux_indicators.len(),
        });
    }

    // Precompute, for each op's process tag, which indicator columns match.
    let mut scratch = vec![0.0; n_pools];
    for op in ops {
        validate_op(op, n_stands, n_pools)?;
        let matching: Vec<usize> = flux_indicators
            .iter()
            .enumerate()
            .filter(|(_, d)| d.process_tag == op.process_tag)
            .map(|(idx, _)| idx)
            .collect();

        for i in 0..n_stands {
            if !enabled[i] {
                continue;
            }
            let m = &op.matrices[op.matrix_index[i] as usize];
            let row_before = pools.row(i);

            for &indicator_idx in &matching {
                let def = &flux_indicators[indicator_idx];
                let mut total = 0.0;
                for &s in &def.sources {
                    for (c, coeff) in m.row(s) {
                        if c == s {
                            continue; // retained fraction, not a transfer
                        }
                        if def.sinks.contains(&c) {
                            total += row_before[s] * coeff;
                        }
                    }
                }
                flux.row_mut(i)[indicator_idx] += total;
            }

            apply_matrix_into(row_before, m, &mut scratch);
            pools.row_mut(i).copy_from_slice(&scratch);
        }
    }
    Ok(())
}

/// Fatal post-step/post-spinup-tick check (spec.md §7 "non-finite inputs,
/// negative pool values after a step" — no silent clamping). Drivers call
/// this once per tick after every op for that tick has applied.
pub fn validate_pool_values(pools: &PoolMatrix) -> Result<(), CoreError> {
    for stand in 0..pools.n_rows() {
        for (pool, &value) in pools.row(stand).iter().enumerate() {
            if !value.is_finite() {
                return Err(DomainError::NonfinitePoolValue { stand, pool, value }.into());
            }
            if value < 0.0 {
                return Err(DomainError::NegativePoolValue { stand, pool, value }.into());
            }
        }
    }
    Ok(())
}

fn apply_matrix_into(v: &[f64], m: &SparseMatrix, out: &mut [f64]) {
    out.iter_mut().for_each(|x| *x = 0.0);
    for (r, &vr) in v.iter().enumerate() {
        if vr == 0.0 {
            continue;
        }
        for (c, coeff) in m.row(r) {
            out[c] += vr * coeff;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;
    use crate::pools::ProcessTag;

    fn two_pool_identity_op() -> Op {
        Op::identity("identity", 2, 2, ProcessTag::Decay)
    }

    #[test]
    fn identity_op_is_idempotent() {
        let mut pools = PoolMatrix::zeros(2, 2);
        pools.row_mut(0).copy_from_slice(&[1.0, 2.0]);
        pools.row_mut(1).copy_from_slice(&[3.0, 4.0]);
        let before = pools.clone();

        compute_pools(&[two_pool_identity_op()], &mut pools, &[true, true]).unwrap();
        assert_eq!(pools.row(0), before.row(0));
        assert_eq!(pools.row(1), before.row(1));
    }

    #[test]
    fn disabled_stand_is_untouched() {
        let m = SparseMatrix::from_triples(2, &[(0, 0, 0.0), (0, 1, 1.0)]).unwrap();
        let op = Op::new("move_all", vec![m], vec![0, 0], ProcessTag::Disturbance);

        let mut pools = PoolMatrix::zeros(2, 2);
        pools.row_mut(0).copy_from_slice(&[10.0, 0.0]);
        pools.row_mut(1).copy_from_slice(&[10.0, 0.0]);

        compute_pools(&[op], &mut pools, &[true, false]).unwrap();
        assert_eq!(pools.row(0), &[0.0, 10.0]);
        assert_eq!(pools.row(1), &[10.0, 0.0]);
    }

    #[test]
    fn flux_matches_offdiagonal_transfer() {
        // Pool 0 -> pool 1 at 30%, pool 0 retains 70%.
        let m = SparseMatrix::from_triples(2, &[(0, 0, 0.7), (0, 1, 0.3)]).unwrap();
        let op = Op::new("decay", vec![m], vec![0], ProcessTag::Decay);
        let indicators = vec![FluxIndicatorDefinition {
            name: "Decay".into(),
            process_tag: ProcessTag::Decay,
            sources: vec![0],
            sinks: vec![1],
        }];

        let mut pools = PoolMatrix::zeros(1, 2);
        pools.row_mut(0).copy_from_slice(&[100.0, 0.0]);
        let mut flux = PoolMatrix::zeros(1, 1);

        compute_flux(&[op], &indicators, &mut pools, &mut flux, &[true]).unwrap();

        assert_eq!(flux.row(0)[0], 30.0);
        assert_eq!(pools.row(0), &[70.0, 30.0]);
    }

    #[test]
    fn mismatched_index_length_errors() {
        let op = Op::new("bad", vec![SparseMatrix::identity(2)], vec![0], ProcessTag::Decay);
        let mut pools = PoolMatrix::zeros(2, 2);
        let err = compute_pools(&[op], &mut pools, &[true, true]).unwrap_err();
        assert!(matches!(err, CoreError::Dimension(DimensionError::IndexLength { .. })));
    }

    #[test]
    fn out_of_range_matrix_index_errors() {
        let op = Op::new("bad", vec![SparseMatrix::identity(2)], vec![5, 0], ProcessTag::Decay);
        let mut pools = PoolMatrix::zeros(2, 2);
        let err = compute_pools(&[op], &mut pools, &[true, true]).unwrap_err();
        assert!(matches!(err, CoreError::Dimension(DimensionError::MatrixIndexOutOfRange { .. })));
    }

    #[test]
    fn validate_pool_values_accepts_finite_nonnegative() {
        let mut pools = PoolMatrix::zeros(1, 2);
        pools.row_mut(0).copy_from_slice(&[1.0, 0.0]);
        validate_pool_values(&pools).unwrap();
    }

    #[test]
    fn validate_pool_values_rejects_negative() {
        let mut pools = PoolMatrix::zeros(1, 2);
        pools.row_mut(0).copy_from_slice(&[-1.0, 0.0]);
        let err = validate_pool_values(&pools).unwrap_err();
        assert!(matches!(err, CoreError::Domain(DomainError::NegativePoolValue { stand: 0, pool: 0, .. })));
    }

    #[test]
    fn validate_pool_values_rejects_nonfinite() {
        let mut pools = PoolMatrix::zeros(1, 2);
        pools.row_mut(0).copy_from_slice(&[f64::NAN, 0.0]);
        let err = validate_pool_values(&pools).unwrap_err();
        assert!(matches!(err, CoreError::Domain(DomainError::NonfinitePoolValue { stand: 0, pool: 0, .. })));
    }
}
