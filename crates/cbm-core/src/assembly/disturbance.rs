//! disturbance op assembly (spec.md §4.2 op 6).

use std::collections::HashMap;

use crate::assembly::schema::{parse_schema, ColumnKind};
use crate::error::{ConfigurationError, CoreError, DimensionError};
use crate::matrix::{Op, SparseMatrix};
use crate::params::{resolve_disturbance_matrix, DisturbanceMatrixAssociation, DisturbanceMatrixValue};
use crate::pools::{PoolSet, ProcessTag};

/// `disturbance` (spec.md §4.2 op 6): looked up by `(disturbance_type,
/// spatial_unit, land_class)` -> a list of `(source, sink, proportion)`
/// flows. `disturbance_type = 0` is the identity no-op.
///
/// `disturbance_type` is taken per-stand from the caller-supplied
/// parameter (`parameters.disturbance_type`, spec.md §6); it is not a
/// field of `StandState` itself, so this takes it as a parallel slice
/// rather than reading it off the stand.
pub fn build_disturbance_op(
    name: &str,
    spatial_units: &[u32],
    land_classes: &[u32],
    disturbance_types: &[u32],
    n_pools: usize,
    associations: &[DisturbanceMatrixAssociation],
    matrix_values: &[DisturbanceMatrixValue],
) -> Result<Op, CoreError> {
    let n_stands = spatial_units.len();
    let mut bucket_index: HashMap<u32, u32> = HashMap::new();
    let mut matrices = Vec::new();
    let mut matrix_index = Vec::with_capacity(n_stands);

    // Reserve bucket 0 for the identity / disturbance_type-0 matrix so
    // every Op always has at least one matrix, even if every stand in
    // this batch happens to be undisturbed.
    matrices.push(SparseMatrix::identity(n_pools));
    bucket_index.insert(0, 0);

    for i in 0..n_stands {
        let disturbance_type = disturbance_types[i];
        let matrix_id = resolve_disturbance_matrix(associations, disturbance_type, spatial_units[i], land_classes[i])?;

        let idx = match bucket_index.get(&matrix_id) {
            Some(&idx) => idx,
            None => {
                let triples: Vec<_> = matrix_values
                    .iter()
                    .filter(|v| v.matrix_id == matrix_id)
                    .map(|v| (v.source_pool, v.sink_pool, v.proportion))
                    .collect();
                let m = SparseMatrix::from_triples(n_pools, &triples)?;
                m.validate_domain()?;
                let idx = matrices.len() as u32;
                matrices.push(m);
                bucket_index.insert(matrix_id, idx);
                idx
            }
        };
        matrix_index.push(idx);
    }

    Ok(Op::new(name, matrices, matrix_index, ProcessTag::Disturbance))
}

/// Build `DisturbanceMatrixValue` rows from a dataframe-style header/row
/// pair (spec.md §9 "dynamic column semantics") — the shape a calibrated
/// disturbance matrix library is typically authored in, one row per
/// `matrix_id` and one `SRC.SINK` column per transfer. `[table.var]`
/// lookup-key columns are skipped here: a disturbance matrix is keyed by
/// `matrix_id` directly, not by a parameter-table lookup.
pub fn disturbance_values_from_columns(pools: &PoolSet, matrix_id: u32, headers: &[String], row: &[f64]) -> Result<Vec<DisturbanceMatrixValue>, CoreError> {
    let schema = parse_schema(headers)?;
    if row.len() != schema.len() {
        return Err(DimensionError::ColumnLength { name: "<disturbance matrix row>".into(), got: row.len(), expected: schema.len() }.into());
    }

    let mut values = Vec::new();
    for (kind, &proportion) in schema.iter().zip(row) {
        let ColumnKind::Coefficient { src, sink } = kind else {
            continue;
        };
        let source_pool = pools.id_of(src).ok_or_else(|| ConfigurationError::UnknownPool(src.clone()))?;
        let sink_pool = pools.id_of(sink).ok_or_else(|| ConfigurationError::UnknownPool(sink.clone()))?;
        values.push(DisturbanceMatrixValue { matrix_id, source_pool, sink_pool, proportion });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{compute_pools, PoolMatrix};

    #[test]
    fn disturbance_type_zero_is_identity() {
        let op = build_disturbance_op("disturbance", &[17], &[0], &[0], 2, &[], &[]).unwrap();
        let mut pools = PoolMatrix::zeros(1, 2);
        pools.row_mut(0).copy_from_slice(&[5.0, 3.0]);
        compute_pools(&[op], &mut pools, &[true]).unwrap();
        assert_eq!(pools.row(0), &[5.0, 3.0]);
    }

    #[test]
    fn nonzero_disturbance_applies_looked_up_matrix() {
        let associations = vec![DisturbanceMatrixAssociation { spatial_unit: 17, disturbance_type: 1, land_class: None, matrix_id: 9 }];
        let values = vec![DisturbanceMatrixValue { matrix_id: 9, source_pool: 0, sink_pool: 1, proportion: 0.5 }];
        let op = build_disturbance_op("disturbance", &[17], &[0], &[1], 2, &associations, &values).unwrap();

        let mut pools = PoolMatrix::zeros(1, 2);
        pools.row_mut(0).copy_from_slice(&[10.0, 0.0]);
        compute_pools(&[op], &mut pools, &[true]).unwrap();
        assert_eq!(pools.row(0), &[5.0, 5.0]);
    }

    fn two_pool_set() -> crate::pools::PoolSet {
        crate::pools::PoolSet::new(vec![
            crate::pools::PoolDefinition { name: "Input".into(), id: 0 },
            crate::pools::PoolDefinition { name: "Merch".into(), id: 1 },
            crate::pools::PoolDefinition { name: "StemSnag".into(), id: 2 },
        ])
        .unwrap()
    }

    #[test]
    fn parses_coefficient_columns_into_matrix_values() {
        let pools = two_pool_set();
        let headers = vec!["Merch.StemSnag".to_string(), "[turnover.species]".to_string()];
        let row = vec![0.9, 1.0];

        let values = disturbance_values_from_columns(&pools, 9, &headers, &row).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], DisturbanceMatrixValue { matrix_id: 9, source_pool: 1, sink_pool: 2, proportion: 0.9 });
    }

    #[test]
    fn rejects_column_naming_an_unknown_pool() {
        let pools = two_pool_set();
        let headers = vec!["Merch.Foliage".to_string()];
        let err = disturbance_values_from_columns(&pools, 9, &headers, &[0.5]).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(ConfigurationError::UnknownPool(name)) if name == "Foliage"));
    }

    #[test]
    fn rejects_row_length_mismatch() {
        let pools = two_pool_set();
        let headers = vec!["Merch.StemSnag".to_string()];
        let err = disturbance_values_from_columns(&pools, 9, &headers, &[]).unwrap_err();
        assert!(matches!(err, CoreError::Dimension(DimensionError::ColumnLength { .. })));
    }
}
