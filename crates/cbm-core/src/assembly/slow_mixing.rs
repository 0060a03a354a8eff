//! slow_mixing op assembly (spec.md §4.2 op 5).

use crate::error::CoreError;
use crate::matrix::{Op, SparseMatrix};
use crate::pool_names::PoolIds;
use crate::pools::ProcessTag;

/// `slow_mixing` (spec.md §4.2 op 5): a small constant rate transferring
/// from above-ground slow soil to below-ground slow soil. One shared
/// matrix broadcast across every stand — the rate is a scalar parameter,
/// not keyed by any stand attribute (spec.md §3 "Slow-mixing rate
/// (scalar)").
pub fn build_slow_mixing_op(name: &str, pool_ids: &PoolIds, n_pools: usize, n_stands: usize, rate: f64) -> Result<Op, CoreError> {
    let triples = if rate > 0.0 {
        vec![
            (pool_ids.above_ground_slow_soil, pool_ids.below_ground_slow_soil, rate),
            (pool_ids.above_ground_slow_soil, pool_ids.above_ground_slow_soil, 1.0 - rate),
        ]
    } else {
        vec![]
    };
    let m = SparseMatrix::from_triples(n_pools, &triples)?;
    m.validate_domain()?;

    Ok(Op::new(name, vec![m], vec![0; n_stands], ProcessTag::Decay))
}
