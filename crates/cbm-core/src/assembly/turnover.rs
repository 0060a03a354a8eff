//! biomass_turnover / snag_turnover op assembly (spec.md §4.2 op 2).

use std::collections::HashMap;

use crate::error::CoreError;
use crate::matrix::{Op, SparseMatrix};
use crate::params::TurnoverParameters;
use crate::pool_names::PoolIds;
use crate::pools::ProcessTag;
use crate::state::StandState;

/// `biomass_turnover` (spec.md §4.2 op 2): proportional annual flows from
/// live biomass pools into DOM pools, keyed by (spatial_unit, species).
pub fn build_biomass_turnover_op(
    name: &str,
    stands: &[StandState],
    pool_ids: &PoolIds,
    n_pools: usize,
    turnover: &[TurnoverParameters],
) -> Result<Op, CoreError> {
    let mut bucket_index: HashMap<(u32, u32), u32> = HashMap::new();
    let mut matrices = Vec::new();
    let mut matrix_index = Vec::with_capacity(stands.len());

    for stand in stands {
        let key = (stand.spatial_unit, stand.species);
        let idx = match bucket_index.get(&key) {
            Some(&idx) => idx,
            None => {
                // A stand with no matching turnover row undergoes no
                // biomass turnover this tick, rather than erroring —
                // matches growth/decay's stand-local no-op default when
                // no parameter row resolves.
                let m = match turnover.iter().find(|t| t.spatial_unit == key.0 && t.species == key.1) {
                    Some(params) => build_matrix(pool_ids, n_pools, params)?,
                    None => SparseMatrix::identity(n_pools),
                };
                let idx = matrices.len() as u32;
                matrices.push(m);
                bucket_index.insert(key, idx);
                idx
            }
        };
        matrix_index.push(idx);
    }

    Ok(Op::new(name, matrices, matrix_index, ProcessTag::GrowthAndMortality))
}

fn build_matrix(pool_ids: &PoolIds, n_pools: usize, params: &TurnoverParameters) -> Result<SparseMatrix, CoreError> {
    let rate_of = |pool: usize| params.biomass_turnover_rate.get(&pool).copied().unwrap_or(0.0);

    let flows = [
        (pool_ids.merch, pool_ids.stem_snag, rate_of(pool_ids.merch)),
        (pool_ids.other_wood, pool_ids.branch_snag, rate_of(pool_ids.other_wood)),
        (pool_ids.foliage, pool_ids.above_ground_very_fast_soil, rate_of(pool_ids.foliage)),
        (pool_ids.coarse_root, pool_ids.below_ground_fast_soil, rate_of(pool_ids.coarse_root)),
        (pool_ids.fine_root, pool_ids.below_ground_very_fast_soil, rate_of(pool_ids.fine_root)),
    ];

    let mut triples = Vec::new();
    for &(src, sink, rate) in &flows {
        if rate <= 0.0 {
            continue;
        }
        triples.push((src, sink, rate));
        triples.push((src, src, 1.0 - rate));
    }

    let m = SparseMatrix::from_triples(n_pools, &triples)?;
    m.validate_domain()?;
    Ok(m)
}
