//! dom_decay op assembly (spec.md §4.2 op 4).

use std::collections::HashMap;

use crate::error::{ConfigurationError, CoreError};
use crate::matrix::{Op, SparseMatrix};
use crate::params::DecayParameters;
use crate::pool_names::PoolIds;
use crate::pools::ProcessTag;
use crate::state::StandState;

/// `dom_decay` (spec.md §4.2 op 4): for each DOM pool, rate
/// `r = min(max_rate, base_rate * Q10^((T - T_ref)/10))`; proportion
/// `proportion_to_atmosphere` flows to CO2, the remainder flows to
/// above-ground slow soil — except stem-snag and branch-snag decay,
/// which route to their own sinks (spec.md "except stem-snag and
/// branch-snag decay, which have their own routing tables").
pub fn build_dom_decay_op(
    name: &str,
    stands: &[StandState],
    pool_ids: &PoolIds,
    n_pools: usize,
    decay_params: &[DecayParameters],
    mean_annual_temperature: &HashMap<u32, f64>,
) -> Result<Op, CoreError> {
    let mut bucket_index: HashMap<u64, u32> = HashMap::new();
    let mut matrices = Vec::new();
    let mut matrix_index = Vec::with_capacity(stands.len());

    let dom_pools = [
        pool_ids.above_ground_very_fast_soil,
        pool_ids.below_ground_very_fast_soil,
        pool_ids.above_ground_fast_soil,
        pool_ids.below_ground_fast_soil,
        pool_ids.medium_soil,
        pool_ids.above_ground_slow_soil,
        pool_ids.below_ground_slow_soil,
        pool_ids.stem_snag,
        pool_ids.branch_snag,
    ];

    for stand in stands {
        let temperature = mean_annual_temperature
            .get(&stand.spatial_unit)
            .copied()
            .ok_or_else(|| ConfigurationError::MissingParameterRow {
                table: "mean_annual_temperature".into(),
                key: format!("spatial_unit={}", stand.spatial_unit),
            })?;
        // quantize to 1/100 degree so stands sharing a spatial unit and
        // temperature share one matrix (spec.md §9 "batched polymorphism").
        let key = (temperature * 100.0).round() as i64 as u64;

        let idx = match bucket_index.get(&key) {
            Some(&idx) => idx,
            None => {
                let m = build_matrix(pool_ids, n_pools, &dom_pools, decay_params, temperature)?;
                let idx = matrices.len() as u32;
                matrices.push(m);
                bucket_index.insert(key, idx);
                idx
            }
        };
        matrix_index.push(idx);
    }

    Ok(Op::new(name, matrices, matrix_index, ProcessTag::Decay))
}

fn build_matrix(
    pool_ids: &PoolIds,
    n_pools: usize,
    dom_pools: &[crate::pools::PoolId],
    decay_params: &[DecayParameters],
    temperature: f64,
) -> Result<SparseMatrix, CoreError> {
    let mut triples = Vec::new();

    for &pool in dom_pools {
        let params = match decay_params.iter().find(|d| d.pool == pool) {
            Some(p) => p,
            None => continue,
        };
        let rate = params.rate_at(temperature);
        if rate <= 0.0 {
            continue;
        }
        let to_atmosphere = rate * params.proportion_to_atmosphere;
        let to_soil = rate - to_atmosphere;

        let sink = if pool == pool_ids.stem_snag {
            pool_ids.medium_soil
        } else if pool == pool_ids.branch_snag {
            pool_ids.above_ground_fast_soil
        } else {
            pool_ids.above_ground_slow_soil
        };

        if to_atmosphere > 0.0 {
            triples.push((pool, pool_ids.co2, to_atmosphere));
        }
        if to_soil > 0.0 && sink != pool {
            triples.push((pool, sink, to_soil));
        }
        triples.push((pool, pool, 1.0 - rate));
    }

    let m = SparseMatrix::from_triples(n_pools, &triples)?;
    m.validate_domain()?;
    Ok(m)
}
