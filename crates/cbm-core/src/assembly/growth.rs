//! growth / overmature_decline op assembly (spec.md §4.2 ops 1 & 3).

use crate::error::CoreError;
use crate::matrix::{Op, SparseMatrix};
use crate::params::{resolve_growth_curve, volume_to_biomass, BiomassConversionParameters, BiomassTargets, GrowthCurve, RootParameters};
use crate::pool_names::PoolIds;
use crate::pools::ProcessTag;
use crate::state::StandState;

fn targets_at(
    stand: &StandState,
    age: u32,
    curves: &[GrowthCurve],
    conversions: &[BiomassConversionParameters],
    roots: &[RootParameters],
) -> BiomassTargets {
    let curve = match resolve_growth_curve(curves, stand.species, &stand.classifiers) {
        Some(c) => c,
        None => return BiomassTargets::default(),
    };
    let conversion = match conversions.iter().find(|c| c.species == stand.species) {
        Some(c) => c,
        None => return BiomassTargets::default(),
    };
    let root = match roots.iter().find(|r| r.species == stand.species) {
        Some(r) => r,
        None => return BiomassTargets::default(),
    };
    let volume = curve.volume_at_age.eval_age(age);
    volume_to_biomass(volume, conversion, root)
}

/// Where growth targets come from (spec.md §9 "two engine variants").
///
/// `build_growth_op`/`build_overmature_decline_op` only ever need a pair
/// of before/after biomass targets per stand; both variants reduce to
/// that pair, so the same op-assembly and spinup/step drivers run
/// unmodified under either one.
pub enum GrowthSource<'a> {
    /// growth ops are assembled from merchantable-volume curves through a
    /// species-specific biomass conversion.
    VolumeDriven { curves: &'a [GrowthCurve], conversions: &'a [BiomassConversionParameters], roots: &'a [RootParameters] },
    /// the caller supplies net above-ground increments per stand per step
    /// directly; coarse/fine root increments are still derived from
    /// `RootParameters` fractions, matching `volume_to_biomass`'s own
    /// root-from-above-ground derivation.
    IncrementDriven { roots: &'a [RootParameters], merch_inc: &'a [f64], foliage_inc: &'a [f64], other_inc: &'a [f64] },
}

fn targets_now_and_next(stand: &StandState, index: usize, source: &GrowthSource) -> (BiomassTargets, BiomassTargets) {
    match source {
        GrowthSource::VolumeDriven { curves, conversions, roots } => {
            let now = targets_at(stand, stand.age, curves, conversions, roots);
            let next = targets_at(stand, stand.age + 1, curves, conversions, roots);
            (now, next)
        }
        GrowthSource::IncrementDriven { roots, merch_inc, foliage_inc, other_inc } => {
            let root = match roots.iter().find(|r| r.species == stand.species) {
                Some(r) => r,
                None => return (BiomassTargets::default(), BiomassTargets::default()),
            };
            let merch = merch_inc.get(index).copied().unwrap_or(0.0);
            let foliage = foliage_inc.get(index).copied().unwrap_or(0.0);
            let other_wood = other_inc.get(index).copied().unwrap_or(0.0);
            let above_ground = merch + foliage + other_wood;
            let coarse_root = above_ground * root.coarse_root_fraction;
            let fine_root = above_ground * root.fine_root_fraction;
            // `build_growth_op` halves the now->next delta and the caller
            // applies it twice per step, so a target pair that differs by
            // exactly the supplied increment reproduces it exactly over
            // the full step.
            let next = BiomassTargets { merch, foliage, other_wood, coarse_root, fine_root };
            (BiomassTargets::default(), next)
        }
    }
}

/// `growth` (spec.md §4.2 op 1): half the annual net positive change in
/// each biomass pool, drained from the constant-1 `Input` pool. Applied
/// twice per timestep by the caller — this builds one application's
/// worth of matrices.
pub fn build_growth_op(
    name: &str,
    stands: &[StandState],
    pool_ids: &PoolIds,
    n_pools: usize,
    source: &GrowthSource,
) -> Result<Op, CoreError> {
    let mut matrices = Vec::with_capacity(stands.len());
    let matrix_index: Vec<u32> = (0..stands.len() as u32).collect();

    for (i, stand) in stands.iter().enumerate() {
        let (now, next) = targets_now_and_next(stand, i, source);

        let mut triples = Vec::new();
        let biomass_pools = pool_ids.biomass_pools();
        let now_arr = [now.merch, now.foliage, now.other_wood, now.coarse_root, now.fine_root];
        let next_arr = [next.merch, next.foliage, next.other_wood, next.coarse_root, next.fine_root];

        for (pool, (&n, &nx)) in biomass_pools.iter().zip(now_arr.iter().zip(next_arr.iter())) {
            let half_delta = ((nx - n) / 2.0).max(0.0);
            if half_delta > 0.0 {
                triples.push((pool_ids.input, *pool, half_delta));
            }
        }
        let m = SparseMatrix::from_triples(n_pools, &triples)?;
        m.validate_domain_excluding(Some(pool_ids.input))?;
        matrices.push(m);
    }

    Ok(Op::new(name, matrices, matrix_index, ProcessTag::GrowthAndMortality))
}

/// `overmature_decline` (spec.md §4.2 op 3): when the age-driven target
/// drops, the decrement is routed from the biomass pool into a DOM pool
/// proportional to the pool's current standing mass, not back to Input.
pub fn build_overmature_decline_op(
    name: &str,
    stands: &[StandState],
    pool_ids: &PoolIds,
    n_pools: usize,
    pools_before: &crate::kernel::PoolMatrix,
    source: &GrowthSource,
) -> Result<Op, CoreError> {
    let mut matrices = Vec::with_capacity(stands.len());
    let matrix_index: Vec<u32> = (0..stands.len() as u32).collect();

    // source pool -> its DOM sink, mirroring the biomass_turnover routing.
    let routing = [
        (pool_ids.merch, pool_ids.stem_snag),
        (pool_ids.foliage, pool_ids.above_ground_very_fast_soil),
        (pool_ids.other_wood, pool_ids.branch_snag),
        (pool_ids.coarse_root, pool_ids.below_ground_fast_soil),
        (pool_ids.fine_root, pool_ids.below_ground_very_fast_soil),
    ];

    for (i, stand) in stands.iter().enumerate() {
        let (now, next) = targets_now_and_next(stand, i, source);
        let now_arr = [now.merch, now.foliage, now.other_wood, now.coarse_root, now.fine_root];
        let next_arr = [next.merch, next.foliage, next.other_wood, next.coarse_root, next.fine_root];
        let row = pools_before.row(i);

        let mut triples = Vec::new();
        for (idx, (&(src, sink), (&n, &nx))) in routing.iter().zip(now_arr.iter().zip(next_arr.iter())).enumerate() {
            let _ = idx;
            let decline = (n - nx).max(0.0);
            if decline <= 0.0 {
                continue;
            }
            let current = row[src];
            if current <= 0.0 {
                continue;
            }
            let fraction = (decline / current).min(1.0);
            triples.push((src, sink, fraction));
            triples.push((src, src, 1.0 - fraction));
        }
        let m = SparseMatrix::from_triples(n_pools, &triples)?;
        m.validate_domain()?;
        matrices.push(m);
    }

    Ok(Op::new(name, matrices, matrix_index, ProcessTag::GrowthAndMortality))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{compute_pools, PoolMatrix};
    use crate::params::LookupTable;
    use crate::pools::{PoolDefinition, PoolSet};

    fn pool_set() -> PoolSet {
        PoolSet::new(
            crate::pool_names::DEFAULT_ORDER
                .iter()
                .enumerate()
                .map(|(id, name)| PoolDefinition { name: name.to_string(), id })
                .collect(),
        )
        .unwrap()
    }

    fn curve() -> GrowthCurve {
        GrowthCurve {
            id: 1,
            species: 1,
            classifiers: vec![Some(17)],
            volume_at_age: LookupTable::new("c", vec![0.0, 50.0, 100.0], vec![0.0, 100.0, 150.0]),
        }
    }

    fn conversion() -> BiomassConversionParameters {
        BiomassConversionParameters {
            species: 1,
            specific_gravity: 0.4,
            bark_fraction: 0.1,
            foliage_fraction: 0.05,
            other_wood_fraction: 0.15,
        }
    }

    fn roots() -> RootParameters {
        RootParameters { species: 1, coarse_root_fraction: 0.2, fine_root_fraction: 0.05, coarse_root_turnover_rate: 0.02, fine_root_turnover_rate: 0.5 }
    }

    fn stand(age: u32) -> StandState {
        StandState {
            age,
            land_class: 0,
            time_since_last_disturbance: 0,
            time_since_land_class_change: 0,
            regeneration_delay: 0,
            growth_enabled: true,
            enabled: true,
            last_disturbance_type: 0,
            growth_multiplier: 1.0,
            spatial_unit: 17,
            species: 1,
            classifiers: vec![17],
            historical_disturbance_type: 1,
            last_pass_disturbance_type: 1,
        }
    }

    #[test]
    fn growth_drains_input_into_merch() {
        let pools_set = pool_set();
        let ids = PoolIds::resolve(&pools_set).unwrap();
        let stands = vec![stand(10)];
        let source = GrowthSource::VolumeDriven { curves: &[curve()], conversions: &[conversion()], roots: &[roots()] };
        let op = build_growth_op("growth", &stands, &ids, pools_set.len(), &source).unwrap();

        let mut pools = PoolMatrix::zeros(1, pools_set.len());
        pools.row_mut(0)[ids.input] = 1.0;
        compute_pools(&[op], &mut pools, &[true]).unwrap();

        assert_eq!(pools.row(0)[ids.input], 1.0);
        assert!(pools.row(0)[ids.merch] > 0.0);
    }
}
