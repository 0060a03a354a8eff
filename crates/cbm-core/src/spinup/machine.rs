//! Spinup state machine (spec.md §4.3, component C3).
//!
//! Drives each stand from zero pools to an approximate steady state
//! under its historical disturbance regime, then to its declared
//! inventory condition. Stands progress through phases independently;
//! `run_spinup_tick` advances every stand by one year, batching the
//! shared annual-process op sequence across all stands still growing
//! (any phase but `End`) and applying disturbance matrices only to the
//! subset whose transition rule fires this tick (spec.md §9 "batched
//! polymorphism over parameter buckets").
//!
//! `HistoricalDisturbance` and `LastPassDisturbance` are carried as
//! phase values (spec.md §3) but applied within the same tick as the
//! `AnnualProcess`/`GrowToFinalAge` rule that triggers them, rather than
//! as phases a stand dwells in across ticks — §4.3's numbered rules
//! describe the disturbance as an immediate action inside rule 2/4, not
//! a separate annual-process-skipping year. See `DESIGN.md`.

use crate::assembly::{build_biomass_turnover_op, build_disturbance_op, build_dom_decay_op, build_growth_op, build_overmature_decline_op, build_slow_mixing_op, GrowthSource};
use crate::error::CoreError;
use crate::kernel::{compute_pools, validate_pool_values, PoolMatrix};
use crate::params::{DecayParameters, DisturbanceMatrixAssociation, DisturbanceMatrixValue, TurnoverParameters};
use crate::pool_names::PoolIds;
use crate::state::StandState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinupPhase {
    AnnualProcess,
    HistoricalDisturbance,
    GrowToFinalAge,
    LastPassDisturbance,
    GrowToFinalAge2,
    Delay,
    End,
}

/// Per-stand spinup parameters (spec.md §4.3 "Parameters per stand").
#[derive(Debug, Clone)]
pub struct SpinupParameters {
    pub return_interval: u32,
    pub min_rotations: u32,
    pub max_rotations: u32,
    pub historical_disturbance_type: u32,
    pub last_pass_disturbance_type: u32,
    pub final_age: u32,
    pub delay: u32,
    pub mean_annual_temperature: f64,
    /// convergence tolerance τ, default 0.01 (spec.md §9 Open Questions).
    pub tolerance: f64,
}

impl Default for SpinupParameters {
    fn default() -> Self {
        Self {
            return_interval: 125,
            min_rotations: 10,
            max_rotations: 30,
            historical_disturbance_type: 1,
            last_pass_disturbance_type: 1,
            final_age: 0,
            delay: 0,
            mean_annual_temperature: 2.0,
            tolerance: 0.01,
        }
    }
}

/// Transient per-stand spinup state (spec.md §3 "Spinup state").
#[derive(Debug, Clone)]
pub struct SpinupState {
    pub age: u32,
    pub rotation: u32,
    pub last_rotation_slow: f64,
    pub phase: SpinupPhase,
    pub delay_remaining: u32,
    /// set false if `max_rotations` was reached without satisfying the
    /// convergence test (spec.md §7 "ConvergenceWarning").
    pub converged: bool,
}

impl Default for SpinupState {
    fn default() -> Self {
        Self { age: 0, rotation: 0, last_rotation_slow: 0.0, phase: SpinupPhase::AnnualProcess, delay_remaining: 0, converged: true }
    }
}

/// Parameter tables + pool-id bindings a spinup tick needs to assemble
/// the annual-process and disturbance ops.
pub struct SpinupInputs<'a> {
    pub pool_ids: &'a PoolIds,
    pub n_pools: usize,
    pub growth_source: GrowthSource<'a>,
    pub turnover: &'a [TurnoverParameters],
    pub decay_params: &'a [DecayParameters],
    pub slow_mixing_rate: f64,
    pub associations: &'a [DisturbanceMatrixAssociation],
    pub matrix_values: &'a [DisturbanceMatrixValue],
    pub mean_annual_temperature: std::collections::HashMap<u32, f64>,
}

fn apply_annual_process(stands: &[StandState], pools: &mut PoolMatrix, inputs: &SpinupInputs, mask: &[bool]) -> Result<(), CoreError> {
    let growth_op = build_growth_op("growth", stands, inputs.pool_ids, inputs.n_pools, &inputs.growth_source)?;
    compute_pools(std::slice::from_ref(&growth_op), pools, mask)?;

    let turnover_op = build_biomass_turnover_op("biomass_turnover", stands, inputs.pool_ids, inputs.n_pools, inputs.turnover)?;
    compute_pools(std::slice::from_ref(&turnover_op), pools, mask)?;

    let decline_op = build_overmature_decline_op("overmature_decline", stands, inputs.pool_ids, inputs.n_pools, pools, &inputs.growth_source)?;
    compute_pools(std::slice::from_ref(&decline_op), pools, mask)?;

    compute_pools(std::slice::from_ref(&growth_op), pools, mask)?;

    let decay_op = build_dom_decay_op("dom_decay", stands, inputs.pool_ids, inputs.n_pools, inputs.decay_params, &inputs.mean_annual_temperature)?;
    compute_pools(std::slice::from_ref(&decay_op), pools, mask)?;

    let slow_mixing_op = build_slow_mixing_op("slow_mixing", inputs.pool_ids, inputs.n_pools, stands.len(), inputs.slow_mixing_rate)?;
    compute_pools(std::slice::from_ref(&slow_mixing_op), pools, mask)?;

    Ok(())
}

/// Where a stand lands once its post-harvest delay countdown reaches zero:
/// back to growth if `final_age` hasn't been reached yet, otherwise done.
fn resolve_delay_exit(final_age: u32, age: u32) -> SpinupPhase {
    if final_age > 0 && age < final_age {
        SpinupPhase::GrowToFinalAge2
    } else {
        SpinupPhase::End
    }
}

fn apply_disturbance_subset(
    stands: &[StandState],
    pools: &mut PoolMatrix,
    inputs: &SpinupInputs,
    mask: &[bool],
    disturbance_type_of: impl Fn(usize) -> u32,
) -> Result<(), CoreError> {
    let spatial_units: Vec<u32> = stands.iter().map(|s| s.spatial_unit).collect();
    let land_classes: Vec<u32> = stands.iter().map(|s| s.land_class).collect();
    let disturbance_types: Vec<u32> = (0..stands.len())
        .map(|i| if mask[i] { disturbance_type_of(i) } else { 0 })
        .collect();

    let op = build_disturbance_op("historical_or_last_pass_disturbance", &spatial_units, &land_classes, &disturbance_types, inputs.n_pools, inputs.associations, inputs.matrix_values)?;
    compute_pools(std::slice::from_ref(&op), pools, mask)
}

/// Advance every stand in `spinup` by one year. `stands[i].age` is kept
/// in sync with `spinup[i].age` so the same stand record can feed
/// directly into the step machine once spinup ends.
pub fn run_spinup_tick(
    stands: &mut [StandState],
    params: &[SpinupParameters],
    spinup: &mut [SpinupState],
    pools: &mut PoolMatrix,
    inputs: &SpinupInputs,
) -> Result<(), CoreError> {
    let n = stands.len();

    // A stand already sitting in `Delay` resolves its countdown before the
    // growing mask is taken: otherwise a stand whose delay expires to `End`
    // this tick would still take one more annual-process increment for a
    // phase it no longer occupies.
    for i in 0..n {
        if spinup[i].phase == SpinupPhase::Delay {
            if spinup[i].delay_remaining > 0 {
                spinup[i].delay_remaining -= 1;
            }
            if spinup[i].delay_remaining == 0 {
                spinup[i].phase = resolve_delay_exit(params[i].final_age, spinup[i].age);
            }
        }
    }

    let growing: Vec<bool> = spinup.iter().map(|s| s.phase != SpinupPhase::End).collect();

    if growing.iter().any(|&g| g) {
        apply_annual_process(stands, pools, inputs, &growing)?;
        for i in 0..n {
            if growing[i] {
                stands[i].age += 1;
                spinup[i].age += 1;
            }
        }
    }

    let mut historical_mask = vec![false; n];
    let mut last_pass_mask = vec![false; n];

    for i in 0..n {
        match spinup[i].phase {
            SpinupPhase::AnnualProcess => {
                if spinup[i].age >= params[i].return_interval && spinup[i].rotation < params[i].max_rotations {
                    let slow_current = pools.row(i)[inputs.pool_ids.above_ground_slow_soil] + pools.row(i)[inputs.pool_ids.below_ground_slow_soil];
                    let converged = spinup[i].rotation >= params[i].min_rotations
                        && (slow_current - spinup[i].last_rotation_slow).abs() / slow_current.max(f64::EPSILON) < params[i].tolerance;

                    if converged {
                        spinup[i].converged = true;
                        spinup[i].phase = SpinupPhase::GrowToFinalAge;
                    } else {
                        historical_mask[i] = true;
                        spinup[i].last_rotation_slow = slow_current;
                        spinup[i].age = 0;
                        stands[i].age = 0;
                        spinup[i].rotation += 1;
                        if spinup[i].rotation >= params[i].max_rotations {
                            spinup[i].converged = false;
                            spinup[i].phase = SpinupPhase::GrowToFinalAge;
                        }
                    }
                }
            }
            SpinupPhase::GrowToFinalAge => {
                if spinup[i].age >= params[i].final_age.saturating_sub(1) {
                    last_pass_mask[i] = true;
                    spinup[i].age = 0;
                    stands[i].age = 0;
                    spinup[i].delay_remaining = params[i].delay;
                    // A zero delay resolves immediately rather than
                    // spending a tick in `Delay` only to fall out of it
                    // again next tick.
                    spinup[i].phase = if spinup[i].delay_remaining == 0 {
                        resolve_delay_exit(params[i].final_age, spinup[i].age)
                    } else {
                        SpinupPhase::Delay
                    };
                }
            }
            SpinupPhase::GrowToFinalAge2 => {
                if spinup[i].age >= params[i].final_age {
                    spinup[i].phase = SpinupPhase::End;
                }
            }
            // the countdown is resolved before the growing mask, above.
            SpinupPhase::Delay => {}
            SpinupPhase::End | SpinupPhase::HistoricalDisturbance | SpinupPhase::LastPassDisturbance => {}
        }
    }

    if historical_mask.iter().any(|&m| m) {
        apply_disturbance_subset(stands, pools, inputs, &historical_mask, |i| params[i].historical_disturbance_type)?;
    }
    if last_pass_mask.iter().any(|&m| m) {
        apply_disturbance_subset(stands, pools, inputs, &last_pass_mask, |i| params[i].last_pass_disturbance_type)?;
    }

    validate_pool_values(pools)?;

    Ok(())
}

/// Run spinup to completion for every stand (bounded by each stand's own
/// `max_rotations` + `final_age` + `delay`, so this always terminates).
pub fn run_spinup_to_end(
    stands: &mut [StandState],
    params: &[SpinupParameters],
    spinup: &mut [SpinupState],
    pools: &mut PoolMatrix,
    inputs: &SpinupInputs,
) -> Result<(), CoreError> {
    loop {
        if spinup.iter().all(|s| s.phase == SpinupPhase::End) {
            return Ok(());
        }
        run_spinup_tick(stands, params, spinup, pools, inputs)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GrowthCurve, LookupTable};
    use crate::pools::{PoolDefinition, PoolSet};

    fn pool_set() -> PoolSet {
        PoolSet::new(
            crate::pool_names::DEFAULT_ORDER
                .iter()
                .enumerate()
                .map(|(id, n)| PoolDefinition { name: n.to_string(), id })
                .collect(),
        )
        .unwrap()
    }

    fn stand() -> StandState {
        StandState {
            age: 0,
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

    fn curve() -> GrowthCurve {
        GrowthCurve { id: 1, species: 1, classifiers: vec![Some(17)], volume_at_age: LookupTable::new("c", vec![0.0, 50.0, 100.0], vec![0.0, 100.0, 150.0]) }
    }

    #[test]
    fn spinup_terminates_and_reaches_final_age() {
        let ps = pool_set();
        let ids = PoolIds::resolve(&ps).unwrap();
        let associations = vec![
            DisturbanceMatrixAssociation { spatial_unit: 17, disturbance_type: 1, land_class: None, matrix_id: 1 },
        ];
        let values = vec![
            DisturbanceMatrixValue { matrix_id: 1, source_pool: ids.merch, sink_pool: ids.co2, proportion: 0.5 },
        ];
        let mut temps = std::collections::HashMap::new();
        temps.insert(17, 2.0);

        let inputs = SpinupInputs {
            pool_ids: &ids,
            n_pools: ps.len(),
            growth_source: GrowthSource::VolumeDriven {
                curves: &[curve()],
                conversions: &[crate::params::BiomassConversionParameters { species: 1, specific_gravity: 0.4, bark_fraction: 0.1, foliage_fraction: 0.05, other_wood_fraction: 0.15 }],
                roots: &[crate::params::RootParameters { species: 1, coarse_root_fraction: 0.2, fine_root_fraction: 0.05, coarse_root_turnover_rate: 0.02, fine_root_turnover_rate: 0.5 }],
            },
            turnover: &[],
            decay_params: &[],
            slow_mixing_rate: 0.01,
            associations: &associations,
            matrix_values: &values,
            mean_annual_temperature: temps,
        };

        let mut stands = vec![stand()];
        let params = vec![SpinupParameters { return_interval: 5, min_rotations: 2, max_rotations: 3, final_age: 10, delay: 0, ..Default::default() }];
        let mut spinup = vec![SpinupState::default()];
        let mut pools = PoolMatrix::zeros(1, ps.len());
        pools.row_mut(0)[ids.input] = 1.0;

        let mut ticks = 0;
        while spinup[0].phase != SpinupPhase::End {
            run_spinup_tick(&mut stands, &params, &mut spinup, &mut pools, &inputs).unwrap();
            ticks += 1;
            assert!(ticks < 1000, "spinup did not terminate");
        }

        assert_eq!(stands[0].age, 10);
    }

    #[test]
    fn final_age_zero_with_zero_delay_ends_at_age_zero() {
        let ps = pool_set();
        let ids = PoolIds::resolve(&ps).unwrap();
        let associations = vec![
            DisturbanceMatrixAssociation { spatial_unit: 17, disturbance_type: 1, land_class: None, matrix_id: 1 },
        ];
        let values = vec![
            DisturbanceMatrixValue { matrix_id: 1, source_pool: ids.merch, sink_pool: ids.co2, proportion: 0.5 },
        ];
        let mut temps = std::collections::HashMap::new();
        temps.insert(17, 2.0);

        let inputs = SpinupInputs {
            pool_ids: &ids,
            n_pools: ps.len(),
            growth_source: GrowthSource::VolumeDriven {
                curves: &[curve()],
                conversions: &[crate::params::BiomassConversionParameters { species: 1, specific_gravity: 0.4, bark_fraction: 0.1, foliage_fraction: 0.05, other_wood_fraction: 0.15 }],
                roots: &[crate::params::RootParameters { species: 1, coarse_root_fraction: 0.2, fine_root_fraction: 0.05, coarse_root_turnover_rate: 0.02, fine_root_turnover_rate: 0.5 }],
            },
            turnover: &[],
            decay_params: &[],
            slow_mixing_rate: 0.01,
            associations: &associations,
            matrix_values: &values,
            mean_annual_temperature: temps,
        };

        let mut stands = vec![stand()];
        let params = vec![SpinupParameters { return_interval: 5, min_rotations: 2, max_rotations: 3, final_age: 0, delay: 0, ..Default::default() }];
        let mut spinup = vec![SpinupState::default()];
        let mut pools = PoolMatrix::zeros(1, ps.len());
        pools.row_mut(0)[ids.input] = 1.0;

        let mut ticks = 0;
        while spinup[0].phase != SpinupPhase::End {
            run_spinup_tick(&mut stands, &params, &mut spinup, &mut pools, &inputs).unwrap();
            ticks += 1;
            assert!(ticks < 1000, "spinup did not terminate");
        }

        // a zero delay at a zero final age must not leave a spare
        // annual-process tick's worth of age on the stand.
        assert_eq!(stands[0].age, 0);
    }
}
