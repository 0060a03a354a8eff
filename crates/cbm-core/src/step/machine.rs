//! Annual step state machine (spec.md §4.4, component C4).

use std::collections::HashMap;

use crate::assembly::{build_biomass_turnover_op, build_disturbance_op, build_dom_decay_op, build_growth_op, build_overmature_decline_op, build_slow_mixing_op, GrowthSource};
use crate::error::CoreError;
use crate::kernel::{compute_flux, validate_pool_values, PoolMatrix};
use crate::params::{DecayParameters, DisturbanceMatrixAssociation, DisturbanceMatrixValue, TurnoverParameters};
use crate::pool_names::PoolIds;
use crate::pools::FluxIndicatorSet;
use crate::state::StandState;
use crate::step::transitions::LandClassTransitionTable;

/// Per-stand, per-step caller-supplied parameters (spec.md §6
/// "parameters[N, ...] with at least {disturbance_type,
/// mean_annual_temperature, ...}").
#[derive(Debug, Clone)]
pub struct StepParameters {
    pub disturbance_type: Vec<u32>,
    /// overrides `StepInputs::mean_annual_temperature` for this step only,
    /// keyed by spatial unit (spec.md §3 "overridable per step").
    pub mean_annual_temperature_override: HashMap<u32, f64>,
}

pub struct StepInputs<'a> {
    pub pool_ids: &'a PoolIds,
    pub n_pools: usize,
    pub growth_source: GrowthSource<'a>,
    pub turnover: &'a [TurnoverParameters],
    pub decay_params: &'a [DecayParameters],
    pub slow_mixing_rate: f64,
    pub associations: &'a [DisturbanceMatrixAssociation],
    pub matrix_values: &'a [DisturbanceMatrixValue],
    pub mean_annual_temperature: HashMap<u32, f64>,
}

/// Run one annual step over every stand (spec.md §4.4).
///
/// `flux` is zeroed at the start of the step (`step_start`) and
/// accumulates this step's contributions only.
pub fn run_step(
    stands: &mut [StandState],
    step_params: &StepParameters,
    pools: &mut PoolMatrix,
    flux: &mut PoolMatrix,
    flux_indicators: &FluxIndicatorSet,
    land_class_transitions: &LandClassTransitionTable,
    inputs: &StepInputs,
) -> Result<(), CoreError> {
    // step_start
    flux.zero_all();

    let enabled: Vec<bool> = stands.iter().map(|s| s.enabled).collect();
    let growth_enabled: Vec<bool> = stands.iter().map(|s| s.enabled && s.growth_enabled).collect();

    // step_disturbance
    let spatial_units: Vec<u32> = stands.iter().map(|s| s.spatial_unit).collect();
    let land_classes: Vec<u32> = stands.iter().map(|s| s.land_class).collect();
    let disturbance_op = build_disturbance_op(
        "disturbance",
        &spatial_units,
        &land_classes,
        &step_params.disturbance_type,
        inputs.n_pools,
        inputs.associations,
        inputs.matrix_values,
    )?;
    compute_flux(std::slice::from_ref(&disturbance_op), flux_indicators.definitions(), pools, flux, &enabled)?;

    let mut disturbed = vec![false; stands.len()];
    for (i, stand) in stands.iter_mut().enumerate() {
        if enabled[i] && step_params.disturbance_type[i] != 0 {
            stand.last_disturbance_type = step_params.disturbance_type[i];
            disturbed[i] = true;
        }
    }

    // step_annual_process
    let mut temperature = inputs.mean_annual_temperature.clone();
    temperature.extend(step_params.mean_annual_temperature_override.iter().map(|(&k, &v)| (k, v)));

    let growth_op = build_growth_op("growth", stands, inputs.pool_ids, inputs.n_pools, &inputs.growth_source)?;
    compute_flux(std::slice::from_ref(&growth_op), flux_indicators.definitions(), pools, flux, &growth_enabled)?;

    let turnover_op = build_biomass_turnover_op("biomass_turnover", stands, inputs.pool_ids, inputs.n_pools, inputs.turnover)?;
    compute_flux(std::slice::from_ref(&turnover_op), flux_indicators.definitions(), pools, flux, &enabled)?;

    let decline_op = build_overmature_decline_op("overmature_decline", stands, inputs.pool_ids, inputs.n_pools, pools, &inputs.growth_source)?;
    compute_flux(std::slice::from_ref(&decline_op), flux_indicators.definitions(), pools, flux, &growth_enabled)?;

    compute_flux(std::slice::from_ref(&growth_op), flux_indicators.definitions(), pools, flux, &growth_enabled)?;

    let decay_op = build_dom_decay_op("dom_decay", stands, inputs.pool_ids, inputs.n_pools, inputs.decay_params, &temperature)?;
    compute_flux(std::slice::from_ref(&decay_op), flux_indicators.definitions(), pools, flux, &enabled)?;

    let slow_mixing_op = build_slow_mixing_op("slow_mixing", inputs.pool_ids, inputs.n_pools, stands.len(), inputs.slow_mixing_rate)?;
    compute_flux(std::slice::from_ref(&slow_mixing_op), flux_indicators.definitions(), pools, flux, &enabled)?;

    // step_end
    for (i, stand) in stands.iter_mut().enumerate() {
        if !enabled[i] {
            continue;
        }
        if disturbed[i] {
            stand.age = 0;
            stand.time_since_last_disturbance = 0;
        } else {
            stand.age += 1;
            stand.time_since_last_disturbance += 1;
        }

        if stand.regeneration_delay > 0 {
            stand.regeneration_delay -= 1;
        }

        if disturbed[i] {
            match land_class_transitions.resolve(stand.land_class, stand.last_disturbance_type) {
                Some((new_land_class, regen_delay)) => {
                    if new_land_class != stand.land_class {
                        stand.land_class = new_land_class;
                        stand.time_since_land_class_change = 0;
                    } else {
                        stand.time_since_land_class_change += 1;
                    }
                    stand.regeneration_delay = regen_delay;
                }
                None => stand.time_since_land_class_change += 1,
            }
        } else {
            stand.time_since_land_class_change += 1;
        }

        stand.enforce_regeneration_delay_invariant();
    }

    validate_pool_values(pools)?;

    Ok(())
}
