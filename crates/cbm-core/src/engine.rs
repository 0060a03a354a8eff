//! Top-level engine: binds a fixed pool/flux vocabulary and parameter
//! tables to the spinup/step drivers, in either of the two growth
//! variants (spec.md §9 "Two engine variants").

use std::collections::HashMap;

use crate::assembly::GrowthSource;
use crate::error::{ConfigurationError, CoreError};
use crate::kernel::PoolMatrix;
use crate::params::{
    BiomassConversionParameters, DecayParameters, DisturbanceMatrixAssociation,
    DisturbanceMatrixValue, GrowthCurve, RootParameters, TurnoverParameters,
};
use crate::pool_names::PoolIds;
use crate::pools::{FluxIndicatorDefinition, FluxIndicatorSet, PoolSet};
use crate::spinup::{run_spinup_tick, run_spinup_to_end, SpinupInputs, SpinupParameters, SpinupState};
use crate::state::StandState;
use crate::step::{run_step, LandClassTransitionTable, StepInputs, StepParameters};

/// Which of the two engine variants this `Engine` runs growth ops under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthModel {
    /// growth ops are assembled from merchantable-volume curves through a
    /// species-specific biomass conversion.
    VolumeDriven,
    /// the caller supplies net above-ground increments per stand per step
    /// directly.
    IncrementDriven,
}

/// Per-stand merchantable increments for the `IncrementDriven` variant
/// (spec.md §6 "merch_inc, foliage_inc, other_inc"). Indexed in parallel
/// with the `stands` slice passed to `run_spinup_tick`/`run_step`.
pub struct GrowthIncrements<'a> {
    pub merch_inc: &'a [f64],
    pub foliage_inc: &'a [f64],
    pub other_inc: &'a [f64],
}

/// Everything needed to construct an `Engine`: the fixed pool/flux
/// vocabulary plus every parameter table a tick's op assembly draws from
/// (spec.md §6 "Engine initialization").
pub struct EngineConfig {
    pub pools: PoolSet,
    pub flux_indicators: Vec<FluxIndicatorDefinition>,
    pub growth_model: GrowthModel,
    pub curves: Vec<GrowthCurve>,
    pub conversions: Vec<BiomassConversionParameters>,
    pub roots: Vec<RootParameters>,
    pub turnover: Vec<TurnoverParameters>,
    pub decay_params: Vec<DecayParameters>,
    pub slow_mixing_rate: f64,
    pub associations: Vec<DisturbanceMatrixAssociation>,
    pub matrix_values: Vec<DisturbanceMatrixValue>,
    pub land_class_transitions: Vec<(u32, u32, u32, u32)>,
    pub mean_annual_temperature: HashMap<u32, f64>,
}

/// A bound engine instance: fixed pool/flux vocabulary, resolved
/// `PoolIds`, and every parameter table the spinup and step drivers need
/// to assemble a tick's ops.
pub struct Engine {
    pools: PoolSet,
    pool_ids: PoolIds,
    flux_indicators: FluxIndicatorSet,
    growth_model: GrowthModel,
    curves: Vec<GrowthCurve>,
    conversions: Vec<BiomassConversionParameters>,
    roots: Vec<RootParameters>,
    turnover: Vec<TurnoverParameters>,
    decay_params: Vec<DecayParameters>,
    slow_mixing_rate: f64,
    associations: Vec<DisturbanceMatrixAssociation>,
    matrix_values: Vec<DisturbanceMatrixValue>,
    land_class_transitions: LandClassTransitionTable,
    mean_annual_temperature: HashMap<u32, f64>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        let pool_ids = PoolIds::resolve(&config.pools)?;
        let flux_indicators = FluxIndicatorSet::new(config.flux_indicators, &config.pools)?;
        let land_class_transitions = LandClassTransitionTable::new(config.land_class_transitions)
            .map_err(CoreError::Configuration)?;

        tracing::info!(
            n_pools = config.pools.len(),
            n_flux_indicators = flux_indicators.len(),
            n_growth_curves = config.curves.len(),
            n_disturbance_associations = config.associations.len(),
            growth_model = ?config.growth_model,
            "engine initialized"
        );

        Ok(Self {
            pools: config.pools,
            pool_ids,
            flux_indicators,
            growth_model: config.growth_model,
            curves: config.curves,
            conversions: config.conversions,
            roots: config.roots,
            turnover: config.turnover,
            decay_params: config.decay_params,
            slow_mixing_rate: config.slow_mixing_rate,
            associations: config.associations,
            matrix_values: config.matrix_values,
            land_class_transitions,
            mean_annual_temperature: config.mean_annual_temperature,
        })
    }

    pub fn pools(&self) -> &PoolSet {
        &self.pools
    }

    pub fn pool_ids(&self) -> &PoolIds {
        &self.pool_ids
    }

    pub fn n_pools(&self) -> usize {
        self.pools.len()
    }

    pub fn flux_indicators(&self) -> &FluxIndicatorSet {
        &self.flux_indicators
    }

    fn growth_source<'a>(&'a self, increments: Option<&'a GrowthIncrements<'a>>) -> Result<GrowthSource<'a>, CoreError> {
        match (self.growth_model, increments) {
            (GrowthModel::VolumeDriven, _) => Ok(GrowthSource::VolumeDriven {
                curves: &self.curves,
                conversions: &self.conversions,
                roots: &self.roots,
            }),
            (GrowthModel::IncrementDriven, Some(inc)) => Ok(GrowthSource::IncrementDriven {
                roots: &self.roots,
                merch_inc: inc.merch_inc,
                foliage_inc: inc.foliage_inc,
                other_inc: inc.other_inc,
            }),
            (GrowthModel::IncrementDriven, None) => Err(CoreError::Configuration(
                ConfigurationError::MissingParameterRow {
                    table: "growth_increments".into(),
                    key: "<this tick>".into(),
                },
            )),
        }
    }

    fn temperature_for(&self, overrides: &HashMap<u32, f64>) -> HashMap<u32, f64> {
        let mut temperature = self.mean_annual_temperature.clone();
        temperature.extend(overrides.iter().map(|(&k, &v)| (k, v)));
        temperature
    }

    /// Advance every stand in `spinup` by one year (spec.md §4.3).
    pub fn run_spinup_tick(
        &self,
        stands: &mut [StandState],
        params: &[SpinupParameters],
        spinup: &mut [SpinupState],
        pools: &mut PoolMatrix,
        increments: Option<&GrowthIncrements>,
    ) -> Result<(), CoreError> {
        let inputs = SpinupInputs {
            pool_ids: &self.pool_ids,
            n_pools: self.n_pools(),
            growth_source: self.growth_source(increments)?,
            turnover: &self.turnover,
            decay_params: &self.decay_params,
            slow_mixing_rate: self.slow_mixing_rate,
            associations: &self.associations,
            matrix_values: &self.matrix_values,
            mean_annual_temperature: self.mean_annual_temperature.clone(),
        };
        run_spinup_tick(stands, params, spinup, pools, &inputs)
    }

    /// Run spinup to completion for every stand, then log a summary of
    /// rotation counts and any non-convergence (spec.md §7
    /// `ConvergenceWarning`).
    pub fn run_spinup_to_end(
        &self,
        stands: &mut [StandState],
        params: &[SpinupParameters],
        spinup: &mut [SpinupState],
        pools: &mut PoolMatrix,
        increments: Option<&GrowthIncrements>,
    ) -> Result<(), CoreError> {
        let inputs = SpinupInputs {
            pool_ids: &self.pool_ids,
            n_pools: self.n_pools(),
            growth_source: self.growth_source(increments)?,
            turnover: &self.turnover,
            decay_params: &self.decay_params,
            slow_mixing_rate: self.slow_mixing_rate,
            associations: &self.associations,
            matrix_values: &self.matrix_values,
            mean_annual_temperature: self.mean_annual_temperature.clone(),
        };
        run_spinup_to_end(stands, params, spinup, pools, &inputs)?;

        let non_converged = spinup.iter().filter(|s| !s.converged).count();
        let max_rotation = spinup.iter().map(|s| s.rotation).max().unwrap_or(0);
        tracing::debug!(n_stands = stands.len(), max_rotation, non_converged, "spinup batch complete");
        if non_converged > 0 {
            tracing::warn!(non_converged, "spinup reached max_rotations without converging for some stands");
        }

        Ok(())
    }

    /// Run one annual step over every stand (spec.md §4.4).
    pub fn run_step(
        &self,
        stands: &mut [StandState],
        step_params: &StepParameters,
        pools: &mut PoolMatrix,
        flux: &mut PoolMatrix,
        increments: Option<&GrowthIncrements>,
    ) -> Result<(), CoreError> {
        let inputs = StepInputs {
            pool_ids: &self.pool_ids,
            n_pools: self.n_pools(),
            growth_source: self.growth_source(increments)?,
            turnover: &self.turnover,
            decay_params: &self.decay_params,
            slow_mixing_rate: self.slow_mixing_rate,
            associations: &self.associations,
            matrix_values: &self.matrix_values,
            mean_annual_temperature: self.temperature_for(&step_params.mean_annual_temperature_override),
        };
        let result = run_step(stands, step_params, pools, flux, &self.flux_indicators, &self.land_class_transitions, &inputs);
        if let Err(ref e) = result {
            tracing::error!(error = %e, "step failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LookupTable;
    use crate::pools::PoolDefinition;

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

    fn config(growth_model: GrowthModel) -> EngineConfig {
        EngineConfig {
            pools: pool_set(),
            flux_indicators: vec![],
            growth_model,
            curves: vec![GrowthCurve {
                id: 1,
                species: 1,
                classifiers: vec![Some(17)],
                volume_at_age: LookupTable::new("c", vec![0.0, 50.0, 100.0], vec![0.0, 100.0, 150.0]),
            }],
            conversions: vec![BiomassConversionParameters { species: 1, specific_gravity: 0.4, bark_fraction: 0.1, foliage_fraction: 0.05, other_wood_fraction: 0.15 }],
            roots: vec![RootParameters { species: 1, coarse_root_fraction: 0.2, fine_root_fraction: 0.05, coarse_root_turnover_rate: 0.02, fine_root_turnover_rate: 0.5 }],
            turnover: vec![],
            decay_params: vec![],
            slow_mixing_rate: 0.01,
            associations: vec![],
            matrix_values: vec![],
            land_class_transitions: vec![],
            mean_annual_temperature: HashMap::from([(17, 2.0)]),
        }
    }

    fn stand() -> StandState {
        StandState {
            age: 10,
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
    fn volume_driven_step_runs_end_to_end() {
        let engine = Engine::new(config(GrowthModel::VolumeDriven)).unwrap();
        let mut stands = vec![stand()];
        let mut pools = PoolMatrix::zeros(1, engine.n_pools());
        pools.row_mut(0)[engine.pool_ids().input] = 1.0;
        let mut flux = PoolMatrix::zeros(1, engine.flux_indicators().len());
        let step_params = StepParameters { disturbance_type: vec![0], mean_annual_temperature_override: HashMap::new() };

        engine.run_step(&mut stands, &step_params, &mut pools, &mut flux, None).unwrap();

        assert_eq!(stands[0].age, 11);
        assert!(pools.row(0)[engine.pool_ids().merch] > 0.0);
    }

    #[test]
    fn increment_driven_step_requires_increments() {
        let engine = Engine::new(config(GrowthModel::IncrementDriven)).unwrap();
        let mut stands = vec![stand()];
        let mut pools = PoolMatrix::zeros(1, engine.n_pools());
        let mut flux = PoolMatrix::zeros(1, engine.flux_indicators().len());
        let step_params = StepParameters { disturbance_type: vec![0], mean_annual_temperature_override: HashMap::new() };

        let err = engine.run_step(&mut stands, &step_params, &mut pools, &mut flux, None).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(ConfigurationError::MissingParameterRow { .. })));
    }

    #[test]
    fn increment_driven_step_adds_supplied_merch_increment() {
        let engine = Engine::new(config(GrowthModel::IncrementDriven)).unwrap();
        let mut stands = vec![stand()];
        let mut pools = PoolMatrix::zeros(1, engine.n_pools());
        let mut flux = PoolMatrix::zeros(1, engine.flux_indicators().len());
        let step_params = StepParameters { disturbance_type: vec![0], mean_annual_temperature_override: HashMap::new() };
        let increments = GrowthIncrements { merch_inc: &[5.0], foliage_inc: &[0.0], other_inc: &[0.0] };

        engine.run_step(&mut stands, &step_params, &mut pools, &mut flux, Some(&increments)).unwrap();

        assert!((pools.row(0)[engine.pool_ids().merch] - 5.0).abs() < 1e-9);
    }
}
