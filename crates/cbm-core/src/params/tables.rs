//! Read-only parameter tables loaded once at engine construction
//! (spec.md §3 "Parameter tables", §6 "Parameter bundle").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::params::lookup::LookupTable;
use crate::pools::PoolId;

/// Decay rate for one DOM pool: `r = min(max_rate, base_rate * Q10^((T -
/// reference_temperature) / 10))` (spec.md §4.2 op 4 "dom_decay").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecayParameters {
    pub pool: PoolId,
    pub base_rate: f64,
    pub reference_temperature: f64,
    pub q10: f64,
    pub proportion_to_atmosphere: f64,
    pub max_rate: f64,
}

impl DecayParameters {
    pub fn rate_at(&self, mean_annual_temperature: f64) -> f64 {
        let exponent = (mean_annual_temperature - self.reference_temperature) / 10.0;
        (self.base_rate * self.q10.powf(exponent)).min(self.max_rate)
    }
}

/// Per (spatial_unit, species) annual turnover fractions from live
/// biomass pools to DOM pools (spec.md §3 "Turnover parameters").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnoverParameters {
    pub spatial_unit: u32,
    pub species: u32,
    /// fraction of each biomass pool turned over per year, keyed by pool.
    pub biomass_turnover_rate: HashMap<PoolId, f64>,
    /// stem-snag / branch-snag half-life, converted to an annual rate.
    pub stem_snag_half_life: f64,
    pub branch_snag_half_life: f64,
}

/// Convert a half-life (years) to an equivalent annual decay fraction:
/// `rate = 1 - 2^(-1/half_life)`.
pub fn half_life_to_rate(half_life: f64) -> f64 {
    1.0 - 2f64.powf(-1.0 / half_life)
}

/// Per-species biomass→root split and root turnover (spec.md §3 "Root
/// parameters").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RootParameters {
    pub species: u32,
    pub coarse_root_fraction: f64,
    pub fine_root_fraction: f64,
    pub coarse_root_turnover_rate: f64,
    pub fine_root_turnover_rate: f64,
}

/// One (source, sink, proportion) flow entry of a disturbance matrix
/// (spec.md §6 "Disturbance-matrix file format").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisturbanceMatrixValue {
    pub matrix_id: u32,
    pub source_pool: PoolId,
    pub sink_pool: PoolId,
    pub proportion: f64,
}

/// `(spatial_unit, disturbance_type, optional land_class) -> matrix_id`
/// (spec.md §6 "Associations table").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DisturbanceMatrixAssociation {
    pub spatial_unit: u32,
    pub disturbance_type: u32,
    pub land_class: Option<u32>,
    pub matrix_id: u32,
}

/// A growth curve keyed by classifier set + species: age → merchantable
/// volume (spec.md §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthCurve {
    pub id: u32,
    pub species: u32,
    /// classifier values in declared column order; `None` is the `?`
    /// wildcard (spec.md §4.5 "longest-match semantics").
    pub classifiers: Vec<Option<u32>>,
    pub volume_at_age: LookupTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_rate_is_capped_by_max_rate() {
        let d = DecayParameters {
            pool: 0,
            base_rate: 0.1,
            reference_temperature: 10.0,
            q10: 2.0,
            proportion_to_atmosphere: 0.5,
            max_rate: 0.15,
        };
        assert_eq!(d.rate_at(40.0), 0.15);
        assert!(d.rate_at(10.0) < 0.15);
    }

    #[test]
    fn half_life_roundtrips_to_rate() {
        let r = half_life_to_rate(10.0);
        let remaining_after_10y = (1.0 - r).powi(10);
        assert!((remaining_after_10y - 0.5).abs() < 1e-6);
    }
}
