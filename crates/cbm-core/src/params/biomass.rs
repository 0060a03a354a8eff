//! Merchantable-volume to biomass conversion (spec.md §9 "two engine
//! variants" — the volume-to-biomass-driven one).
//!
//! spec.md §1 names "the volume-to-biomass conversion parameter tables
//! and the default-parameter database" an explicit non-goal — the full
//! CBM-CFS3 default-parameter database (per-species, per-region
//! calibrated equations) is out of scope. What remains in scope is the
//! conversion *mechanism* growth assembly needs: a small, caller-supplied
//! set of conversion factors per species, in the spirit of the teacher's
//! own constant-driven simplified sector equations
//! (`model/sectors/capital.rs`'s `ICOR_1970`-style named constants)
//! rather than a calibrated lookup database.

use serde::{Deserialize, Serialize};

use crate::params::tables::RootParameters;

/// Above-ground biomass split, per species, from merchantable stemwood
/// volume. Simplified relative to CBM-CFS3's full default-parameter
/// database: one conversion per species rather than per
/// species-by-region-by-ecozone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BiomassConversionParameters {
    pub species: u32,
    /// oven-dry mass per unit merchantable volume (t C / m^3).
    pub specific_gravity: f64,
    /// fraction of stemwood volume-derived mass attributed to bark,
    /// folded into the merchantable pool rather than split out.
    pub bark_fraction: f64,
    /// foliage biomass as a fraction of stemwood biomass.
    pub foliage_fraction: f64,
    /// other-wood (branches) biomass as a fraction of stemwood biomass.
    pub other_wood_fraction: f64,
}

/// Target standing biomass by pool at a given age, before converting to
/// an increment (spec.md §4.2 op 1 "growth").
#[derive(Debug, Clone, Copy, Default)]
pub struct BiomassTargets {
    pub merch: f64,
    pub foliage: f64,
    pub other_wood: f64,
    pub coarse_root: f64,
    pub fine_root: f64,
}

impl BiomassTargets {
    pub fn total(&self) -> f64 {
        self.merch + self.foliage + self.other_wood + self.coarse_root + self.fine_root
    }
}

/// Convert a merchantable volume (m^3/ha) to target standing biomass by
/// pool, via stemwood mass then species-specific fractions for
/// foliage/other-wood/roots.
pub fn volume_to_biomass(
    volume: f64,
    conversion: &BiomassConversionParameters,
    roots: &RootParameters,
) -> BiomassTargets {
    let stemwood = volume * conversion.specific_gravity * (1.0 + conversion.bark_fraction);
    let foliage = stemwood * conversion.foliage_fraction;
    let other_wood = stemwood * conversion.other_wood_fraction;
    let above_ground = stemwood + foliage + other_wood;
    let coarse_root = above_ground * roots.coarse_root_fraction;
    let fine_root = above_ground * roots.fine_root_fraction;

    BiomassTargets { merch: stemwood, foliage, other_wood, coarse_root, fine_root }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv() -> BiomassConversionParameters {
        BiomassConversionParameters {
            species: 1,
            specific_gravity: 0.4,
            bark_fraction: 0.1,
            foliage_fraction: 0.05,
            other_wood_fraction: 0.15,
        }
    }

    fn roots() -> RootParameters {
        RootParameters {
            species: 1,
            coarse_root_fraction: 0.2,
            fine_root_fraction: 0.05,
            coarse_root_turnover_rate: 0.02,
            fine_root_turnover_rate: 0.5,
        }
    }

    #[test]
    fn zero_volume_yields_zero_biomass() {
        let targets = volume_to_biomass(0.0, &conv(), &roots());
        assert_eq!(targets.total(), 0.0);
    }

    #[test]
    fn positive_volume_splits_across_pools() {
        let targets = volume_to_biomass(100.0, &conv(), &roots());
        assert!(targets.merch > 0.0);
        assert!(targets.foliage > 0.0);
        assert!(targets.other_wood > 0.0);
        assert!(targets.coarse_root > 0.0);
        assert!(targets.fine_root > 0.0);
    }
}
