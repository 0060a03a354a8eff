//! Canonical pool names for the simplified single-species-class pool set
//! used by assembly (spec.md §3 "Pool" — one set of biomass pools per
//! species class, rather than a separate softwood/hardwood split, which
//! this implementation collapses to a single class; see `DESIGN.md`).
//!
//! These are conventions assembly relies on to find its input pools by
//! name in whatever `PoolSet` the caller constructed — not a fixed
//! enum, since `PoolSet` itself is caller-defined (spec.md §6 "Engine
//! initialization accepts: Pool list").

use crate::error::ConfigurationError;
use crate::pools::{PoolId, PoolSet};

pub const INPUT: &str = crate::pools::INPUT_POOL_NAME;

pub const MERCH: &str = "Merch";
pub const FOLIAGE: &str = "Foliage";
pub const OTHER_WOOD: &str = "OtherWood";
pub const COARSE_ROOT: &str = "CoarseRoot";
pub const FINE_ROOT: &str = "FineRoot";

pub const ABOVE_GROUND_VERY_FAST_SOIL: &str = "AboveGroundVeryFastSoil";
pub const BELOW_GROUND_VERY_FAST_SOIL: &str = "BelowGroundVeryFastSoil";
pub const ABOVE_GROUND_FAST_SOIL: &str = "AboveGroundFastSoil";
pub const BELOW_GROUND_FAST_SOIL: &str = "BelowGroundFastSoil";
pub const MEDIUM_SOIL: &str = "MediumSoil";
pub const ABOVE_GROUND_SLOW_SOIL: &str = "AboveGroundSlowSoil";
pub const BELOW_GROUND_SLOW_SOIL: &str = "BelowGroundSlowSoil";
pub const STEM_SNAG: &str = "StemSnag";
pub const BRANCH_SNAG: &str = "BranchSnag";

pub const CO2: &str = "CO2";
pub const CH4: &str = "CH4";
pub const CO: &str = "CO";
pub const NO2: &str = "NO2";
pub const PRODUCTS: &str = "Products";

/// Pool ids resolved once against a concrete `PoolSet`, so assembly
/// never repeats `pool_set.id_of(name)` string lookups in the hot path.
#[derive(Debug, Clone, Copy)]
pub struct PoolIds {
    pub input: PoolId,
    pub merch: PoolId,
    pub foliage: PoolId,
    pub other_wood: PoolId,
    pub coarse_root: PoolId,
    pub fine_root: PoolId,
    pub above_ground_very_fast_soil: PoolId,
    pub below_ground_very_fast_soil: PoolId,
    pub above_ground_fast_soil: PoolId,
    pub below_ground_fast_soil: PoolId,
    pub medium_soil: PoolId,
    pub above_ground_slow_soil: PoolId,
    pub below_ground_slow_soil: PoolId,
    pub stem_snag: PoolId,
    pub branch_snag: PoolId,
    pub co2: PoolId,
}

impl PoolIds {
    pub fn resolve(pools: &PoolSet) -> Result<Self, ConfigurationError> {
        let id = |name: &str| pools.id_of(name).ok_or_else(|| ConfigurationError::UnknownPool(name.to_string()));
        Ok(Self {
            input: id(INPUT)?,
            merch: id(MERCH)?,
            foliage: id(FOLIAGE)?,
            other_wood: id(OTHER_WOOD)?,
            coarse_root: id(COARSE_ROOT)?,
            fine_root: id(FINE_ROOT)?,
            above_ground_very_fast_soil: id(ABOVE_GROUND_VERY_FAST_SOIL)?,
            below_ground_very_fast_soil: id(BELOW_GROUND_VERY_FAST_SOIL)?,
            above_ground_fast_soil: id(ABOVE_GROUND_FAST_SOIL)?,
            below_ground_fast_soil: id(BELOW_GROUND_FAST_SOIL)?,
            medium_soil: id(MEDIUM_SOIL)?,
            above_ground_slow_soil: id(ABOVE_GROUND_SLOW_SOIL)?,
            below_ground_slow_soil: id(BELOW_GROUND_SLOW_SOIL)?,
            stem_snag: id(STEM_SNAG)?,
            branch_snag: id(BRANCH_SNAG)?,
            co2: id(CO2)?,
        })
    }

    pub fn biomass_pools(&self) -> [PoolId; 5] {
        [self.merch, self.foliage, self.other_wood, self.coarse_root, self.fine_root]
    }
}

/// The full default pool list, in the order a caller might register
/// them with `PoolSet::new` (spec.md §3 "order is fixed per engine
/// instance").
pub const DEFAULT_ORDER: &[&str] = &[
    INPUT,
    MERCH,
    FOLIAGE,
    OTHER_WOOD,
    COARSE_ROOT,
    FINE_ROOT,
    ABOVE_GROUND_VERY_FAST_SOIL,
    BELOW_GROUND_VERY_FAST_SOIL,
    ABOVE_GROUND_FAST_SOIL,
    BELOW_GROUND_FAST_SOIL,
    MEDIUM_SOIL,
    ABOVE_GROUND_SLOW_SOIL,
    BELOW_GROUND_SLOW_SOIL,
    STEM_SNAG,
    BRANCH_SNAG,
    CO2,
    CH4,
    CO,
    NO2,
    PRODUCTS,
];
