//! Land-class transition table (spec.md §4.4 "update land_class via
//! land-class-transition table if a triggering disturbance occurred").

use crate::error::ConfigurationError;

/// `(land_class, disturbance_type) -> (new_land_class, regeneration_delay)`.
/// A disturbance with no matching row leaves land class unchanged and
/// sets no regeneration delay.
#[derive(Debug, Clone, Default)]
pub struct LandClassTransitionTable {
    entries: Vec<(u32, u32, u32, u32)>,
}

impl LandClassTransitionTable {
    pub fn new(entries: Vec<(u32, u32, u32, u32)>) -> Result<Self, ConfigurationError> {
        Ok(Self { entries })
    }

    pub fn resolve(&self, land_class: u32, disturbance_type: u32) -> Option<(u32, u32)> {
        self.entries
            .iter()
            .find(|&&(lc, dt, _, _)| lc == land_class && dt == disturbance_type)
            .map(|&(_, _, new_lc, delay)| (new_lc, delay))
    }
}
