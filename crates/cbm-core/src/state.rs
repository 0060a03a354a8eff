//! Per-stand state (spec.md §3 "Stand state").

use serde::{Deserialize, Serialize};

/// One stand's mutable record, carried through spinup and every
/// subsequent annual step. Never aliased across stands — each stand owns
/// its row (spec.md §3 "Lifecycle").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandState {
    pub age: u32,
    pub land_class: u32,
    pub time_since_last_disturbance: u32,
    pub time_since_land_class_change: u32,
    pub regeneration_delay: u32,
    pub growth_enabled: bool,
    pub enabled: bool,
    pub last_disturbance_type: u32,
    pub growth_multiplier: f64,
    pub spatial_unit: u32,
    pub species: u32,
    pub classifiers: Vec<u32>,
    pub historical_disturbance_type: u32,
    pub last_pass_disturbance_type: u32,
}

impl StandState {
    /// `age ≥ 0` and `regeneration_delay ≥ 0` hold trivially for `u32`;
    /// the remaining invariant — while `regeneration_delay > 0`,
    /// `growth_enabled` is false — must be actively maintained by
    /// callers after any mutation of `regeneration_delay`.
    pub fn upholds_regeneration_delay_invariant(&self) -> bool {
        self.regeneration_delay == 0 || !self.growth_enabled
    }

    /// Force `growth_enabled` to false whenever under regeneration
    /// delay, per the stated invariant. Call after any mutation that
    /// changes `regeneration_delay`.
    pub fn enforce_regeneration_delay_invariant(&mut self) {
        if self.regeneration_delay > 0 {
            self.growth_enabled = false;
        }
    }
}
