pub mod machine;

pub use machine::{run_spinup_to_end, run_spinup_tick, SpinupInputs, SpinupParameters, SpinupPhase, SpinupState};
