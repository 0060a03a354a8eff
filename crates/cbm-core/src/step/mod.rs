pub mod machine;
pub mod transitions;

pub use machine::{run_step, StepInputs, StepParameters};
pub use transitions::LandClassTransitionTable;
