//! Forest-carbon pool/flux simulation engine.
//!
//! A batched, sparse-matrix compute kernel (`kernel`) drives stand-level
//! carbon pools through a fixed annual-process op sequence, assembled
//! per tick from parameter tables (`params`, `assembly`) and sequenced by
//! two state machines: `spinup` brings a stand from bare ground to an
//! approximate steady state, `step` advances an already-initialized
//! stand by one year. `engine` ties pool/flux definitions, parameter
//! tables, and both drivers together behind one entry point.

pub mod assembly;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod params;
pub mod pool_names;
pub mod pools;
pub mod spinup;
pub mod state;
pub mod step;
pub mod storage;

pub use engine::{Engine, EngineConfig, GrowthModel};
pub use error::{ConfigurationError, CoreError, DimensionError, DomainError};
pub use kernel::{compute_flux, compute_pools, validate_pool_values, PoolMatrix};
pub use matrix::{Op, SparseMatrix};
pub use pool_names::PoolIds;
pub use pools::{FluxIndicatorDefinition, FluxIndicatorSet, PoolDefinition, PoolId, PoolSet, ProcessTag};
pub use state::StandState;
pub use storage::{Column, VarTable};
