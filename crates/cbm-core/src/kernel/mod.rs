pub mod compute;

pub use compute::{compute_flux, compute_pools, validate_pool_values, PoolMatrix};
