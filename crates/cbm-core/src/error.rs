//! Error taxonomy for the pool/flux engine.
//!
//! Three fatal categories plus one non-fatal, per-stand diagnostic:
//! `ConfigurationError` (bad init), `DimensionError` (shape mismatch at a
//! call boundary), `DomainError` (bad numbers at runtime). Convergence
//! failure during spinup is not an error — it is surfaced as a flag on
//! `SpinupOutcome` (see `spinup::machine`).

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unknown pool name: {0}")]
    UnknownPool(String),
    #[error("duplicate pool id {id} (names {first} and {second})")]
    DuplicatePoolId { id: usize, first: String, second: String },
    #[error("no pool named 'Input' in pool set — the Input pool is mandatory")]
    MissingInputPool,
    #[error("flux indicator '{name}' references unknown pool id {pool_id}")]
    UnknownFluxPool { name: String, pool_id: usize },
    #[error("duplicate coordinate ({row}, {col}) in matrix triples")]
    DuplicateCoordinate { row: usize, col: usize },
    #[error("unresolvable association: disturbance_type={disturbance_type} spatial_unit={spatial_unit} land_class={land_class:?}")]
    UnresolvableAssociation {
        disturbance_type: u32,
        spatial_unit: u32,
        land_class: Option<u32>,
    },
    #[error("malformed matrix column name: {0}")]
    MalformedColumnName(String),
    #[error("no row in parameter table '{table}' for key {key}")]
    MissingParameterRow { table: String, key: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DimensionError {
    #[error("op '{op}': matrix_index length {got} does not match stand count {expected}")]
    IndexLength { op: String, got: usize, expected: usize },
    #[error("op '{op}': matrix_index[{stand}] = {index} is out of range for {n_matrices} matrices")]
    MatrixIndexOutOfRange { op: String, stand: usize, index: u32, n_matrices: usize },
    #[error("op '{op}': matrix dimension {got} does not match pool count {expected}")]
    PoolCount { op: String, got: usize, expected: usize },
    #[error("column '{name}' length {got} does not match row count {expected}")]
    ColumnLength { name: String, got: usize, expected: usize },
    #[error("triple references pool index {index} ≥ pool count {n_pools}")]
    TripleIndexOutOfRange { index: usize, n_pools: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("nonfinite coefficient at ({row}, {col}): {value}")]
    NonfiniteCoefficient { row: usize, col: usize, value: f64 },
    #[error("negative coefficient at ({row}, {col}): {value}")]
    NegativeCoefficient { row: usize, col: usize, value: f64 },
    #[error("row {row} sums to {sum} > 1.0 (more than 100% of the source pool routed out)")]
    RowSumExceedsOne { row: usize, sum: f64 },
    #[error("nonfinite pool value for stand {stand}, pool {pool}: {value}")]
    NonfinitePoolValue { stand: usize, pool: usize, value: f64 },
    #[error("negative pool value for stand {stand}, pool {pool}: {value}")]
    NegativePoolValue { stand: usize, pool: usize, value: f64 },
}
