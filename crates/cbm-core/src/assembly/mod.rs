pub mod decay;
pub mod disturbance;
pub mod growth;
pub mod schema;
pub mod slow_mixing;
pub mod turnover;

pub use decay::build_dom_decay_op;
pub use disturbance::{build_disturbance_op, disturbance_values_from_columns};
pub use growth::{build_growth_op, build_overmature_decline_op, GrowthSource};
pub use schema::{parse_column, parse_schema, ColumnKind};
pub use slow_mixing::build_slow_mixing_op;
pub use turnover::build_biomass_turnover_op;
