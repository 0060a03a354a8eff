pub mod biomass;
pub mod indexing;
pub mod lookup;
pub mod tables;

pub use biomass::{volume_to_biomass, BiomassConversionParameters, BiomassTargets};
pub use indexing::{resolve_disturbance_matrix, resolve_growth_curve, Indexer};
pub use lookup::LookupTable;
pub use tables::{
    half_life_to_rate, DecayParameters, DisturbanceMatrixAssociation, DisturbanceMatrixValue,
    GrowthCurve, RootParameters, TurnoverParameters,
};
