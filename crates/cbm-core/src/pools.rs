//! Pool and flux-indicator definitions — the fixed vocabulary of a
//! particular engine instance, established once at initialization.
//!
//! See `spec.md` §3 "Pool" / "Flux indicator" and §6 "Engine initialization".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Stable integer index of a pool. Order is fixed per engine instance.
pub type PoolId = usize;

/// The reserved name of the constant-1.0 source pool (spec.md §3).
pub const INPUT_POOL_NAME: &str = "Input";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDefinition {
    pub name: String,
    pub id: PoolId,
}

/// The fixed set of pools for one engine instance: names, stable ids, and
/// the distinguished `Input` pool.
#[derive(Debug, Clone)]
pub struct PoolSet {
    names: Vec<String>,
    index_by_name: HashMap<String, PoolId>,
    input_pool: PoolId,
}

impl PoolSet {
    /// Build a pool set from an ordered `{name, id}` list. Ids must be a
    /// dense permutation of `0..definitions.len()` and exactly one
    /// definition must be named `Input`.
    pub fn new(definitions: Vec<PoolDefinition>) -> Result<Self, ConfigurationError> {
        let n = definitions.len();
        let mut names: Vec<Option<String>> = vec![None; n];
        let mut index_by_name = HashMap::with_capacity(n);

        for def in definitions {
            if def.id >= n {
                return Err(ConfigurationError::DuplicatePoolId {
                    id: def.id,
                    first: def.name.clone(),
                    second: def.name.clone(),
                });
            }
            if let Some(existing) = &names[def.id] {
                return Err(ConfigurationError::DuplicatePoolId {
                    id: def.id,
                    first: existing.clone(),
                    second: def.name,
                });
            }
            index_by_name.insert(def.name.clone(), def.id);
            names[def.id] = Some(def.name);
        }

        let names: Vec<String> = names
            .into_iter()
            .enumerate()
            .map(|(id, n)| n.ok_or(ConfigurationError::DuplicatePoolId {
                id,
                first: "<gap>".into(),
                second: "<gap>".into(),
            }))
            .collect::<Result<_, _>>()?;

        let input_pool = *index_by_name
            .get(INPUT_POOL_NAME)
            .ok_or(ConfigurationError::MissingInputPool)?;

        Ok(Self { names, index_by_name, input_pool })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<PoolId> {
        self.index_by_name.get(name).copied()
    }

    pub fn name_of(&self, id: PoolId) -> &str {
        &self.names[id]
    }

    pub fn input_pool(&self) -> PoolId {
        self.input_pool
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A discrete label carried by an `Op`, used to route fluxes to indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessTag {
    GrowthAndMortality,
    Decay,
    Disturbance,
}

/// A named sum over (source × sink) cells of flows produced by ops whose
/// process tag matches (spec.md §3 "Flux indicator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluxIndicatorDefinition {
    pub name: String,
    pub process_tag: ProcessTag,
    pub sources: Vec<PoolId>,
    pub sinks: Vec<PoolId>,
}

#[derive(Debug, Clone)]
pub struct FluxIndicatorSet {
    definitions: Vec<FluxIndicatorDefinition>,
    index_by_name: HashMap<String, usize>,
}

impl FluxIndicatorSet {
    pub fn new(
        definitions: Vec<FluxIndicatorDefinition>,
        pools: &PoolSet,
    ) -> Result<Self, ConfigurationError> {
        for def in &definitions {
            for &p in def.sources.iter().chain(def.sinks.iter()) {
                if p >= pools.len() {
                    return Err(ConfigurationError::UnknownFluxPool {
                        name: def.name.clone(),
                        pool_id: p,
                    });
                }
            }
        }
        let index_by_name = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Ok(Self { definitions, index_by_name })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FluxIndicatorDefinition> {
        self.definitions.iter()
    }

    pub fn definitions(&self) -> &[FluxIndicatorDefinition] {
        &self.definitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Vec<PoolDefinition> {
        vec![
            PoolDefinition { name: "Input".into(), id: 0 },
            PoolDefinition { name: "SoftwoodMerch".into(), id: 1 },
            PoolDefinition { name: "CO2".into(), id: 2 },
        ]
    }

    #[test]
    fn pool_set_resolves_input() {
        let set = PoolSet::new(defs()).unwrap();
        assert_eq!(set.input_pool(), 0);
        assert_eq!(set.id_of("SoftwoodMerch"), Some(1));
        assert_eq!(set.name_of(2), "CO2");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn pool_set_requires_input() {
        let defs = vec![PoolDefinition { name: "Foo".into(), id: 0 }];
        let err = PoolSet::new(defs).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingInputPool));
    }

    #[test]
    fn pool_set_rejects_duplicate_id() {
        let defs = vec![
            PoolDefinition { name: "Input".into(), id: 0 },
            PoolDefinition { name: "Foo".into(), id: 0 },
        ];
        let err = PoolSet::new(defs).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicatePoolId { .. }));
    }

    #[test]
    fn flux_indicator_set_validates_pool_refs() {
        let pools = PoolSet::new(defs()).unwrap();
        let bad = vec![FluxIndicatorDefinition {
            name: "Bad".into(),
            process_tag: ProcessTag::Decay,
            sources: vec![99],
            sinks: vec![2],
        }];
        let err = FluxIndicatorSet::new(bad, &pools).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownFluxPool { .. }));
    }
}
