//! Parameter resolution & per-stand indexing (spec.md §4.5, component C5).
//!
//! Dense integer interning so matrix batches can be compactly stored and
//! selected by `u32` index (spec.md §9 "Batched polymorphism over
//! parameter buckets"), plus the two lookup rules spec.md calls out by
//! name: disturbance-matrix association resolution and growth-curve
//! classifier-set matching.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::ConfigurationError;
use crate::params::tables::{DisturbanceMatrixAssociation, GrowthCurve};

/// Interns values of type `K` into a dense, stable `0..n` index space.
/// Used to turn e.g. `(spatial_unit, species)` tuples into compact
/// matrix-bucket indices.
#[derive(Debug, Clone, Default)]
pub struct Indexer<K: Eq + Hash + Clone> {
    index_of: HashMap<K, u32>,
    keys: Vec<K>,
}

impl<K: Eq + Hash + Clone> Indexer<K> {
    pub fn new() -> Self {
        Self { index_of: HashMap::new(), keys: Vec::new() }
    }

    /// Return the existing index for `key`, interning it if new.
    pub fn intern(&mut self, key: K) -> u32 {
        if let Some(&idx) = self.index_of.get(&key) {
            return idx;
        }
        let idx = self.keys.len() as u32;
        self.keys.push(key.clone());
        self.index_of.insert(key, idx);
        idx
    }

    pub fn get(&self, key: &K) -> Option<u32> {
        self.index_of.get(key).copied()
    }

    pub fn key(&self, index: u32) -> &K {
        &self.keys[index as usize]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Resolve `(disturbance_type, spatial_unit, optional land_class)` to a
/// disturbance-matrix id, preferring an exact land-class match over a
/// wildcard (`None`) association (spec.md §4.5 "Resolve disturbance-type
/// x spatial-unit x optional-land-class").
pub fn resolve_disturbance_matrix(
    associations: &[DisturbanceMatrixAssociation],
    disturbance_type: u32,
    spatial_unit: u32,
    land_class: u32,
) -> Result<u32, ConfigurationError> {
    if disturbance_type == 0 {
        return Ok(0); // the reserved identity / no-op matrix id
    }

    let mut wildcard_match = None;
    for a in associations {
        if a.disturbance_type != disturbance_type || a.spatial_unit != spatial_unit {
            continue;
        }
        match a.land_class {
            Some(lc) if lc == land_class => return Ok(a.matrix_id),
            None if wildcard_match.is_none() => wildcard_match = Some(a.matrix_id),
            _ => {}
        }
    }

    wildcard_match.ok_or(ConfigurationError::UnresolvableAssociation {
        disturbance_type,
        spatial_unit,
        land_class: Some(land_class),
    })
}

/// Resolve `(classifiers, species)` to the best-matching growth curve:
/// the curve whose classifier set has the fewest wildcards among those
/// that match every non-wildcard position (spec.md §4.5 "longest-match
/// semantics: more specific classifier sets win; `?` is a wildcard").
pub fn resolve_growth_curve<'a>(
    curves: &'a [GrowthCurve],
    species: u32,
    classifiers: &[u32],
) -> Option<&'a GrowthCurve> {
    curves
        .iter()
        .filter(|c| c.species == species)
        .filter(|c| classifiers_match(&c.classifiers, classifiers))
        .min_by_key(|c| c.classifiers.iter().filter(|v| v.is_none()).count())
}

fn classifiers_match(pattern: &[Option<u32>], values: &[u32]) -> bool {
    if pattern.len() != values.len() {
        return false;
    }
    pattern.iter().zip(values).all(|(p, v)| match p {
        Some(pv) => pv == v,
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexer_interns_stably() {
        let mut idx: Indexer<(u32, u32)> = Indexer::new();
        let a = idx.intern((1, 2));
        let b = idx.intern((3, 4));
        let a_again = idx.intern((1, 2));
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(idx.key(a), &(1, 2));
    }

    #[test]
    fn disturbance_type_zero_is_identity() {
        let assoc = vec![];
        assert_eq!(resolve_disturbance_matrix(&assoc, 0, 17, 1).unwrap(), 0);
    }

    #[test]
    fn exact_land_class_beats_wildcard() {
        let assoc = vec![
            DisturbanceMatrixAssociation { spatial_unit: 17, disturbance_type: 1, land_class: None, matrix_id: 5 },
            DisturbanceMatrixAssociation { spatial_unit: 17, disturbance_type: 1, land_class: Some(2), matrix_id: 9 },
        ];
        assert_eq!(resolve_disturbance_matrix(&assoc, 1, 17, 2).unwrap(), 9);
        assert_eq!(resolve_disturbance_matrix(&assoc, 1, 17, 3).unwrap(), 5);
    }

    #[test]
    fn unresolvable_association_errors() {
        let assoc = vec![];
        let err = resolve_disturbance_matrix(&assoc, 1, 17, 2).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnresolvableAssociation { .. }));
    }

    #[test]
    fn growth_curve_prefers_more_specific_match() {
        let curve = |id, classifiers: Vec<Option<u32>>| GrowthCurve {
            id,
            species: 1,
            classifiers,
            volume_at_age: crate::params::lookup::LookupTable::new("c", vec![0.0, 1.0], vec![0.0, 1.0]),
        };
        let curves = vec![
            curve(1, vec![None, None]),
            curve(2, vec![Some(17), None]),
            curve(3, vec![Some(17), Some(4)]),
        ];
        let best = resolve_growth_curve(&curves, 1, &[17, 4]).unwrap();
        assert_eq!(best.id, 3);

        let fallback = resolve_growth_curve(&curves, 1, &[17, 9]).unwrap();
        assert_eq!(fallback.id, 2);
    }
}
