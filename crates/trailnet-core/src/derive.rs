//! Geometry derivation: from an ordered aggregation set to one resolved
//! geometry.
//!
//! Derivation is a pure function of the topology's offset, its aggregation
//! rows, and the *current* geometry of the referenced paths. Nothing derived
//! is persisted; readers derive on demand, so an acknowledged path edit or
//! redefine is visible to the next read by construction.
//!
//! # Algorithm
//!
//! 1. Walk aggregations in ordinal order and look up each path.
//! 2. Extract the span between start and end (reversed when `start > end`).
//! 3. Stitch spans, collapsing the shared junction point. Consecutive spans
//!    must meet within `tolerance`.
//! 4. Translate the stitched line perpendicular to travel by `offset`.
//! 5. Length is the planar length after the offset.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{NetworkResult, TopologyError};
use crate::geometry::{offset_point, offset_polyline, polyline_length, Coord, LineString};
use crate::models::{Path, PathAggregation, Topology};

/// Derived shape of a topology, serialized GeoJSON-style.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum ResolvedGeometry {
    Point(Coord),
    LineString(LineString),
}

impl ResolvedGeometry {
    pub fn coords(&self) -> Vec<Coord> {
        match self {
            Self::Point(c) => vec![*c],
            Self::LineString(ls) => ls.coords().to_vec(),
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedGeometry {
    pub geometry: ResolvedGeometry,
    pub length: f64,
}

/// Joins spans end to start. Returns the index and gap of the first span that
/// does not start where the previous one ended.
pub(crate) fn stitch(pieces: &[Vec<Coord>], tolerance: f64) -> NetworkResult<Vec<Coord>> {
    let mut line: Vec<Coord> = Vec::new();
    for (index, piece) in pieces.iter().enumerate() {
        if let (Some(prev), Some(first)) = (line.last(), piece.first()) {
            let gap = prev.distance(first);
            if gap > tolerance {
                return Err(TopologyError::Discontinuous { index, gap });
            }
        }
        for c in piece {
            if line.last().is_some_and(|l| l.approx_eq(c, tolerance)) {
                continue;
            }
            line.push(*c);
        }
    }
    Ok(line)
}

/// Derives geometry and length for `topology`.
///
/// `paths` must hold every path the aggregations reference; a missing or
/// invalid path yields [`TopologyError::DanglingReference`].
pub fn derive_geometry(
    topology: &Topology,
    aggregations: &[PathAggregation],
    paths: &HashMap<String, Path>,
    tolerance: f64,
) -> NetworkResult<DerivedGeometry> {
    let mut ordered: Vec<&PathAggregation> = aggregations.iter().collect();
    ordered.sort_by_key(|a| a.ordinal);

    let mut pieces = Vec::with_capacity(ordered.len());
    let mut resolved: Vec<&Path> = Vec::with_capacity(ordered.len());
    for agg in &ordered {
        let path = match paths.get(&agg.path_id) {
            Some(p) if p.valid => p,
            _ => {
                tracing::warn!(
                    topology = %topology.id,
                    path = %agg.path_id,
                    "topology references a missing or invalid path"
                );
                return Err(TopologyError::DanglingReference {
                    topology_id: topology.id.clone(),
                    path_id: agg.path_id.clone(),
                });
            }
        };
        pieces.push(
            path.geometry
                .substring(agg.start_position, agg.end_position),
        );
        resolved.push(path);
    }

    let line = stitch(&pieces, tolerance)?;
    match line.as_slice() {
        [] => Err(TopologyError::EmptySequence),
        [single] => {
            let (first, path) = (ordered[0], resolved[0]);
            let tangent = path.geometry.tangent_at(first.start_position);
            Ok(DerivedGeometry {
                geometry: ResolvedGeometry::Point(offset_point(single, tangent, topology.offset)),
                length: 0.0,
            })
        }
        _ => {
            let shifted = offset_polyline(&line, topology.offset);
            let length = polyline_length(&shifted);
            Ok(DerivedGeometry {
                geometry: ResolvedGeometry::LineString(LineString::new(shifted)),
                length,
            })
        }
    }
}

/// One aggregation as the cache sees it: the referenced path's version and
/// validity next to the span positions.
#[derive(Debug, Clone, PartialEq)]
struct KeyEntry {
    path_id: String,
    version: i64,
    valid: bool,
    start_bits: u64,
    end_bits: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    revision: i64,
    offset_bits: u64,
    entries: Vec<KeyEntry>,
}

impl CacheKey {
    fn new(topology: &Topology, aggregations: &[PathAggregation], paths: &HashMap<String, Path>) -> Self {
        let mut ordered: Vec<&PathAggregation> = aggregations.iter().collect();
        ordered.sort_by_key(|a| a.ordinal);
        Self {
            revision: topology.revision,
            offset_bits: topology.offset.to_bits(),
            entries: ordered
                .iter()
                .map(|a| {
                    let (version, valid) = paths
                        .get(&a.path_id)
                        .map_or((-1, false), |p| (p.version, p.valid));
                    KeyEntry {
                        path_id: a.path_id.clone(),
                        version,
                        valid,
                        start_bits: a.start_position.to_bits(),
                        end_bits: a.end_position.to_bits(),
                    }
                })
                .collect(),
        }
    }
}

/// Memoizes derivations per topology.
///
/// An entry is reused only while the topology revision, offset, span
/// positions and the version of every referenced path are unchanged, so
/// edits invalidate it without any explicit fan-out. Failed derivations are
/// not cached. A panic while the lock is held only loses memoized entries, so
/// a poisoned lock is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct DerivationCache {
    entries: Mutex<HashMap<String, (CacheKey, DerivedGeometry)>>,
}

impl DerivationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_derive(
        &self,
        topology: &Topology,
        aggregations: &[PathAggregation],
        paths: &HashMap<String, Path>,
        tolerance: f64,
    ) -> NetworkResult<DerivedGeometry> {
        let key = CacheKey::new(topology, aggregations, paths);
        if let Some((cached_key, derived)) = self.lock_entries().get(&topology.id) {
            if *cached_key == key {
                tracing::debug!(topology = %topology.id, "derivation cache hit");
                return Ok(derived.clone());
            }
        }
        let derived = derive_geometry(topology, aggregations, paths, tolerance)?;
        self.lock_entries()
            .insert(topology.id.clone(), (key, derived.clone()));
        Ok(derived)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, (CacheKey, DerivedGeometry)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
