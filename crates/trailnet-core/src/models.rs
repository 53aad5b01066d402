//! Core data models for the path network.
//!
//! These types are the logical relations persisted by every [`Store`](crate::store::Store)
//! backend: paths, topology kinds, topologies, their ordered path
//! aggregations, and the domain attachments that hold a topology.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::LineString;

/// Terrain statistics derived from a path's geometry.
///
/// Never written by callers; recomputed by a [`TerrainModel`](crate::terrain::TerrainModel)
/// in the same write that changes the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PathStats {
    pub length: f64,
    pub ascent: f64,
    pub descent: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
}

/// A digitized network segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub id: String,
    /// Owning structure scope.
    pub structure: String,
    pub geometry: LineString,
    /// Alternate source geometry, informational only.
    pub cadastre_geometry: Option<LineString>,
    pub name: Option<String>,
    pub comments: Option<String>,
    /// Soft validity flag; an invalid path stays in the store.
    pub valid: bool,
    pub stats: PathStats,
    /// Bumped by every successful update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Semantic category of a topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyKind {
    pub code: i64,
    pub label: String,
}

pub const KIND_INTERVENTION: i64 = 1;
pub const KIND_INFRASTRUCTURE: i64 = 2;
pub const KIND_SIGNAGE: i64 = 3;

/// Reference kinds used when no configuration overrides them.
pub fn default_kinds() -> Vec<TopologyKind> {
    vec![
        TopologyKind {
            code: KIND_INTERVENTION,
            label: "intervention".to_string(),
        },
        TopologyKind {
            code: KIND_INFRASTRUCTURE,
            label: "infrastructure".to_string(),
        },
        TopologyKind {
            code: KIND_SIGNAGE,
            label: "signage".to_string(),
        },
    ]
}

/// An abstract object positioned along one or more paths.
///
/// Geometry and length are not stored here; see [`crate::derive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub id: String,
    /// Signed lateral distance from the path centerline; positive is left.
    pub offset: f64,
    pub deleted: bool,
    pub kind: i64,
    /// Bumped by every redefine.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// "This topology occupies this span of this path, at this place in its sequence."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathAggregation {
    pub topology_id: String,
    pub path_id: String,
    pub ordinal: i64,
    pub start_position: f64,
    pub end_position: f64,
}

/// One requested entry of a topology definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub path_id: String,
    pub start: f64,
    pub end: f64,
}

impl Span {
    pub fn new(path_id: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            path_id: path_id.into(),
            start,
            end,
        }
    }

    /// Single-point span at `position`.
    pub fn point(path_id: impl Into<String>, position: f64) -> Self {
        Self::new(path_id, position, position)
    }

    pub fn is_point(&self) -> bool {
        self.start == self.end
    }
}

/// A physical asset on the network (bridge, stairs, signpost...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Infrastructure {
    pub id: String,
    pub structure: String,
    pub name: String,
    /// Topology kind code, shared with the infrastructure's topology.
    pub kind: i64,
    pub topology_id: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A maintenance intervention, either on its own stretch of network or on an
/// infrastructure whose position it shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: String,
    pub structure: String,
    pub name: String,
    pub comments: Option<String>,
    pub topology_id: String,
    pub infrastructure_id: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Intervention {
    pub fn on_infrastructure(&self) -> bool {
        self.infrastructure_id.is_some()
    }
}
