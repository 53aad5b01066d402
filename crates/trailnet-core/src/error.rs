//! Error taxonomy shared by every network operation.
//!
//! Each variant is a distinct, user-displayable failure category. Callers
//! (CLI, future front ends) branch on the variant or on [`TopologyError::code`];
//! no variant is ever reported as another.

use thiserror::Error;

/// Result alias for network operations.
pub type NetworkResult<T> = std::result::Result<T, TopologyError>;

/// Failures raised by the path registry, topology composer, derivation, and
/// attachment layers.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Malformed or degenerate geometry on path create/update.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A topology entry references a path id that does not exist.
    #[error("unknown path: {0}")]
    UnknownPath(String),

    /// A topology entry references an invalid path, or carries unusable positions.
    #[error("invalid path reference {path_id}: {reason}")]
    InvalidPath { path_id: String, reason: String },

    /// Derivation met a path that vanished or was invalidated after the
    /// topology was defined.
    #[error("topology {topology_id} references path {path_id} which is no longer available")]
    DanglingReference {
        topology_id: String,
        path_id: String,
    },

    /// Cross-structure access without elevation.
    #[error("caller scoped to structure '{caller}' may not access an entity of structure '{owner}'")]
    ScopeViolation { caller: String, owner: String },

    /// Unknown id for an entity lookup.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A topology must reference at least one path.
    #[error("a topology needs at least one path aggregation")]
    EmptySequence,

    /// Entry `index` does not start where entry `index - 1` ends.
    #[error("aggregation {index} does not connect to the previous entry (gap of {gap:.6})")]
    Discontinuous { index: usize, gap: f64 },

    /// Optimistic version or revision check lost against a concurrent writer.
    #[error("{entity} {id} was modified concurrently; reload and retry")]
    Conflict { entity: &'static str, id: String },

    /// The attachment's position is owned by another entity.
    #[error("{entity} {id} takes its position from infrastructure {owner}; reposition the infrastructure instead")]
    ReadOnlyPosition {
        entity: &'static str,
        id: String,
        owner: String,
    },

    /// Storage backend failure.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl TopologyError {
    /// Stable machine-readable category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidGeometry(_) => "invalid_geometry",
            Self::UnknownPath(_) => "unknown_path",
            Self::InvalidPath { .. } => "invalid_path",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::ScopeViolation { .. } => "scope_violation",
            Self::NotFound { .. } => "not_found",
            Self::EmptySequence => "empty_sequence",
            Self::Discontinuous { .. } => "discontinuous",
            Self::Conflict { .. } => "conflict",
            Self::ReadOnlyPosition { .. } => "read_only_position",
            Self::Store(_) => "store",
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, id: &str) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_path(path_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path_id: path_id.to_string(),
            reason: reason.into(),
        }
    }
}
