//! Storage abstraction for the path network.
//!
//! The [`Store`] trait covers the logical relations (paths, topology kinds,
//! topologies, ordered path aggregations, and domain attachments). Backends
//! are pluggable: [`memory::InMemoryStore`] here, a SQLite store in the
//! application crate.
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must make [`Store::insert_topology`] and [`Store::replace_aggregations`]
//! all-or-nothing: a reader never sees a topology with a partial or mixed
//! aggregation set.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Infrastructure, Intervention, Path, PathAggregation, Topology, TopologyKind};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_path`](Store::insert_path) | Insert a new path |
/// | [`update_path`](Store::update_path) | Compare-and-swap a path on its version |
/// | [`get_path`](Store::get_path) / [`get_paths`](Store::get_paths) | Path lookup |
/// | [`list_paths`](Store::list_paths) | Paths, optionally filtered by structure |
/// | [`list_kinds`](Store::list_kinds) / [`get_kind`](Store::get_kind) | Topology kinds |
/// | [`insert_topology`](Store::insert_topology) | Topology plus its aggregations, atomically |
/// | [`replace_aggregations`](Store::replace_aggregations) | Compare-and-swap the whole aggregation set on the topology revision |
/// | [`get_topology`](Store::get_topology) / [`get_aggregations`](Store::get_aggregations) | Topology lookup |
/// | [`set_topology_deleted`](Store::set_topology_deleted) | Soft delete |
/// | [`topologies_on_path`](Store::topologies_on_path) | Fan-out lookup for a path edit |
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_path(&self, path: &Path) -> Result<()>;

    /// Writes `path` only if the stored version still equals
    /// `expected_version`. Returns `false` when the check fails.
    async fn update_path(&self, path: &Path, expected_version: i64) -> Result<bool>;

    async fn get_path(&self, id: &str) -> Result<Option<Path>>;

    /// Fetches every listed path that exists; missing ids are omitted.
    async fn get_paths(&self, ids: &[String]) -> Result<Vec<Path>>;

    async fn list_paths(&self, structure: Option<&str>) -> Result<Vec<Path>>;

    async fn list_kinds(&self) -> Result<Vec<TopologyKind>>;

    async fn get_kind(&self, code: i64) -> Result<Option<TopologyKind>>;

    async fn insert_topology(
        &self,
        topology: &Topology,
        aggregations: &[PathAggregation],
    ) -> Result<()>;

    /// Replaces the topology row and its entire aggregation set in one step,
    /// only if the stored topology is live and still at `expected_revision`.
    /// Returns `false`, writing nothing, when the check fails.
    async fn replace_aggregations(
        &self,
        topology: &Topology,
        aggregations: &[PathAggregation],
        expected_revision: i64,
    ) -> Result<bool>;

    async fn get_topology(&self, id: &str) -> Result<Option<Topology>>;

    /// Aggregations of a topology, ordered by ordinal.
    async fn get_aggregations(&self, topology_id: &str) -> Result<Vec<PathAggregation>>;

    /// Sets the soft-delete flag and `updated_at`. Returns `false` if the
    /// topology does not exist.
    async fn set_topology_deleted(
        &self,
        id: &str,
        deleted: bool,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Ids of non-deleted topologies with at least one aggregation on `path_id`.
    async fn topologies_on_path(&self, path_id: &str) -> Result<Vec<String>>;

    async fn upsert_infrastructure(&self, infrastructure: &Infrastructure) -> Result<()>;

    async fn get_infrastructure(&self, id: &str) -> Result<Option<Infrastructure>>;

    async fn upsert_intervention(&self, intervention: &Intervention) -> Result<()>;

    async fn get_intervention(&self, id: &str) -> Result<Option<Intervention>>;
}
