//! In-memory [`Store`] implementation for testing and WASM targets.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Topologies and their aggregations share one lock, so inserting or
//! replacing an aggregation set is a single critical section.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    default_kinds, Infrastructure, Intervention, Path, PathAggregation, Topology, TopologyKind,
};

use super::Store;

#[derive(Default)]
struct TopologyTables {
    topologies: HashMap<String, Topology>,
    aggregations: HashMap<String, Vec<PathAggregation>>,
}

/// In-memory store for testing and WASM environments.
pub struct InMemoryStore {
    paths: RwLock<HashMap<String, Path>>,
    kinds: RwLock<BTreeMap<i64, TopologyKind>>,
    topologies: RwLock<TopologyTables>,
    infrastructures: RwLock<HashMap<String, Infrastructure>>,
    interventions: RwLock<HashMap<String, Intervention>>,
}

impl InMemoryStore {
    /// Store seeded with the default topology kinds.
    pub fn new() -> Self {
        Self::with_kinds(default_kinds())
    }

    pub fn with_kinds(kinds: Vec<TopologyKind>) -> Self {
        Self {
            paths: RwLock::new(HashMap::new()),
            kinds: RwLock::new(kinds.into_iter().map(|k| (k.code, k)).collect()),
            topologies: RwLock::new(TopologyTables::default()),
            infrastructures: RwLock::new(HashMap::new()),
            interventions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn ordered(mut aggregations: Vec<PathAggregation>) -> Vec<PathAggregation> {
    aggregations.sort_by_key(|a| a.ordinal);
    aggregations
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_path(&self, path: &Path) -> Result<()> {
        let mut paths = self.paths.write().unwrap();
        if paths.contains_key(&path.id) {
            bail!("path already exists: {}", path.id);
        }
        paths.insert(path.id.clone(), path.clone());
        Ok(())
    }

    async fn update_path(&self, path: &Path, expected_version: i64) -> Result<bool> {
        let mut paths = self.paths.write().unwrap();
        match paths.get_mut(&path.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = path.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => bail!("path not found: {}", path.id),
        }
    }

    async fn get_path(&self, id: &str) -> Result<Option<Path>> {
        Ok(self.paths.read().unwrap().get(id).cloned())
    }

    async fn get_paths(&self, ids: &[String]) -> Result<Vec<Path>> {
        let paths = self.paths.read().unwrap();
        Ok(ids.iter().filter_map(|id| paths.get(id).cloned()).collect())
    }

    async fn list_paths(&self, structure: Option<&str>) -> Result<Vec<Path>> {
        let paths = self.paths.read().unwrap();
        let mut out: Vec<Path> = paths
            .values()
            .filter(|p| structure.map_or(true, |s| p.structure == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn list_kinds(&self) -> Result<Vec<TopologyKind>> {
        Ok(self.kinds.read().unwrap().values().cloned().collect())
    }

    async fn get_kind(&self, code: i64) -> Result<Option<TopologyKind>> {
        Ok(self.kinds.read().unwrap().get(&code).cloned())
    }

    async fn insert_topology(
        &self,
        topology: &Topology,
        aggregations: &[PathAggregation],
    ) -> Result<()> {
        let mut tables = self.topologies.write().unwrap();
        if tables.topologies.contains_key(&topology.id) {
            bail!("topology already exists: {}", topology.id);
        }
        tables
            .topologies
            .insert(topology.id.clone(), topology.clone());
        tables
            .aggregations
            .insert(topology.id.clone(), ordered(aggregations.to_vec()));
        Ok(())
    }

    async fn replace_aggregations(
        &self,
        topology: &Topology,
        aggregations: &[PathAggregation],
        expected_revision: i64,
    ) -> Result<bool> {
        let mut tables = self.topologies.write().unwrap();
        match tables.topologies.get(&topology.id) {
            Some(current) if !current.deleted && current.revision == expected_revision => {}
            _ => return Ok(false),
        }
        tables
            .topologies
            .insert(topology.id.clone(), topology.clone());
        tables
            .aggregations
            .insert(topology.id.clone(), ordered(aggregations.to_vec()));
        Ok(true)
    }

    async fn get_topology(&self, id: &str) -> Result<Option<Topology>> {
        Ok(self.topologies.read().unwrap().topologies.get(id).cloned())
    }

    async fn get_aggregations(&self, topology_id: &str) -> Result<Vec<PathAggregation>> {
        Ok(self
            .topologies
            .read()
            .unwrap()
            .aggregations
            .get(topology_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_topology_deleted(
        &self,
        id: &str,
        deleted: bool,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.topologies.write().unwrap();
        match tables.topologies.get_mut(id) {
            Some(t) => {
                t.deleted = deleted;
                t.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn topologies_on_path(&self, path_id: &str) -> Result<Vec<String>> {
        let tables = self.topologies.read().unwrap();
        let mut ids: Vec<String> = tables
            .aggregations
            .iter()
            .filter(|(id, aggs)| {
                aggs.iter().any(|a| a.path_id == path_id)
                    && tables.topologies.get(*id).is_some_and(|t| !t.deleted)
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn upsert_infrastructure(&self, infrastructure: &Infrastructure) -> Result<()> {
        self.infrastructures
            .write()
            .unwrap()
            .insert(infrastructure.id.clone(), infrastructure.clone());
        Ok(())
    }

    async fn get_infrastructure(&self, id: &str) -> Result<Option<Infrastructure>> {
        Ok(self.infrastructures.read().unwrap().get(id).cloned())
    }

    async fn upsert_intervention(&self, intervention: &Intervention) -> Result<()> {
        self.interventions
            .write()
            .unwrap()
            .insert(intervention.id.clone(), intervention.clone());
        Ok(())
    }

    async fn get_intervention(&self, id: &str) -> Result<Option<Intervention>> {
        Ok(self.interventions.read().unwrap().get(id).cloned())
    }
}
