//! Topology composer: define, redefine, soft-delete, and resolve topologies.
//!
//! A definition is validated in full before anything is written: every span
//! must carry usable positions and reference an existing, valid path that the
//! caller's scope may read, and consecutive spans must connect. Only then is
//! the topology row written together with its aggregation set, in one store
//! call. A redefine replaces the whole set the same way, so a topology never
//! references a mix of old and new paths.
//!
//! Geometry is derived on read ([`TopologyComposer::resolve`]) through a
//! [`DerivationCache`] keyed on path versions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::derive::{stitch, DerivationCache, DerivedGeometry, ResolvedGeometry};
use crate::error::{NetworkResult, TopologyError};
use crate::models::{Path, PathAggregation, Span, Topology};
use crate::scope::Scope;
use crate::store::Store;

/// A topology together with its current aggregation set and derived shape.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTopology {
    pub topology: Topology,
    pub aggregations: Vec<PathAggregation>,
    pub geometry: ResolvedGeometry,
    pub length: f64,
}

pub struct TopologyComposer<S: Store + ?Sized> {
    store: Arc<S>,
    cache: Arc<DerivationCache>,
    tolerance: f64,
}

impl<S: Store + ?Sized> Clone for TopologyComposer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            tolerance: self.tolerance,
        }
    }
}

impl<S: Store + ?Sized> TopologyComposer<S> {
    /// `tolerance` is the largest gap, in path units, still treated as a
    /// shared endpoint between consecutive spans.
    pub fn new(store: Arc<S>, tolerance: f64) -> Self {
        Self {
            store,
            cache: Arc::new(DerivationCache::new()),
            tolerance,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Creates a topology from an ordered span sequence.
    pub async fn define(
        &self,
        scope: &Scope,
        spans: &[Span],
        offset: f64,
        kind: i64,
    ) -> NetworkResult<Topology> {
        check_offset(offset)?;
        if self.store.get_kind(kind).await?.is_none() {
            return Err(TopologyError::not_found("topology kind", &kind.to_string()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let aggregations = self.build_aggregations(scope, &id, spans).await?;

        let now = Utc::now();
        let topology = Topology {
            id,
            offset,
            deleted: false,
            kind,
            revision: 1,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_topology(&topology, &aggregations).await?;
        tracing::info!(
            topology = %topology.id,
            kind,
            spans = aggregations.len(),
            "topology defined"
        );
        Ok(topology)
    }

    /// Replaces the whole aggregation set of a live topology.
    ///
    /// Retrying with the same input yields the same aggregation set and
    /// derived geometry.
    pub async fn redefine(
        &self,
        scope: &Scope,
        id: &str,
        spans: &[Span],
        offset: Option<f64>,
    ) -> NetworkResult<Topology> {
        let current = self.authorize(scope, id).await?;
        if current.deleted {
            return Err(TopologyError::not_found("topology", id));
        }
        let offset = offset.unwrap_or(current.offset);
        check_offset(offset)?;
        let aggregations = self.build_aggregations(scope, id, spans).await?;

        let expected = current.revision;
        let next = Topology {
            offset,
            revision: expected + 1,
            updated_at: Utc::now(),
            ..current
        };
        if !self
            .store
            .replace_aggregations(&next, &aggregations, expected)
            .await?
        {
            tracing::warn!(
                topology = %id,
                revision = expected,
                "topology redefine lost a revision race"
            );
            return Err(TopologyError::conflict("topology", id));
        }
        tracing::info!(
            topology = %id,
            revision = next.revision,
            spans = aggregations.len(),
            "topology redefined"
        );
        Ok(next)
    }

    /// Flags the topology deleted. Aggregation rows stay so the historical
    /// geometry can still be resolved.
    pub async fn soft_delete(&self, scope: &Scope, id: &str) -> NetworkResult<()> {
        let topology = self.authorize(scope, id).await?;
        if !topology.deleted
            && !self
                .store
                .set_topology_deleted(id, true, Utc::now())
                .await?
        {
            return Err(TopologyError::not_found("topology", id));
        }
        tracing::info!(topology = %id, "topology soft-deleted");
        Ok(())
    }

    /// Loads the topology and checks that `scope` may write to every path it
    /// currently sits on.
    pub async fn authorize(&self, scope: &Scope, id: &str) -> NetworkResult<Topology> {
        let topology = self.get(id).await?;
        let aggregations = self.store.get_aggregations(id).await?;
        let paths = self.load_paths(&aggregations).await?;
        check_scope(scope, &paths)?;
        Ok(topology)
    }

    pub async fn get(&self, id: &str) -> NetworkResult<Topology> {
        self.store
            .get_topology(id)
            .await?
            .ok_or_else(|| TopologyError::not_found("topology", id))
    }

    pub async fn aggregations(&self, id: &str) -> NetworkResult<Vec<PathAggregation>> {
        self.get(id).await?;
        Ok(self.store.get_aggregations(id).await?)
    }

    /// Reads the topology and derives its geometry from the current paths.
    pub async fn resolve(&self, scope: &Scope, id: &str) -> NetworkResult<ResolvedTopology> {
        let topology = self.get(id).await?;
        let aggregations = self.store.get_aggregations(id).await?;
        let paths = self.load_paths(&aggregations).await?;
        check_scope(scope, &paths)?;
        let DerivedGeometry { geometry, length } =
            self.cache
                .get_or_derive(&topology, &aggregations, &paths, self.tolerance)?;
        tracing::debug!(topology = %id, length, "topology resolved");
        Ok(ResolvedTopology {
            topology,
            aggregations,
            geometry,
            length,
        })
    }

    async fn load_paths(
        &self,
        aggregations: &[PathAggregation],
    ) -> NetworkResult<HashMap<String, Path>> {
        let mut ids: Vec<String> = aggregations.iter().map(|a| a.path_id.clone()).collect();
        ids.sort();
        ids.dedup();
        let paths = self.store.get_paths(&ids).await?;
        Ok(paths.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    async fn build_aggregations(
        &self,
        scope: &Scope,
        topology_id: &str,
        spans: &[Span],
    ) -> NetworkResult<Vec<PathAggregation>> {
        if spans.is_empty() {
            return Err(TopologyError::EmptySequence);
        }
        let mut ids: Vec<String> = spans.iter().map(|s| s.path_id.clone()).collect();
        ids.sort();
        ids.dedup();
        let paths: HashMap<String, Path> = self
            .store
            .get_paths(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut pieces = Vec::with_capacity(spans.len());
        for span in spans {
            check_position(&span.path_id, span.start)?;
            check_position(&span.path_id, span.end)?;
            let path = paths
                .get(&span.path_id)
                .ok_or_else(|| TopologyError::UnknownPath(span.path_id.clone()))?;
            if !path.valid {
                return Err(TopologyError::invalid_path(
                    &span.path_id,
                    "path is marked invalid",
                ));
            }
            scope.check(&path.structure)?;
            pieces.push(path.geometry.substring(span.start, span.end));
        }
        stitch(&pieces, self.tolerance)?;

        Ok(spans
            .iter()
            .enumerate()
            .map(|(ordinal, span)| PathAggregation {
                topology_id: topology_id.to_string(),
                path_id: span.path_id.clone(),
                ordinal: ordinal as i64,
                start_position: span.start,
                end_position: span.end,
            })
            .collect())
    }
}

fn check_position(path_id: &str, position: f64) -> NetworkResult<()> {
    if position.is_finite() && (0.0..=1.0).contains(&position) {
        Ok(())
    } else {
        Err(TopologyError::invalid_path(
            path_id,
            format!("position {} is outside [0, 1]", position),
        ))
    }
}

fn check_offset(offset: f64) -> NetworkResult<()> {
    if offset.is_finite() {
        Ok(())
    } else {
        Err(TopologyError::InvalidGeometry(format!(
            "offset must be finite, got {}",
            offset
        )))
    }
}

fn check_scope(scope: &Scope, paths: &HashMap<String, Path>) -> NetworkResult<()> {
    let mut owners: Vec<&str> = paths.values().map(|p| p.structure.as_str()).collect();
    owners.sort();
    owners.dedup();
    owners.into_iter().try_for_each(|owner| scope.check(owner))
}
