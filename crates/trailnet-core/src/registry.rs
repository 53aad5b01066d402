//! Path registry: create, edit, and soft-invalidate network segments.
//!
//! Every geometry write recomputes the path's [`PathStats`](crate::models::PathStats)
//! through the configured [`TerrainModel`] before it is stored, so readers
//! never see stats for a previous geometry. Updates are optimistic: the
//! write only lands if the stored version is still the one that was read.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::error::{NetworkResult, TopologyError};
use crate::geometry::LineString;
use crate::models::Path;
use crate::scope::Scope;
use crate::store::Store;
use crate::terrain::TerrainModel;

/// Input for [`PathRegistry::create`].
#[derive(Debug, Clone, Default)]
pub struct NewPath {
    pub geometry: LineString,
    pub cadastre_geometry: Option<LineString>,
    pub name: Option<String>,
    pub comments: Option<String>,
}

/// Partial edit for [`PathRegistry::update`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct PathUpdate {
    pub geometry: Option<LineString>,
    pub cadastre_geometry: Option<LineString>,
    pub name: Option<String>,
    pub comments: Option<String>,
    pub valid: Option<bool>,
}

/// Result of a successful update.
#[derive(Debug, Clone, Serialize)]
pub struct PathUpdateOutcome {
    pub path: Path,
    pub geometry_changed: bool,
    /// Live topologies whose derived geometry follows this edit.
    pub affected_topologies: Vec<String>,
}

pub struct PathRegistry<S: Store + ?Sized> {
    store: Arc<S>,
    terrain: Arc<dyn TerrainModel>,
}

impl<S: Store + ?Sized> Clone for PathRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            terrain: Arc::clone(&self.terrain),
        }
    }
}

impl<S: Store + ?Sized> PathRegistry<S> {
    pub fn new(store: Arc<S>, terrain: Arc<dyn TerrainModel>) -> Self {
        Self { store, terrain }
    }

    pub async fn create(&self, scope: &Scope, new: NewPath) -> NetworkResult<Path> {
        new.geometry.validate()?;
        if let Some(cadastre) = &new.cadastre_geometry {
            cadastre.validate()?;
        }
        let now = Utc::now();
        let path = Path {
            id: uuid::Uuid::new_v4().to_string(),
            structure: scope.structure.clone(),
            stats: self.terrain.stats(&new.geometry),
            geometry: new.geometry,
            cadastre_geometry: new.cadastre_geometry,
            name: new.name,
            comments: new.comments,
            valid: true,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_path(&path).await?;
        tracing::info!(
            path = %path.id,
            structure = %path.structure,
            length = path.stats.length,
            "path created"
        );
        Ok(path)
    }

    pub async fn get(&self, scope: &Scope, id: &str) -> NetworkResult<Path> {
        let path = self
            .store
            .get_path(id)
            .await?
            .ok_or_else(|| TopologyError::not_found("path", id))?;
        scope.check(&path.structure)?;
        Ok(path)
    }

    /// Paths visible to `scope`: its own structure, or all when elevated.
    pub async fn list(&self, scope: &Scope) -> NetworkResult<Vec<Path>> {
        let filter = if scope.elevated {
            None
        } else {
            Some(scope.structure.as_str())
        };
        Ok(self.store.list_paths(filter).await?)
    }

    pub async fn update(
        &self,
        scope: &Scope,
        id: &str,
        update: PathUpdate,
    ) -> NetworkResult<PathUpdateOutcome> {
        let current = self.get(scope, id).await?;
        let mut next = current.clone();

        let mut geometry_changed = false;
        if let Some(geometry) = update.geometry {
            geometry.validate()?;
            if geometry != current.geometry {
                next.stats = self.terrain.stats(&geometry);
                next.geometry = geometry;
                geometry_changed = true;
            }
        }
        if let Some(cadastre) = update.cadastre_geometry {
            cadastre.validate()?;
            next.cadastre_geometry = Some(cadastre);
        }
        if update.name.is_some() {
            next.name = update.name;
        }
        if update.comments.is_some() {
            next.comments = update.comments;
        }
        if let Some(valid) = update.valid {
            next.valid = valid;
        }
        next.version = current.version + 1;
        next.updated_at = Utc::now();

        if !self.store.update_path(&next, current.version).await? {
            tracing::warn!(path = %id, version = current.version, "path update lost a version race");
            return Err(TopologyError::conflict("path", id));
        }

        let affected_topologies = if geometry_changed || next.valid != current.valid {
            self.store.topologies_on_path(id).await?
        } else {
            Vec::new()
        };
        tracing::info!(
            path = %id,
            version = next.version,
            geometry_changed,
            affected = affected_topologies.len(),
            "path updated"
        );
        Ok(PathUpdateOutcome {
            path: next,
            geometry_changed,
            affected_topologies,
        })
    }

    /// Marks the path invalid. The row is kept; topologies referencing it
    /// report a dangling reference on their next read.
    pub async fn invalidate(&self, scope: &Scope, id: &str) -> NetworkResult<Path> {
        let outcome = self
            .update(
                scope,
                id,
                PathUpdate {
                    valid: Some(false),
                    ..PathUpdate::default()
                },
            )
            .await?;
        Ok(outcome.path)
    }
}
