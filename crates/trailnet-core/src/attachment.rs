//! Domain attachments: business entities that own a network position.
//!
//! Infrastructures and interventions hold a topology id; positional behavior
//! lives entirely in the [`TopologyComposer`]. An intervention created on an
//! infrastructure shares that infrastructure's topology and cannot move it.

use std::sync::Arc;

use chrono::Utc;

use crate::composer::{ResolvedTopology, TopologyComposer};
use crate::error::{NetworkResult, TopologyError};
use crate::models::{Infrastructure, Intervention, Span, KIND_INTERVENTION};
use crate::scope::Scope;
use crate::store::Store;

pub struct AttachmentRegistry<S: Store + ?Sized> {
    store: Arc<S>,
    composer: TopologyComposer<S>,
}

impl<S: Store + ?Sized> Clone for AttachmentRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            composer: self.composer.clone(),
        }
    }
}

impl<S: Store + ?Sized> AttachmentRegistry<S> {
    pub fn new(store: Arc<S>, composer: TopologyComposer<S>) -> Self {
        Self { store, composer }
    }

    pub async fn create_infrastructure(
        &self,
        scope: &Scope,
        name: &str,
        kind: i64,
        spans: &[Span],
        offset: f64,
    ) -> NetworkResult<Infrastructure> {
        let topology = self.composer.define(scope, spans, offset, kind).await?;
        let now = Utc::now();
        let infrastructure = Infrastructure {
            id: uuid::Uuid::new_v4().to_string(),
            structure: scope.structure.clone(),
            name: name.to_string(),
            kind,
            topology_id: topology.id,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = self.store.upsert_infrastructure(&infrastructure).await {
            self.discard_topology(scope, &infrastructure.topology_id).await;
            return Err(e.into());
        }
        tracing::info!(infrastructure = %infrastructure.id, "infrastructure created");
        Ok(infrastructure)
    }

    pub async fn create_intervention(
        &self,
        scope: &Scope,
        name: &str,
        comments: Option<String>,
        spans: &[Span],
        offset: f64,
    ) -> NetworkResult<Intervention> {
        let topology = self
            .composer
            .define(scope, spans, offset, KIND_INTERVENTION)
            .await?;
        let intervention = new_intervention(scope, name, comments, topology.id, None);
        if let Err(e) = self.store.upsert_intervention(&intervention).await {
            self.discard_topology(scope, &intervention.topology_id).await;
            return Err(e.into());
        }
        tracing::info!(intervention = %intervention.id, "intervention created");
        Ok(intervention)
    }

    /// Creates an intervention positioned on an existing infrastructure.
    pub async fn create_intervention_on_infrastructure(
        &self,
        scope: &Scope,
        name: &str,
        comments: Option<String>,
        infrastructure_id: &str,
    ) -> NetworkResult<Intervention> {
        let infrastructure = self.live_infrastructure(scope, infrastructure_id).await?;
        let intervention = new_intervention(
            scope,
            name,
            comments,
            infrastructure.topology_id,
            Some(infrastructure.id),
        );
        self.store.upsert_intervention(&intervention).await?;
        tracing::info!(
            intervention = %intervention.id,
            infrastructure = %infrastructure_id,
            "intervention created on infrastructure"
        );
        Ok(intervention)
    }

    /// Binds an existing intervention to an infrastructure. The intervention
    /// adopts the infrastructure's topology; its own topology, if any, is
    /// soft-deleted. The caller must be allowed to delete that topology
    /// before anything is rebound.
    pub async fn set_infrastructure(
        &self,
        scope: &Scope,
        intervention_id: &str,
        infrastructure_id: &str,
    ) -> NetworkResult<Intervention> {
        let mut intervention = self.live_intervention(scope, intervention_id).await?;
        let infrastructure = self.live_infrastructure(scope, infrastructure_id).await?;
        let previous = (!intervention.on_infrastructure()).then(|| intervention.topology_id.clone());
        if let Some(own) = &previous {
            self.composer.authorize(scope, own).await?;
        }

        intervention.topology_id = infrastructure.topology_id;
        intervention.infrastructure_id = Some(infrastructure.id);
        intervention.updated_at = Utc::now();
        self.store.upsert_intervention(&intervention).await?;
        if let Some(own) = previous {
            self.composer.soft_delete(scope, &own).await?;
        }
        Ok(intervention)
    }

    pub async fn reposition_intervention(
        &self,
        scope: &Scope,
        id: &str,
        spans: &[Span],
        offset: Option<f64>,
    ) -> NetworkResult<Intervention> {
        let mut intervention = self.live_intervention(scope, id).await?;
        if let Some(owner) = &intervention.infrastructure_id {
            return Err(TopologyError::ReadOnlyPosition {
                entity: "intervention",
                id: id.to_string(),
                owner: owner.clone(),
            });
        }
        self.composer
            .redefine(scope, &intervention.topology_id, spans, offset)
            .await?;
        intervention.updated_at = Utc::now();
        self.store.upsert_intervention(&intervention).await?;
        Ok(intervention)
    }

    pub async fn reposition_infrastructure(
        &self,
        scope: &Scope,
        id: &str,
        spans: &[Span],
        offset: Option<f64>,
    ) -> NetworkResult<Infrastructure> {
        let mut infrastructure = self.live_infrastructure(scope, id).await?;
        self.composer
            .redefine(scope, &infrastructure.topology_id, spans, offset)
            .await?;
        infrastructure.updated_at = Utc::now();
        self.store.upsert_infrastructure(&infrastructure).await?;
        Ok(infrastructure)
    }

    pub async fn get_intervention(&self, scope: &Scope, id: &str) -> NetworkResult<Intervention> {
        let intervention = self
            .store
            .get_intervention(id)
            .await?
            .ok_or_else(|| TopologyError::not_found("intervention", id))?;
        scope.check(&intervention.structure)?;
        Ok(intervention)
    }

    pub async fn get_infrastructure(
        &self,
        scope: &Scope,
        id: &str,
    ) -> NetworkResult<Infrastructure> {
        let infrastructure = self
            .store
            .get_infrastructure(id)
            .await?
            .ok_or_else(|| TopologyError::not_found("infrastructure", id))?;
        scope.check(&infrastructure.structure)?;
        Ok(infrastructure)
    }

    async fn live_intervention(&self, scope: &Scope, id: &str) -> NetworkResult<Intervention> {
        let intervention = self.get_intervention(scope, id).await?;
        if intervention.deleted {
            return Err(TopologyError::not_found("intervention", id));
        }
        Ok(intervention)
    }

    async fn live_infrastructure(&self, scope: &Scope, id: &str) -> NetworkResult<Infrastructure> {
        let infrastructure = self.get_infrastructure(scope, id).await?;
        if infrastructure.deleted {
            return Err(TopologyError::not_found("infrastructure", id));
        }
        Ok(infrastructure)
    }

    pub async fn locate_intervention(
        &self,
        scope: &Scope,
        id: &str,
    ) -> NetworkResult<ResolvedTopology> {
        let intervention = self.get_intervention(scope, id).await?;
        self.composer.resolve(scope, &intervention.topology_id).await
    }

    pub async fn locate_infrastructure(
        &self,
        scope: &Scope,
        id: &str,
    ) -> NetworkResult<ResolvedTopology> {
        let infrastructure = self.get_infrastructure(scope, id).await?;
        self.composer.resolve(scope, &infrastructure.topology_id).await
    }

    /// Soft-deletes the intervention, and its topology when it owns one.
    pub async fn delete_intervention(&self, scope: &Scope, id: &str) -> NetworkResult<()> {
        let mut intervention = self.get_intervention(scope, id).await?;
        if !intervention.on_infrastructure() {
            self.composer
                .soft_delete(scope, &intervention.topology_id)
                .await?;
        }
        intervention.deleted = true;
        intervention.updated_at = Utc::now();
        self.store.upsert_intervention(&intervention).await?;
        Ok(())
    }

    /// Soft-deletes the infrastructure and its topology. Interventions on it
    /// keep resolving the historical position.
    pub async fn delete_infrastructure(&self, scope: &Scope, id: &str) -> NetworkResult<()> {
        let mut infrastructure = self.get_infrastructure(scope, id).await?;
        self.composer
            .soft_delete(scope, &infrastructure.topology_id)
            .await?;
        infrastructure.deleted = true;
        infrastructure.updated_at = Utc::now();
        self.store.upsert_infrastructure(&infrastructure).await?;
        Ok(())
    }

    async fn discard_topology(&self, scope: &Scope, topology_id: &str) {
        if let Err(e) = self.composer.soft_delete(scope, topology_id).await {
            tracing::warn!(topology = %topology_id, error = %e, "could not discard orphan topology");
        }
    }
}

fn new_intervention(
    scope: &Scope,
    name: &str,
    comments: Option<String>,
    topology_id: String,
    infrastructure_id: Option<String>,
) -> Intervention {
    let now = Utc::now();
    Intervention {
        id: uuid::Uuid::new_v4().to_string(),
        structure: scope.structure.clone(),
        name: name.to_string(),
        comments,
        topology_id,
        infrastructure_id,
        deleted: false,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::ResolvedGeometry;
    use crate::geometry::{Coord, LineString};
    use crate::models::{Path, KIND_INFRASTRUCTURE, KIND_SIGNAGE};
    use crate::registry::{NewPath, PathRegistry};
    use crate::store::memory::InMemoryStore;
    use crate::terrain::FlatTerrain;

    struct Fixture {
        paths: PathRegistry<InMemoryStore>,
        composer: TopologyComposer<InMemoryStore>,
        attachments: AttachmentRegistry<InMemoryStore>,
        scope: Scope,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let composer = TopologyComposer::new(Arc::clone(&store), 1e-6);
        Fixture {
            paths: PathRegistry::new(Arc::clone(&store), Arc::new(FlatTerrain)),
            attachments: AttachmentRegistry::new(Arc::clone(&store), composer.clone()),
            composer,
            scope: Scope::new("north"),
        }
    }

    async fn straight_path(f: &Fixture) -> Path {
        f.paths
            .create(
                &f.scope,
                NewPath {
                    geometry: LineString::new(vec![Coord::xy(0.0, 0.0), Coord::xy(10.0, 0.0)]),
                    ..NewPath::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_intervention_on_infrastructure_shares_position() {
        let f = fixture();
        let p = straight_path(&f).await;
        let bridge = f
            .attachments
            .create_infrastructure(&f.scope, "bridge", KIND_INFRASTRUCTURE, &[Span::point(&p.id, 0.3)], 0.0)
            .await
            .unwrap();
        let repair = f
            .attachments
            .create_intervention_on_infrastructure(&f.scope, "repair deck", None, &bridge.id)
            .await
            .unwrap();
        assert!(repair.on_infrastructure());
        assert_eq!(repair.topology_id, bridge.topology_id);

        let located = f
            .attachments
            .locate_intervention(&f.scope, &repair.id)
            .await
            .unwrap();
        assert_eq!(located.geometry, ResolvedGeometry::Point(Coord::xy(3.0, 0.0)));
        assert_eq!(located.topology.kind, KIND_INFRASTRUCTURE);
    }

    #[tokio::test]
    async fn test_intervention_on_infrastructure_cannot_move() {
        let f = fixture();
        let p = straight_path(&f).await;
        let bridge = f
            .attachments
            .create_infrastructure(&f.scope, "bridge", KIND_INFRASTRUCTURE, &[Span::point(&p.id, 0.3)], 0.0)
            .await
            .unwrap();
        let repair = f
            .attachments
            .create_intervention_on_infrastructure(&f.scope, "repair", None, &bridge.id)
            .await
            .unwrap();
        let err = f
            .attachments
            .reposition_intervention(&f.scope, &repair.id, &[Span::point(&p.id, 0.9)], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "read_only_position");
    }

    #[tokio::test]
    async fn test_reposition_infrastructure_moves_attached_interventions() {
        let f = fixture();
        let p = straight_path(&f).await;
        let sign = f
            .attachments
            .create_infrastructure(&f.scope, "signpost", KIND_INFRASTRUCTURE, &[Span::point(&p.id, 0.3)], 0.0)
            .await
            .unwrap();
        let repaint = f
            .attachments
            .create_intervention_on_infrastructure(&f.scope, "repaint", None, &sign.id)
            .await
            .unwrap();
        f.attachments
            .reposition_infrastructure(&f.scope, &sign.id, &[Span::point(&p.id, 0.7)], None)
            .await
            .unwrap();
        let located = f
            .attachments
            .locate_intervention(&f.scope, &repaint.id)
            .await
            .unwrap();
        assert_eq!(located.geometry, ResolvedGeometry::Point(Coord::xy(7.0, 0.0)));
    }

    #[tokio::test]
    async fn test_set_infrastructure_retires_own_topology() {
        let f = fixture();
        let p = straight_path(&f).await;
        let mowing = f
            .attachments
            .create_intervention(&f.scope, "mowing", Some("both verges".into()), &[Span::new(&p.id, 0.0, 0.5)], 0.0)
            .await
            .unwrap();
        let own_topology = mowing.topology_id.clone();
        let wall = f
            .attachments
            .create_infrastructure(&f.scope, "wall", KIND_INFRASTRUCTURE, &[Span::new(&p.id, 0.5, 1.0)], 1.0)
            .await
            .unwrap();

        let moved = f
            .attachments
            .set_infrastructure(&f.scope, &mowing.id, &wall.id)
            .await
            .unwrap();
        assert_eq!(moved.topology_id, wall.topology_id);
        assert!(f.composer.get(&own_topology).await.unwrap().deleted);

        let located = f.attachments.locate_intervention(&f.scope, &mowing.id).await.unwrap();
        assert_eq!(
            located.geometry.coords(),
            vec![Coord::xy(5.0, 1.0), Coord::xy(10.0, 1.0)]
        );
    }

    #[tokio::test]
    async fn test_reposition_own_intervention() {
        let f = fixture();
        let p = straight_path(&f).await;
        let iv = f
            .attachments
            .create_intervention(&f.scope, "drainage", None, &[Span::new(&p.id, 0.0, 0.2)], 0.0)
            .await
            .unwrap();
        f.attachments
            .reposition_intervention(&f.scope, &iv.id, &[Span::new(&p.id, 0.6, 0.4)], None)
            .await
            .unwrap();
        let located = f.attachments.locate_intervention(&f.scope, &iv.id).await.unwrap();
        assert_eq!(
            located.geometry.coords(),
            vec![Coord::xy(6.0, 0.0), Coord::xy(4.0, 0.0)]
        );
        assert_eq!(located.topology.kind, KIND_INTERVENTION);
    }

    #[tokio::test]
    async fn test_attachment_scope_enforced() {
        let f = fixture();
        let p = straight_path(&f).await;
        let iv = f
            .attachments
            .create_intervention(&f.scope, "fence", None, &[Span::new(&p.id, 0.0, 1.0)], 0.0)
            .await
            .unwrap();
        let err = f
            .attachments
            .get_intervention(&Scope::new("south"), &iv.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "scope_violation");
    }

    #[tokio::test]
    async fn test_delete_intervention_keeps_shared_topology() {
        let f = fixture();
        let p = straight_path(&f).await;
        let bridge = f
            .attachments
            .create_infrastructure(&f.scope, "bridge", KIND_INFRASTRUCTURE, &[Span::point(&p.id, 0.5)], 0.0)
            .await
            .unwrap();
        let iv = f
            .attachments
            .create_intervention_on_infrastructure(&f.scope, "inspect", None, &bridge.id)
            .await
            .unwrap();
        f.attachments.delete_intervention(&f.scope, &iv.id).await.unwrap();
        assert!(f.attachments.get_intervention(&f.scope, &iv.id).await.unwrap().deleted);
        assert!(!f.composer.get(&bridge.topology_id).await.unwrap().deleted);

        f.attachments.delete_infrastructure(&f.scope, &bridge.id).await.unwrap();
        assert!(f.composer.get(&bridge.topology_id).await.unwrap().deleted);
    }

    #[tokio::test]
    async fn test_infrastructure_records_its_kind() {
        let f = fixture();
        let p = straight_path(&f).await;
        let sign = f
            .attachments
            .create_infrastructure(&f.scope, "signpost", KIND_SIGNAGE, &[Span::point(&p.id, 0.2)], 0.0)
            .await
            .unwrap();
        assert_eq!(sign.kind, KIND_SIGNAGE);
        assert_eq!(f.composer.get(&sign.topology_id).await.unwrap().kind, KIND_SIGNAGE);
        let stored = f.attachments.get_infrastructure(&f.scope, &sign.id).await.unwrap();
        assert_eq!(stored.kind, KIND_SIGNAGE);
    }

    #[tokio::test]
    async fn test_deleted_infrastructure_takes_no_new_interventions() {
        let f = fixture();
        let p = straight_path(&f).await;
        let bridge = f
            .attachments
            .create_infrastructure(&f.scope, "bridge", KIND_INFRASTRUCTURE, &[Span::point(&p.id, 0.5)], 0.0)
            .await
            .unwrap();
        let mowing = f
            .attachments
            .create_intervention(&f.scope, "mowing", None, &[Span::new(&p.id, 0.0, 0.5)], 0.0)
            .await
            .unwrap();
        f.attachments.delete_infrastructure(&f.scope, &bridge.id).await.unwrap();

        let err = f
            .attachments
            .create_intervention_on_infrastructure(&f.scope, "inspect", None, &bridge.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");

        let err = f
            .attachments
            .set_infrastructure(&f.scope, &mowing.id, &bridge.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        let unchanged = f.attachments.get_intervention(&f.scope, &mowing.id).await.unwrap();
        assert_eq!(unchanged.topology_id, mowing.topology_id);
        assert!(!f.composer.get(&mowing.topology_id).await.unwrap().deleted);
    }

    #[tokio::test]
    async fn test_deleted_intervention_cannot_be_rebound() {
        let f = fixture();
        let p = straight_path(&f).await;
        let wall = f
            .attachments
            .create_infrastructure(&f.scope, "wall", KIND_INFRASTRUCTURE, &[Span::new(&p.id, 0.5, 1.0)], 0.0)
            .await
            .unwrap();
        let iv = f
            .attachments
            .create_intervention(&f.scope, "fence", None, &[Span::new(&p.id, 0.0, 0.5)], 0.0)
            .await
            .unwrap();
        f.attachments.delete_intervention(&f.scope, &iv.id).await.unwrap();

        let err = f
            .attachments
            .set_infrastructure(&f.scope, &iv.id, &wall.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        let err = f
            .attachments
            .reposition_intervention(&f.scope, &iv.id, &[Span::new(&p.id, 0.0, 0.2)], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        let stored = f.attachments.get_intervention(&f.scope, &iv.id).await.unwrap();
        assert!(stored.infrastructure_id.is_none());
    }

    #[tokio::test]
    async fn test_set_infrastructure_checks_scope_before_rebinding() {
        let f = fixture();
        let south = Scope::new("south");
        let north_path = straight_path(&f).await;
        let south_path = f
            .paths
            .create(
                &south,
                NewPath {
                    geometry: LineString::new(vec![Coord::xy(0.0, 5.0), Coord::xy(10.0, 5.0)]),
                    ..NewPath::default()
                },
            )
            .await
            .unwrap();
        // placed across the boundary with administrative access
        let survey = f
            .attachments
            .create_intervention(
                &Scope::elevated("north"),
                "survey",
                None,
                &[Span::new(&south_path.id, 0.0, 1.0)],
                0.0,
            )
            .await
            .unwrap();
        let gate = f
            .attachments
            .create_infrastructure(&f.scope, "gate", KIND_INFRASTRUCTURE, &[Span::point(&north_path.id, 0.5)], 0.0)
            .await
            .unwrap();

        let err = f
            .attachments
            .set_infrastructure(&f.scope, &survey.id, &gate.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "scope_violation");

        let stored = f.attachments.get_intervention(&f.scope, &survey.id).await.unwrap();
        assert_eq!(stored.topology_id, survey.topology_id);
        assert!(stored.infrastructure_id.is_none());
        assert!(!f.composer.get(&survey.topology_id).await.unwrap().deleted);
    }
}
