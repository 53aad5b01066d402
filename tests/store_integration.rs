//! Integration tests for the SQLite store behind the network services.
//!
//! These run the real migrations against a temporary database and drive the
//! core registry, composer and attachments through `SqliteStore`.

use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;

use trailnet::config::{parse_config, Config};
use trailnet::sqlite_store::SqliteStore;
use trailnet::{db, migrate};
use trailnet_core::derive::ResolvedGeometry;
use trailnet_core::geometry::{Coord, LineString};
use trailnet_core::models::{Span, KIND_INTERVENTION, KIND_SIGNAGE};
use trailnet_core::registry::{NewPath, PathUpdate};
use trailnet_core::store::Store;
use trailnet_core::terrain::ElevationProfile;
use trailnet_core::{Network, Scope, TopologyError};

fn test_config(tmp: &TempDir) -> Config {
    let content = format!(
        "[db]\npath = \"{}/net.sqlite\"\n\n[scope]\nstructure = \"north\"\n",
        tmp.path().display()
    );
    parse_config(&content).unwrap()
}

async fn open(tmp: &TempDir) -> (Arc<SqliteStore>, Network<SqliteStore>) {
    let cfg = test_config(tmp);
    migrate::run_migrations(&cfg).await.unwrap();
    let pool = db::connect(&cfg).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let network = Network::new(Arc::clone(&store), Arc::new(ElevationProfile), 0.001);
    (store, network)
}

fn line(points: &[(f64, f64)]) -> LineString {
    LineString::new(points.iter().map(|(x, y)| Coord::xy(*x, *y)).collect())
}

fn new_path(points: &[(f64, f64)]) -> NewPath {
    NewPath {
        geometry: line(points),
        ..NewPath::default()
    }
}

fn assert_line(geometry: &ResolvedGeometry, expected: &[(f64, f64)]) {
    let coords = geometry.coords();
    assert_eq!(coords.len(), expected.len(), "got {:?}", coords);
    for (c, (x, y)) in coords.iter().zip(expected) {
        assert!((c.x - x).abs() < 1e-9 && (c.y - y).abs() < 1e-9, "got {:?}", coords);
    }
}

#[tokio::test]
async fn test_path_round_trip_through_sqlite() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let created = network
        .paths
        .create(
            &scope,
            NewPath {
                geometry: LineString::new(vec![
                    Coord::xyz(0.0, 0.0, 100.0),
                    Coord::xyz(6.0, 8.0, 120.0),
                ]),
                cadastre_geometry: Some(line(&[(0.0, 1.0), (6.0, 9.0)])),
                name: Some("Ridge".to_string()),
                comments: None,
            },
        )
        .await
        .unwrap();

    let loaded = store.get_path(&created.id).await.unwrap().unwrap();
    assert_eq!(loaded.geometry, created.geometry);
    assert_eq!(loaded.cadastre_geometry, created.cadastre_geometry);
    assert_eq!(loaded.name.as_deref(), Some("Ridge"));
    assert_eq!(loaded.stats, created.stats);
    assert_eq!(loaded.stats.length, 10.0);
    assert_eq!(loaded.stats.ascent, 20.0);
    assert_eq!(loaded.version, 1);
    assert_eq!(
        loaded.created_at.timestamp_millis(),
        created.created_at.timestamp_millis()
    );
}

#[tokio::test]
async fn test_scenario_edit_moves_topology() {
    let tmp = TempDir::new().unwrap();
    let (_store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let path = network
        .paths
        .create(&scope, new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();
    let topology = network
        .topologies
        .define(&scope, &[Span::new(&path.id, 0.2, 0.8)], 0.0, KIND_INTERVENTION)
        .await
        .unwrap();

    let resolved = network.topologies.resolve(&scope, &topology.id).await.unwrap();
    assert_line(&resolved.geometry, &[(2.0, 0.0), (8.0, 0.0)]);
    assert!((resolved.length - 6.0).abs() < 1e-9);

    let outcome = network
        .paths
        .update(
            &scope,
            &path.id,
            PathUpdate {
                geometry: Some(line(&[(0.0, 0.0), (20.0, 0.0)])),
                ..PathUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.affected_topologies, vec![topology.id.clone()]);

    let resolved = network.topologies.resolve(&scope, &topology.id).await.unwrap();
    assert_line(&resolved.geometry, &[(4.0, 0.0), (16.0, 0.0)]);
    assert!((resolved.length - 12.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_multi_path_topology_keeps_ordinals() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let a = network
        .paths
        .create(&scope, new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();
    let b = network
        .paths
        .create(&scope, new_path(&[(10.0, 10.0), (10.0, 0.0)]))
        .await
        .unwrap();

    // Along a, then up b against its direction.
    let topology = network
        .topologies
        .define(
            &scope,
            &[Span::new(&a.id, 0.5, 1.0), Span::new(&b.id, 1.0, 0.0)],
            0.0,
            KIND_INTERVENTION,
        )
        .await
        .unwrap();

    let aggregations = store.get_aggregations(&topology.id).await.unwrap();
    assert_eq!(aggregations.len(), 2);
    assert_eq!(aggregations[0].path_id, a.id);
    assert_eq!(aggregations[0].ordinal, 0);
    assert_eq!(aggregations[1].path_id, b.id);
    assert_eq!(aggregations[1].ordinal, 1);

    let resolved = network.topologies.resolve(&scope, &topology.id).await.unwrap();
    assert_line(&resolved.geometry, &[(5.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    assert!((resolved.length - 15.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_failed_redefine_leaves_aggregations() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let a = network
        .paths
        .create(&scope, new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();
    let far = network
        .paths
        .create(&scope, new_path(&[(50.0, 50.0), (60.0, 50.0)]))
        .await
        .unwrap();
    let topology = network
        .topologies
        .define(&scope, &[Span::new(&a.id, 0.0, 0.5)], 0.0, KIND_INTERVENTION)
        .await
        .unwrap();
    let before = store.get_aggregations(&topology.id).await.unwrap();

    let err = network
        .topologies
        .redefine(
            &scope,
            &topology.id,
            &[Span::new(&a.id, 0.0, 1.0), Span::new(&far.id, 0.0, 1.0)],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::Discontinuous { index: 1, .. }));

    assert_eq!(store.get_aggregations(&topology.id).await.unwrap(), before);
    let current = store.get_topology(&topology.id).await.unwrap().unwrap();
    assert_eq!(current.revision, 1);
}

#[tokio::test]
async fn test_redefine_replaces_whole_set() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let a = network
        .paths
        .create(&scope, new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();
    let b = network
        .paths
        .create(&scope, new_path(&[(10.0, 0.0), (20.0, 0.0)]))
        .await
        .unwrap();
    let topology = network
        .topologies
        .define(
            &scope,
            &[Span::new(&a.id, 0.0, 1.0), Span::new(&b.id, 0.0, 1.0)],
            0.0,
            KIND_INTERVENTION,
        )
        .await
        .unwrap();

    let next = network
        .topologies
        .redefine(&scope, &topology.id, &[Span::new(&b.id, 0.25, 0.75)], Some(1.0))
        .await
        .unwrap();
    assert_eq!(next.revision, 2);
    assert_eq!(next.offset, 1.0);

    let aggregations = store.get_aggregations(&topology.id).await.unwrap();
    assert_eq!(aggregations.len(), 1);
    assert_eq!(aggregations[0].path_id, b.id);
    assert!(store.topologies_on_path(&a.id).await.unwrap().is_empty());

    let resolved = network.topologies.resolve(&scope, &topology.id).await.unwrap();
    assert_line(&resolved.geometry, &[(12.5, 1.0), (17.5, 1.0)]);
}

#[tokio::test]
async fn test_stale_version_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let path = network
        .paths
        .create(&scope, new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();

    let mut edited = path.clone();
    edited.version = 2;
    edited.name = Some("first".to_string());
    assert!(store.update_path(&edited, 1).await.unwrap());

    let mut stale = path.clone();
    stale.version = 2;
    stale.name = Some("second".to_string());
    assert!(!store.update_path(&stale, 1).await.unwrap());

    let loaded = store.get_path(&path.id).await.unwrap().unwrap();
    assert_eq!(loaded.name.as_deref(), Some("first"));
    assert_eq!(loaded.version, 2);
}

#[tokio::test]
async fn test_scope_violation_leaves_path_unchanged() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;

    let path = network
        .paths
        .create(&Scope::new("north"), new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();

    let err = network
        .paths
        .update(
            &Scope::new("south"),
            &path.id,
            PathUpdate {
                geometry: Some(line(&[(0.0, 0.0), (30.0, 0.0)])),
                ..PathUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "scope_violation");

    let loaded = store.get_path(&path.id).await.unwrap().unwrap();
    assert_eq!(loaded.geometry, path.geometry);
    assert_eq!(loaded.version, 1);
}

#[tokio::test]
async fn test_list_paths_by_structure() {
    let tmp = TempDir::new().unwrap();
    let (_store, network) = open(&tmp).await;

    let north = Scope::new("north");
    let south = Scope::new("south");
    network
        .paths
        .create(&north, new_path(&[(0.0, 0.0), (1.0, 0.0)]))
        .await
        .unwrap();
    network
        .paths
        .create(&south, new_path(&[(0.0, 0.0), (2.0, 0.0)]))
        .await
        .unwrap();

    assert_eq!(network.paths.list(&north).await.unwrap().len(), 1);
    assert_eq!(network.paths.list(&south).await.unwrap().len(), 1);
    assert_eq!(
        network
            .paths
            .list(&Scope::elevated("north"))
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_soft_delete_keeps_history() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let path = network
        .paths
        .create(&scope, new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();
    let topology = network
        .topologies
        .define(&scope, &[Span::point(&path.id, 0.3)], 0.0, KIND_SIGNAGE)
        .await
        .unwrap();

    network
        .topologies
        .soft_delete(&scope, &topology.id)
        .await
        .unwrap();
    assert!(store.topologies_on_path(&path.id).await.unwrap().is_empty());

    let resolved = network.topologies.resolve(&scope, &topology.id).await.unwrap();
    assert!(resolved.topology.deleted);
    assert!(resolved.geometry.is_point());

    let err = network
        .topologies
        .redefine(&scope, &topology.id, &[Span::point(&path.id, 0.4)], None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_attachments_persist() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let path = network
        .paths
        .create(&scope, new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();
    let infrastructure = network
        .attachments
        .create_infrastructure(
            &scope,
            "Footbridge",
            trailnet_core::models::KIND_INFRASTRUCTURE,
            &[Span::new(&path.id, 0.4, 0.6)],
            0.0,
        )
        .await
        .unwrap();
    let intervention = network
        .attachments
        .create_intervention_on_infrastructure(
            &scope,
            "Replace planks",
            Some("winter".to_string()),
            &infrastructure.id,
        )
        .await
        .unwrap();

    let loaded = store
        .get_intervention(&intervention.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.infrastructure_id.as_deref(), Some(infrastructure.id.as_str()));
    assert_eq!(loaded.topology_id, infrastructure.topology_id);
    assert_eq!(loaded.comments.as_deref(), Some("winter"));
    let loaded_infrastructure = store
        .get_infrastructure(&infrastructure.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded_infrastructure.kind, trailnet_core::models::KIND_INFRASTRUCTURE);

    network
        .attachments
        .delete_infrastructure(&scope, &infrastructure.id)
        .await
        .unwrap();
    let located = network
        .attachments
        .locate_intervention(&scope, &intervention.id)
        .await
        .unwrap();
    assert!((located.length - 2.0).abs() < 1e-9);

    let stored = store
        .get_infrastructure(&infrastructure.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.deleted);
    assert!(stored.updated_at >= stored.created_at);
    assert!(stored.updated_at <= Utc::now());
}

#[tokio::test]
async fn test_replace_aggregations_checks_revision() {
    let tmp = TempDir::new().unwrap();
    let (store, network) = open(&tmp).await;
    let scope = Scope::new("north");

    let path = network
        .paths
        .create(&scope, new_path(&[(0.0, 0.0), (10.0, 0.0)]))
        .await
        .unwrap();
    let topology = network
        .topologies
        .define(&scope, &[Span::new(&path.id, 0.0, 1.0)], 0.0, KIND_INTERVENTION)
        .await
        .unwrap();
    network
        .topologies
        .redefine(&scope, &topology.id, &[Span::new(&path.id, 0.0, 0.5)], None)
        .await
        .unwrap();

    // a writer still holding revision 1
    let stale = trailnet_core::models::Topology {
        revision: 2,
        ..topology.clone()
    };
    let late = [trailnet_core::models::PathAggregation {
        topology_id: topology.id.clone(),
        path_id: path.id.clone(),
        ordinal: 0,
        start_position: 0.5,
        end_position: 1.0,
    }];
    assert!(!store
        .replace_aggregations(&stale, &late, 1)
        .await
        .unwrap());
    let aggs = store.get_aggregations(&topology.id).await.unwrap();
    assert_eq!(aggs[0].end_position, 0.5);

    network
        .topologies
        .soft_delete(&scope, &topology.id)
        .await
        .unwrap();
    let revived = trailnet_core::models::Topology {
        revision: 3,
        ..topology.clone()
    };
    assert!(!store
        .replace_aggregations(&revived, &late, 2)
        .await
        .unwrap());
    let stored = store.get_topology(&topology.id).await.unwrap().unwrap();
    assert!(stored.deleted);
    assert_eq!(stored.revision, 2);
}
