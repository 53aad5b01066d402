//! # trailnet core
//!
//! Shared, WASM-safe logic for trailnet: the path network model, linear
//! topologies positioned by fractional spans along paths, geometry
//! derivation, structure scoping, and the store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`geometry`] | Linestrings, interpolation, substrings, offset curves |
//! | [`models`] | Paths, topologies, aggregations, kinds, attachments |
//! | [`terrain`] | Path statistics from geometry |
//! | [`derive`] | Aggregation set → resolved geometry, with a version-keyed cache |
//! | [`registry`] | Path registry |
//! | [`composer`] | Topology composer |
//! | [`attachment`] | Interventions and infrastructures |
//! | [`scope`] | Structure-scoping capability |
//! | [`store`] | Store trait and in-memory backend |
//! | [`error`] | Error taxonomy |

pub mod attachment;
pub mod composer;
pub mod derive;
pub mod error;
pub mod geometry;
pub mod models;
pub mod registry;
pub mod scope;
pub mod store;
pub mod terrain;

use std::sync::Arc;

pub use error::{NetworkResult, TopologyError};
pub use scope::Scope;

use attachment::AttachmentRegistry;
use composer::TopologyComposer;
use registry::PathRegistry;
use store::Store;
use terrain::TerrainModel;

/// The three network services wired to one store.
pub struct Network<S: Store + ?Sized> {
    pub paths: PathRegistry<S>,
    pub topologies: TopologyComposer<S>,
    pub attachments: AttachmentRegistry<S>,
}

impl<S: Store + ?Sized> Network<S> {
    pub fn new(store: Arc<S>, terrain: Arc<dyn TerrainModel>, tolerance: f64) -> Self {
        let topologies = TopologyComposer::new(Arc::clone(&store), tolerance);
        Self {
            paths: PathRegistry::new(Arc::clone(&store), terrain),
            attachments: AttachmentRegistry::new(store, topologies.clone()),
            topologies,
        }
    }
}
