//! Wiring of the core services to the SQLite store.
//!
//! A [`Session`] is what every CLI command runs against: the three network
//! services over one connection pool, plus the caller's [`Scope`].

use anyhow::{anyhow, Result};
use std::sync::Arc;

use trailnet_core::models::TopologyKind;
use trailnet_core::store::Store;
use trailnet_core::terrain::{terrain_model, TerrainModel};
use trailnet_core::{Network, Scope};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub struct Session {
    pub network: Network<SqliteStore>,
    pub scope: Scope,
    store: Arc<SqliteStore>,
}

impl Session {
    /// Opens the database and builds the caller scope. `structure` falls
    /// back to `[scope].structure` from the config.
    pub async fn open(config: &Config, structure: Option<&str>, elevated: bool) -> Result<Self> {
        let terrain: Arc<dyn TerrainModel> = terrain_model(&config.terrain.provider)
            .map(Arc::from)
            .ok_or_else(|| anyhow!("unknown terrain provider: {}", config.terrain.provider))?;

        let pool = db::connect(config).await?;
        let store = Arc::new(SqliteStore::new(pool));
        let network = Network::new(Arc::clone(&store), terrain, config.geometry.tolerance);

        let structure = structure.unwrap_or(&config.scope.structure);
        let scope = if elevated {
            Scope::elevated(structure)
        } else {
            Scope::new(structure)
        };
        tracing::debug!(structure = %scope.structure, elevated, "session opened");

        Ok(Self {
            network,
            scope,
            store,
        })
    }

    pub async fn kinds(&self) -> Result<Vec<TopologyKind>> {
        self.store.list_kinds().await
    }

    pub async fn close(self) {
        self.store.pool().close().await;
    }
}
