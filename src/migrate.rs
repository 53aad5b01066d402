//! Database schema migrations (idempotent).
//!
//! Creates the four network relations (`paths`, `topology_kinds`,
//! `topologies`, `path_aggregations`) plus the attachment relations, and
//! seeds the configured topology kinds. Running it twice is safe.

use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Geometries are stored as JSON coordinate arrays.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS paths (
            id TEXT PRIMARY KEY,
            structure TEXT NOT NULL,
            geometry TEXT NOT NULL,
            cadastre_geometry TEXT,
            name TEXT,
            comments TEXT,
            valid INTEGER NOT NULL DEFAULT 1,
            length REAL NOT NULL DEFAULT 0,
            ascent REAL NOT NULL DEFAULT 0,
            descent REAL NOT NULL DEFAULT 0,
            min_elevation REAL NOT NULL DEFAULT 0,
            max_elevation REAL NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topology_kinds (
            code INTEGER PRIMARY KEY,
            label TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topologies (
            id TEXT PRIMARY KEY,
            lateral_offset REAL NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            kind INTEGER NOT NULL,
            revision INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (kind) REFERENCES topology_kinds(code)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS path_aggregations (
            topology_id TEXT NOT NULL,
            path_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            start_position REAL NOT NULL,
            end_position REAL NOT NULL,
            PRIMARY KEY (topology_id, ordinal),
            FOREIGN KEY (topology_id) REFERENCES topologies(id),
            FOREIGN KEY (path_id) REFERENCES paths(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS infrastructures (
            id TEXT PRIMARY KEY,
            structure TEXT NOT NULL,
            name TEXT NOT NULL,
            kind INTEGER NOT NULL,
            topology_id TEXT NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (kind) REFERENCES topology_kinds(code),
            FOREIGN KEY (topology_id) REFERENCES topologies(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interventions (
            id TEXT PRIMARY KEY,
            structure TEXT NOT NULL,
            name TEXT NOT NULL,
            comments TEXT,
            topology_id TEXT NOT NULL,
            infrastructure_id TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (topology_id) REFERENCES topologies(id),
            FOREIGN KEY (infrastructure_id) REFERENCES infrastructures(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_path_aggregations_path_id ON path_aggregations(path_id)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_paths_structure ON paths(structure)")
        .execute(&pool)
        .await?;

    // Seed kinds; labels follow the config on every run.
    for kind in config.topology_kinds() {
        sqlx::query(
            r#"
            INSERT INTO topology_kinds (code, label) VALUES (?, ?)
            ON CONFLICT(code) DO UPDATE SET label = excluded.label
            "#,
        )
        .bind(kind.code)
        .bind(&kind.label)
        .execute(&pool)
        .await?;
    }

    pool.close().await;
    Ok(())
}
