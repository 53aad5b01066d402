//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation to SQL against the schema created by
//! [`crate::migrate`]. Topology inserts and aggregation replacements run in
//! a single transaction, so a concurrent reader sees either the old set or
//! the new one. Path updates are a compare-and-swap on `version`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use trailnet_core::geometry::LineString;
use trailnet_core::models::{
    Infrastructure, Intervention, Path, PathAggregation, PathStats, Topology, TopologyKind,
};
use trailnet_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const PATH_COLUMNS: &str = "id, structure, geometry, cadastre_geometry, name, comments, valid, \
     length, ascent, descent, min_elevation, max_elevation, version, created_at, updated_at";

fn to_ts(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts).unwrap_or_default()
}

fn geometry_json(geometry: &LineString) -> Result<String> {
    Ok(serde_json::to_string(geometry)?)
}

fn parse_geometry(raw: &str, id: &str) -> Result<LineString> {
    serde_json::from_str(raw).with_context(|| format!("corrupt geometry for path {}", id))
}

fn path_from_row(row: &SqliteRow) -> Result<Path> {
    let id: String = row.get("id");
    let geometry: String = row.get("geometry");
    let cadastre: Option<String> = row.get("cadastre_geometry");
    Ok(Path {
        geometry: parse_geometry(&geometry, &id)?,
        cadastre_geometry: cadastre
            .as_deref()
            .map(|raw| parse_geometry(raw, &id))
            .transpose()?,
        structure: row.get("structure"),
        name: row.get("name"),
        comments: row.get("comments"),
        valid: row.get("valid"),
        stats: PathStats {
            length: row.get("length"),
            ascent: row.get("ascent"),
            descent: row.get("descent"),
            min_elevation: row.get("min_elevation"),
            max_elevation: row.get("max_elevation"),
        },
        version: row.get("version"),
        created_at: from_ts(row.get("created_at")),
        updated_at: from_ts(row.get("updated_at")),
        id,
    })
}

fn topology_from_row(row: &SqliteRow) -> Topology {
    Topology {
        id: row.get("id"),
        offset: row.get("lateral_offset"),
        deleted: row.get("deleted"),
        kind: row.get("kind"),
        revision: row.get("revision"),
        created_at: from_ts(row.get("created_at")),
        updated_at: from_ts(row.get("updated_at")),
    }
}

fn aggregation_from_row(row: &SqliteRow) -> PathAggregation {
    PathAggregation {
        topology_id: row.get("topology_id"),
        path_id: row.get("path_id"),
        ordinal: row.get("ordinal"),
        start_position: row.get("start_position"),
        end_position: row.get("end_position"),
    }
}

async fn insert_aggregations(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    aggregations: &[PathAggregation],
) -> Result<()> {
    for agg in aggregations {
        sqlx::query(
            "INSERT INTO path_aggregations (topology_id, path_id, ordinal, start_position, end_position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&agg.topology_id)
        .bind(&agg.path_id)
        .bind(agg.ordinal)
        .bind(agg.start_position)
        .bind(agg.end_position)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_path(&self, path: &Path) -> Result<()> {
        let cadastre = path
            .cadastre_geometry
            .as_ref()
            .map(geometry_json)
            .transpose()?;
        sqlx::query(&format!(
            "INSERT INTO paths ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PATH_COLUMNS
        ))
        .bind(&path.id)
        .bind(&path.structure)
        .bind(geometry_json(&path.geometry)?)
        .bind(cadastre)
        .bind(&path.name)
        .bind(&path.comments)
        .bind(path.valid)
        .bind(path.stats.length)
        .bind(path.stats.ascent)
        .bind(path.stats.descent)
        .bind(path.stats.min_elevation)
        .bind(path.stats.max_elevation)
        .bind(path.version)
        .bind(to_ts(&path.created_at))
        .bind(to_ts(&path.updated_at))
        .execute(&self.pool)
        .await?;
        tracing::debug!(path = %path.id, "path row inserted");
        Ok(())
    }

    async fn update_path(&self, path: &Path, expected_version: i64) -> Result<bool> {
        let cadastre = path
            .cadastre_geometry
            .as_ref()
            .map(geometry_json)
            .transpose()?;
        let result = sqlx::query(
            r#"
            UPDATE paths SET
                geometry = ?, cadastre_geometry = ?, name = ?, comments = ?, valid = ?,
                length = ?, ascent = ?, descent = ?, min_elevation = ?, max_elevation = ?,
                version = ?, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(geometry_json(&path.geometry)?)
        .bind(cadastre)
        .bind(&path.name)
        .bind(&path.comments)
        .bind(path.valid)
        .bind(path.stats.length)
        .bind(path.stats.ascent)
        .bind(path.stats.descent)
        .bind(path.stats.min_elevation)
        .bind(path.stats.max_elevation)
        .bind(path.version)
        .bind(to_ts(&path.updated_at))
        .bind(&path.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_path(&self, id: &str) -> Result<Option<Path>> {
        let row = sqlx::query(&format!("SELECT {} FROM paths WHERE id = ?", PATH_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(path_from_row).transpose()
    }

    async fn get_paths(&self, ids: &[String]) -> Result<Vec<Path>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM paths WHERE id IN ({})",
            PATH_COLUMNS, placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(path_from_row).collect()
    }

    async fn list_paths(&self, structure: Option<&str>) -> Result<Vec<Path>> {
        let rows = match structure {
            Some(s) => {
                sqlx::query(&format!(
                    "SELECT {} FROM paths WHERE structure = ? ORDER BY created_at ASC, id ASC",
                    PATH_COLUMNS
                ))
                .bind(s)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM paths ORDER BY created_at ASC, id ASC",
                    PATH_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(path_from_row).collect()
    }

    async fn list_kinds(&self) -> Result<Vec<TopologyKind>> {
        let rows = sqlx::query("SELECT code, label FROM topology_kinds ORDER BY code ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| TopologyKind {
                code: row.get("code"),
                label: row.get("label"),
            })
            .collect())
    }

    async fn get_kind(&self, code: i64) -> Result<Option<TopologyKind>> {
        let row = sqlx::query("SELECT code, label FROM topology_kinds WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| TopologyKind {
            code: row.get("code"),
            label: row.get("label"),
        }))
    }

    async fn insert_topology(
        &self,
        topology: &Topology,
        aggregations: &[PathAggregation],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO topologies (id, lateral_offset, deleted, kind, revision, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&topology.id)
        .bind(topology.offset)
        .bind(topology.deleted)
        .bind(topology.kind)
        .bind(topology.revision)
        .bind(to_ts(&topology.created_at))
        .bind(to_ts(&topology.updated_at))
        .execute(&mut *tx)
        .await?;

        insert_aggregations(&mut tx, aggregations).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn replace_aggregations(
        &self,
        topology: &Topology,
        aggregations: &[PathAggregation],
        expected_revision: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE topologies SET lateral_offset = ?, deleted = ?, kind = ?, revision = ?, updated_at = ? \
             WHERE id = ? AND revision = ? AND deleted = 0",
        )
        .bind(topology.offset)
        .bind(topology.deleted)
        .bind(topology.kind)
        .bind(topology.revision)
        .bind(to_ts(&topology.updated_at))
        .bind(&topology.id)
        .bind(expected_revision)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM path_aggregations WHERE topology_id = ?")
            .bind(&topology.id)
            .execute(&mut *tx)
            .await?;

        insert_aggregations(&mut tx, aggregations).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_topology(&self, id: &str) -> Result<Option<Topology>> {
        let row = sqlx::query(
            "SELECT id, lateral_offset, deleted, kind, revision, created_at, updated_at FROM topologies WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(topology_from_row))
    }

    async fn get_aggregations(&self, topology_id: &str) -> Result<Vec<PathAggregation>> {
        let rows = sqlx::query(
            "SELECT topology_id, path_id, ordinal, start_position, end_position FROM path_aggregations WHERE topology_id = ? ORDER BY ordinal ASC",
        )
        .bind(topology_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(aggregation_from_row).collect())
    }

    async fn set_topology_deleted(
        &self,
        id: &str,
        deleted: bool,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE topologies SET deleted = ?, updated_at = ? WHERE id = ?")
            .bind(deleted)
            .bind(to_ts(&at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn topologies_on_path(&self, path_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT t.id FROM topologies t
            JOIN path_aggregations a ON a.topology_id = t.id
            WHERE a.path_id = ? AND t.deleted = 0
            ORDER BY t.id ASC
            "#,
        )
        .bind(path_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn upsert_infrastructure(&self, infrastructure: &Infrastructure) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO infrastructures (id, structure, name, kind, topology_id, deleted, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                topology_id = excluded.topology_id,
                deleted = excluded.deleted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&infrastructure.id)
        .bind(&infrastructure.structure)
        .bind(&infrastructure.name)
        .bind(infrastructure.kind)
        .bind(&infrastructure.topology_id)
        .bind(infrastructure.deleted)
        .bind(to_ts(&infrastructure.created_at))
        .bind(to_ts(&infrastructure.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_infrastructure(&self, id: &str) -> Result<Option<Infrastructure>> {
        let row = sqlx::query(
            "SELECT id, structure, name, kind, topology_id, deleted, created_at, updated_at FROM infrastructures WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Infrastructure {
            id: row.get("id"),
            structure: row.get("structure"),
            name: row.get("name"),
            kind: row.get("kind"),
            topology_id: row.get("topology_id"),
            deleted: row.get("deleted"),
            created_at: from_ts(row.get("created_at")),
            updated_at: from_ts(row.get("updated_at")),
        }))
    }

    async fn upsert_intervention(&self, intervention: &Intervention) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interventions (id, structure, name, comments, topology_id,
                                       infrastructure_id, deleted, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                comments = excluded.comments,
                topology_id = excluded.topology_id,
                infrastructure_id = excluded.infrastructure_id,
                deleted = excluded.deleted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&intervention.id)
        .bind(&intervention.structure)
        .bind(&intervention.name)
        .bind(&intervention.comments)
        .bind(&intervention.topology_id)
        .bind(&intervention.infrastructure_id)
        .bind(intervention.deleted)
        .bind(to_ts(&intervention.created_at))
        .bind(to_ts(&intervention.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_intervention(&self, id: &str) -> Result<Option<Intervention>> {
        let row = sqlx::query(
            "SELECT id, structure, name, comments, topology_id, infrastructure_id, deleted, created_at, updated_at FROM interventions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Intervention {
            id: row.get("id"),
            structure: row.get("structure"),
            name: row.get("name"),
            comments: row.get("comments"),
            topology_id: row.get("topology_id"),
            infrastructure_id: row.get("infrastructure_id"),
            deleted: row.get("deleted"),
            created_at: from_ts(row.get("created_at")),
            updated_at: from_ts(row.get("updated_at")),
        }))
    }
}
