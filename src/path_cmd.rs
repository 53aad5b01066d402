//! `trailnet path ...` commands.

use anyhow::Result;

use trailnet_core::geometry::LineString;
use trailnet_core::registry::{NewPath, PathUpdate};

use crate::network::Session;
use crate::output;

pub async fn run_add(
    session: &Session,
    geometry: LineString,
    cadastre: Option<LineString>,
    name: Option<String>,
    comments: Option<String>,
) -> Result<()> {
    let path = session
        .network
        .paths
        .create(
            &session.scope,
            NewPath {
                geometry,
                cadastre_geometry: cadastre,
                name,
                comments,
            },
        )
        .await?;
    output::print_json(&path)
}

pub async fn run_update(session: &Session, id: &str, update: PathUpdate) -> Result<()> {
    let outcome = session
        .network
        .paths
        .update(&session.scope, id, update)
        .await?;
    output::print_json(&outcome)
}

pub async fn run_get(session: &Session, id: &str) -> Result<()> {
    let path = session.network.paths.get(&session.scope, id).await?;
    output::print_json(&path)
}

pub async fn run_list(session: &Session, json: bool) -> Result<()> {
    let paths = session.network.paths.list(&session.scope).await?;
    if json {
        return output::print_json(&paths);
    }
    output::print_paths(&paths);
    Ok(())
}

pub async fn run_invalidate(session: &Session, id: &str) -> Result<()> {
    let path = session.network.paths.invalidate(&session.scope, id).await?;
    println!("Path {} marked invalid (version {}).", path.id, path.version);
    Ok(())
}
