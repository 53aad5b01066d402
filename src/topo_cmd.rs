//! `trailnet topo ...` and `trailnet kinds` commands.

use anyhow::Result;

use trailnet_core::models::Span;

use crate::network::Session;
use crate::output;

pub async fn run_kinds(session: &Session) -> Result<()> {
    let kinds = session.kinds().await?;
    output::print_kinds(&kinds);
    Ok(())
}

pub async fn run_define(session: &Session, spans: &[Span], offset: f64, kind: i64) -> Result<()> {
    let topology = session
        .network
        .topologies
        .define(&session.scope, spans, offset, kind)
        .await?;
    output::print_json(&topology)
}

pub async fn run_redefine(
    session: &Session,
    id: &str,
    spans: &[Span],
    offset: Option<f64>,
) -> Result<()> {
    let topology = session
        .network
        .topologies
        .redefine(&session.scope, id, spans, offset)
        .await?;
    output::print_json(&topology)
}

/// Prints the topology with its aggregations and derived geometry.
pub async fn run_show(session: &Session, id: &str) -> Result<()> {
    let resolved = session
        .network
        .topologies
        .resolve(&session.scope, id)
        .await?;
    output::print_json(&resolved)
}

pub async fn run_delete(session: &Session, id: &str) -> Result<()> {
    session
        .network
        .topologies
        .soft_delete(&session.scope, id)
        .await?;
    println!("Topology {} deleted.", id);
    Ok(())
}
