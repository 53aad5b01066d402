//! `trailnet infra ...` and `trailnet intervention ...` commands.
//!
//! `show` prints the entity together with its resolved position:
//!
//! ```json
//! { "intervention": { ... }, "position": { "topology": ..., "geometry": ..., "length": 6.0 } }
//! ```

use anyhow::{bail, Result};
use serde_json::json;

use trailnet_core::models::Span;

use crate::network::Session;
use crate::output;

pub async fn run_infra_add(
    session: &Session,
    name: &str,
    kind: i64,
    spans: &[Span],
    offset: f64,
) -> Result<()> {
    let infrastructure = session
        .network
        .attachments
        .create_infrastructure(&session.scope, name, kind, spans, offset)
        .await?;
    output::print_json(&infrastructure)
}

pub async fn run_infra_show(session: &Session, id: &str) -> Result<()> {
    let attachments = &session.network.attachments;
    let infrastructure = attachments.get_infrastructure(&session.scope, id).await?;
    let position = attachments
        .locate_infrastructure(&session.scope, id)
        .await?;
    output::print_json(&json!({
        "infrastructure": infrastructure,
        "position": position,
    }))
}

/// Creates an intervention either on its own spans or on an infrastructure.
pub async fn run_intervention_add(
    session: &Session,
    name: &str,
    comments: Option<String>,
    spans: &[Span],
    offset: f64,
    on: Option<&str>,
) -> Result<()> {
    let attachments = &session.network.attachments;
    let intervention = match (on, spans.is_empty()) {
        (Some(infrastructure_id), true) => {
            attachments
                .create_intervention_on_infrastructure(
                    &session.scope,
                    name,
                    comments,
                    infrastructure_id,
                )
                .await?
        }
        (Some(_), false) => bail!("--span and --on are mutually exclusive"),
        (None, _) => {
            attachments
                .create_intervention(&session.scope, name, comments, spans, offset)
                .await?
        }
    };
    output::print_json(&intervention)
}

pub async fn run_intervention_show(session: &Session, id: &str) -> Result<()> {
    let attachments = &session.network.attachments;
    let intervention = attachments.get_intervention(&session.scope, id).await?;
    let position = attachments.locate_intervention(&session.scope, id).await?;
    output::print_json(&json!({
        "intervention": intervention,
        "position": position,
    }))
}

pub async fn run_intervention_move(
    session: &Session,
    id: &str,
    spans: &[Span],
    offset: Option<f64>,
) -> Result<()> {
    let intervention = session
        .network
        .attachments
        .reposition_intervention(&session.scope, id, spans, offset)
        .await?;
    output::print_json(&intervention)
}

pub async fn run_intervention_attach(
    session: &Session,
    id: &str,
    infrastructure_id: &str,
) -> Result<()> {
    let intervention = session
        .network
        .attachments
        .set_infrastructure(&session.scope, id, infrastructure_id)
        .await?;
    output::print_json(&intervention)
}
