//! # trailnet CLI
//!
//! The `trailnet` binary manages a path network and the topologies placed
//! on it.
//!
//! ## Usage
//!
//! ```bash
//! trailnet --config ./config/trailnet.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `trailnet init` | Create the SQLite database, run migrations, seed kinds |
//! | `trailnet kinds` | List topology kinds |
//! | `trailnet path add\|update\|get\|list\|invalidate` | Manage paths |
//! | `trailnet topo define\|redefine\|show\|delete` | Manage topologies |
//! | `trailnet infra add\|show` | Manage infrastructures |
//! | `trailnet intervention add\|show\|move\|attach` | Manage interventions |
//! | `trailnet completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! trailnet path add --geometry '[[0,0],[10,0]]' --name "Ridge trail"
//! trailnet topo define --span 3f1c...:0.2:0.8 --offset 1.5
//! trailnet topo show <TOPOLOGY_ID>
//! trailnet --structure south --elevated path list
//! ```
//!
//! Failures print `error[<code>]: <message>` on stderr and exit with 1.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process::ExitCode;

use trailnet::network::Session;
use trailnet::trailnet_core::geometry::LineString;
use trailnet::trailnet_core::models::{Span, KIND_INFRASTRUCTURE};
use trailnet::trailnet_core::registry::PathUpdate;
use trailnet::trailnet_core::TopologyError;
use trailnet::{attach_cmd, config, logging, migrate, path_cmd, topo_cmd};

/// trailnet: paths, and everything positioned along them.
#[derive(Parser)]
#[command(
    name = "trailnet",
    about = "trailnet: a path network with linear topologies positioned along trails and roads",
    version,
    long_about = "trailnet stores trail and road centrelines as paths and locates works, \
    infrastructure and signage on them by fractional positions. Topology geometry is \
    derived from the current path geometry on every read."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/trailnet.toml")]
    config: PathBuf,

    /// Act on behalf of this structure instead of `[scope].structure`.
    #[arg(long, global = true)]
    structure: Option<String>,

    /// Bypass the structure check (administrative access).
    #[arg(long, global = true)]
    elevated: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and seed topology kinds.
    ///
    /// Idempotent: running it again only refreshes kind labels.
    Init,

    /// List topology kinds.
    Kinds,

    /// Manage paths.
    Path {
        #[command(subcommand)]
        action: PathAction,
    },

    /// Manage topologies.
    Topo {
        #[command(subcommand)]
        action: TopoAction,
    },

    /// Manage infrastructures.
    Infra {
        #[command(subcommand)]
        action: InfraAction,
    },

    /// Manage interventions.
    Intervention {
        #[command(subcommand)]
        action: InterventionAction,
    },

    /// Print a shell completion script to stdout.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PathAction {
    /// Create a path in the caller's structure.
    Add {
        /// Coordinates as JSON, e.g. `[[0,0],[10,0,512.5]]`.
        #[arg(long, value_parser = parse_line)]
        geometry: LineString,
        /// Cadastral (legal) geometry as JSON.
        #[arg(long, value_parser = parse_line)]
        cadastre: Option<LineString>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Edit a path. Topologies on it follow on their next read.
    Update {
        id: String,
        #[arg(long, value_parser = parse_line)]
        geometry: Option<LineString>,
        #[arg(long, value_parser = parse_line)]
        cadastre: Option<LineString>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long)]
        valid: Option<bool>,
    },
    /// Print a path as JSON.
    Get { id: String },
    /// List paths visible to the caller.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Mark a path invalid.
    Invalidate { id: String },
}

#[derive(Subcommand)]
enum TopoAction {
    /// Create a topology from ordered spans.
    Define {
        /// `PATH_ID:START:END`, repeatable, in order.
        #[arg(long = "span", value_parser = parse_span, required = true)]
        spans: Vec<Span>,
        /// Lateral offset; positive is left of the direction of travel.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        offset: f64,
        /// Topology kind code (see `trailnet kinds`).
        #[arg(long, default_value_t = 1)]
        kind: i64,
    },
    /// Replace the spans of a topology.
    Redefine {
        id: String,
        #[arg(long = "span", value_parser = parse_span, required = true)]
        spans: Vec<Span>,
        #[arg(long, allow_negative_numbers = true)]
        offset: Option<f64>,
    },
    /// Print a topology with its derived geometry.
    Show { id: String },
    /// Soft-delete a topology.
    Delete { id: String },
}

#[derive(Subcommand)]
enum InfraAction {
    /// Create an infrastructure on the network.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long = "span", value_parser = parse_span, required = true)]
        spans: Vec<Span>,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        offset: f64,
        #[arg(long, default_value_t = KIND_INFRASTRUCTURE)]
        kind: i64,
    },
    /// Print an infrastructure and its position.
    Show { id: String },
}

#[derive(Subcommand)]
enum InterventionAction {
    /// Create an intervention, on its own spans or on an infrastructure.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long = "span", value_parser = parse_span, required_unless_present = "on")]
        spans: Vec<Span>,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        offset: f64,
        /// Infrastructure id to position the intervention on.
        #[arg(long)]
        on: Option<String>,
    },
    /// Print an intervention and its position.
    Show { id: String },
    /// Move an intervention that has its own position.
    Move {
        id: String,
        #[arg(long = "span", value_parser = parse_span, required = true)]
        spans: Vec<Span>,
        #[arg(long, allow_negative_numbers = true)]
        offset: Option<f64>,
    },
    /// Bind an intervention to an infrastructure.
    Attach { id: String, infrastructure: String },
}

/// Parse a `PATH_ID:START:END` span.
fn parse_span(s: &str) -> Result<Span, String> {
    let mut parts = s.rsplitn(3, ':');
    let (end, start, path_id) = match (parts.next(), parts.next(), parts.next()) {
        (Some(end), Some(start), Some(path_id)) if !path_id.is_empty() => (end, start, path_id),
        _ => return Err(format!("invalid span '{}': expected PATH_ID:START:END", s)),
    };
    let position = |raw: &str| {
        raw.trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid position '{}' in span '{}'", raw, s))
    };
    Ok(Span::new(path_id, position(start)?, position(end)?))
}

/// Parse a JSON coordinate array into a linestring.
fn parse_line(s: &str) -> Result<LineString, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid coordinates: {}", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<TopologyError>() {
                Some(e) => eprintln!("error[{}]: {}", e.code(), e),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "trailnet", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let session = Session::open(&cfg, cli.structure.as_deref(), cli.elevated).await?;
    let result = dispatch(&session, cli.command).await;
    session.close().await;
    result
}

async fn dispatch(session: &Session, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init | Commands::Completions { .. } => {
            // Handled above (before opening a session)
            unreachable!()
        }
        Commands::Kinds => topo_cmd::run_kinds(session).await?,
        Commands::Path { action } => match action {
            PathAction::Add {
                geometry,
                cadastre,
                name,
                comments,
            } => path_cmd::run_add(session, geometry, cadastre, name, comments).await?,
            PathAction::Update {
                id,
                geometry,
                cadastre,
                name,
                comments,
                valid,
            } => {
                let update = PathUpdate {
                    geometry,
                    cadastre_geometry: cadastre,
                    name,
                    comments,
                    valid,
                };
                path_cmd::run_update(session, &id, update).await?
            }
            PathAction::Get { id } => path_cmd::run_get(session, &id).await?,
            PathAction::List { json } => path_cmd::run_list(session, json).await?,
            PathAction::Invalidate { id } => path_cmd::run_invalidate(session, &id).await?,
        },
        Commands::Topo { action } => match action {
            TopoAction::Define {
                spans,
                offset,
                kind,
            } => topo_cmd::run_define(session, &spans, offset, kind).await?,
            TopoAction::Redefine { id, spans, offset } => {
                topo_cmd::run_redefine(session, &id, &spans, offset).await?
            }
            TopoAction::Show { id } => topo_cmd::run_show(session, &id).await?,
            TopoAction::Delete { id } => topo_cmd::run_delete(session, &id).await?,
        },
        Commands::Infra { action } => match action {
            InfraAction::Add {
                name,
                spans,
                offset,
                kind,
            } => attach_cmd::run_infra_add(session, &name, kind, &spans, offset).await?,
            InfraAction::Show { id } => attach_cmd::run_infra_show(session, &id).await?,
        },
        Commands::Intervention { action } => match action {
            InterventionAction::Add {
                name,
                comments,
                spans,
                offset,
                on,
            } => {
                attach_cmd::run_intervention_add(
                    session,
                    &name,
                    comments,
                    &spans,
                    offset,
                    on.as_deref(),
                )
                .await?
            }
            InterventionAction::Show { id } => {
                attach_cmd::run_intervention_show(session, &id).await?
            }
            InterventionAction::Move { id, spans, offset } => {
                attach_cmd::run_intervention_move(session, &id, &spans, offset).await?
            }
            InterventionAction::Attach { id, infrastructure } => {
                attach_cmd::run_intervention_attach(session, &id, &infrastructure).await?
            }
        },
    }
    Ok(())
}
