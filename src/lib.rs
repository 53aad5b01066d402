//! # trailnet
//!
//! A path network manager: trails and roads are stored as [`Path`]s, and
//! anything located on the network (works, infrastructure, signage) is a
//! topology positioned by fractional spans along those paths. Topology
//! geometry is never stored; it is derived from the current path geometry
//! whenever it is read, so editing a path moves everything on it.
//!
//! [`Path`]: trailnet_core::models::Path
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │ PathRegistry │──▶│ TopologyComposer │──▶│ SqliteStore  │
//! │ (paths)      │   │ spans + derive   │   │ paths, aggs  │
//! └──────────────┘   └────────┬────────┘   └──────────────┘
//!                             │
//!                    ┌────────┴─────────┐
//!                    │ AttachmentRegistry│
//!                    │ infra / works     │
//!                    └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! trailnet init
//! trailnet path add --geometry '[[0,0],[10,0]]'
//! trailnet topo define --span <PATH_ID>:0.2:0.8
//! trailnet topo show <TOPOLOGY_ID>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` backend |
//! | [`network`] | Session wiring and caller scope |
//! | [`logging`] | Tracing subscriber setup |
//! | [`path_cmd`], [`topo_cmd`], [`attach_cmd`] | CLI commands |

pub mod attach_cmd;
pub mod config;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod network;
pub mod output;
pub mod path_cmd;
pub mod sqlite_store;
pub mod topo_cmd;

pub use trailnet_core;
