//! Tracing subscriber setup for the `trailnet` binary.
//!
//! `RUST_LOG` wins over `[logging].filter`. Log lines go to stderr so that
//! command output on stdout stays machine-readable.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

pub fn init(config: &Config) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.filter)?,
    };

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    Ok(())
}
