//! Stdout rendering shared by the CLI commands.

use anyhow::Result;
use serde::Serialize;

use trailnet_core::models::{Path, TopologyKind};

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_paths(paths: &[Path]) {
    if paths.is_empty() {
        println!("No paths.");
        return;
    }
    println!(
        "{:<36}  {:<14} {:>10} {:>3} {:<5} NAME",
        "ID", "STRUCTURE", "LENGTH", "V", "VALID"
    );
    for path in paths {
        println!(
            "{:<36}  {:<14} {:>10.2} {:>3} {:<5} {}",
            path.id,
            path.structure,
            path.stats.length,
            path.version,
            path.valid,
            path.name.as_deref().unwrap_or("-")
        );
    }
}

pub fn print_kinds(kinds: &[TopologyKind]) {
    println!("{:<6} LABEL", "CODE");
    for kind in kinds {
        println!("{:<6} {}", kind.code, kind.label);
    }
}
