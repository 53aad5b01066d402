//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/trailnet.sqlite"
//!
//! [geometry]
//! tolerance = 0.001
//!
//! [terrain]
//! provider = "elevation"   # or "flat"
//!
//! [scope]
//! structure = "park-north"
//!
//! [[kinds]]
//! code = 1
//! label = "intervention"
//!
//! [logging]
//! filter = "info"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use trailnet_core::models::{default_kinds, TopologyKind, KIND_INFRASTRUCTURE, KIND_INTERVENTION};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub terrain: TerrainConfig,
    pub scope: ScopeConfig,
    #[serde(default = "default_kind_config")]
    pub kinds: Vec<KindConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeometryConfig {
    /// Largest gap still treated as a shared endpoint between spans.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
        }
    }
}

fn default_tolerance() -> f64 {
    0.001
}

#[derive(Debug, Deserialize, Clone)]
pub struct TerrainConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
        }
    }
}

fn default_provider() -> String {
    "elevation".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScopeConfig {
    /// Structure used when the CLI is not given `--structure`.
    pub structure: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KindConfig {
    pub code: i64,
    pub label: String,
}

fn default_kind_config() -> Vec<KindConfig> {
    default_kinds()
        .into_iter()
        .map(|k| KindConfig {
            code: k.code,
            label: k.label,
        })
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl Config {
    pub fn topology_kinds(&self) -> Vec<TopologyKind> {
        self.kinds
            .iter()
            .map(|k| TopologyKind {
                code: k.code,
                label: k.label.clone(),
            })
            .collect()
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if !(config.geometry.tolerance.is_finite() && config.geometry.tolerance > 0.0) {
        anyhow::bail!("geometry.tolerance must be > 0");
    }

    match config.terrain.provider.as_str() {
        "elevation" | "flat" => {}
        other => anyhow::bail!(
            "Unknown terrain provider: '{}'. Must be elevation or flat.",
            other
        ),
    }

    if config.scope.structure.trim().is_empty() {
        anyhow::bail!("scope.structure must not be empty");
    }

    if config.kinds.is_empty() {
        anyhow::bail!("at least one [[kinds]] entry is required");
    }
    let mut seen = HashSet::new();
    for kind in &config.kinds {
        if !seen.insert(kind.code) {
            anyhow::bail!("duplicate topology kind code: {}", kind.code);
        }
        if kind.label.trim().is_empty() {
            anyhow::bail!("topology kind {} has an empty label", kind.code);
        }
    }
    // attachments create topologies with these codes
    let required = [
        (KIND_INTERVENTION, "intervention"),
        (KIND_INFRASTRUCTURE, "infrastructure"),
    ];
    for (code, role) in required {
        if !seen.contains(&code) {
            anyhow::bail!("[[kinds]] must declare code {} ({})", code, role);
        }
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
