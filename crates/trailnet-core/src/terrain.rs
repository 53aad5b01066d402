//! Terrain derivation for path statistics.
//!
//! A [`TerrainModel`] turns a path geometry into its [`PathStats`]. It must be
//! synchronous and side-effect free: the registry calls it inside the write
//! that changes the geometry.

use crate::geometry::LineString;
use crate::models::PathStats;

pub trait TerrainModel: Send + Sync {
    fn name(&self) -> &str;

    fn stats(&self, geometry: &LineString) -> PathStats;
}

/// Reads elevations from the geometry's own `z` values.
///
/// Points without `z` are skipped; a fully 2D geometry yields zero
/// elevations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElevationProfile;

impl TerrainModel for ElevationProfile {
    fn name(&self) -> &str {
        "elevation"
    }

    fn stats(&self, geometry: &LineString) -> PathStats {
        let zs: Vec<f64> = geometry.coords().iter().filter_map(|c| c.z).collect();
        let mut stats = PathStats {
            length: geometry.length(),
            ..PathStats::default()
        };
        if zs.is_empty() {
            return stats;
        }
        stats.min_elevation = zs.iter().copied().fold(f64::INFINITY, f64::min);
        stats.max_elevation = zs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for w in zs.windows(2) {
            let delta = w[1] - w[0];
            if delta > 0.0 {
                stats.ascent += delta;
            } else {
                stats.descent -= delta;
            }
        }
        stats
    }
}

/// Ignores elevation entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain;

impl TerrainModel for FlatTerrain {
    fn name(&self) -> &str {
        "flat"
    }

    fn stats(&self, geometry: &LineString) -> PathStats {
        PathStats {
            length: geometry.length(),
            ..PathStats::default()
        }
    }
}

/// Builds the terrain model named in configuration.
pub fn terrain_model(provider: &str) -> Option<Box<dyn TerrainModel>> {
    match provider {
        "elevation" => Some(Box::new(ElevationProfile)),
        "flat" => Some(Box::new(FlatTerrain)),
        _ => None,
    }
}
