//! Planar linestring primitives for linear referencing.
//!
//! Positions along a path are fractions of its planar (2D) length; `z` is
//! carried along and interpolated but never contributes to distances.
//! Coordinates serialize as JSON arrays (`[x, y]` or `[x, y, z]`), matching
//! the input format accepted by the CLI.
//!
//! Planar measures (distance, length, interpolation on a segment) go through
//! `geo` on the x/y projection of the coordinates.

use geo::{Distance, Euclidean, Length, Line, LineInterpolatePoint, Point};
use serde::{Deserialize, Serialize};

use crate::error::{NetworkResult, TopologyError};

/// A 2D or 3D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Coord {
    pub fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.map_or(true, f64::is_finite)
    }

    /// Planar distance to `other`.
    pub fn distance(&self, other: &Coord) -> f64 {
        Euclidean.distance(Point::from(*self), Point::from(*other))
    }

    pub fn approx_eq(&self, other: &Coord, tolerance: f64) -> bool {
        self.distance(other) <= tolerance
    }

    fn lerp(a: &Coord, b: &Coord, t: f64) -> Coord {
        if t <= 0.0 {
            return *a;
        }
        if t >= 1.0 {
            return *b;
        }
        let z = match (a.z, b.z) {
            (Some(za), Some(zb)) => Some(za + (zb - za) * t),
            _ => None,
        };
        match Line::new(a.planar(), b.planar()).line_interpolate_point(t) {
            Some(p) => Coord { x: p.x(), y: p.y(), z },
            None => *a,
        }
    }

    fn planar(&self) -> geo::Coord<f64> {
        geo::Coord {
            x: self.x,
            y: self.y,
        }
    }

    fn translated(&self, dx: f64, dy: f64) -> Coord {
        Coord {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z,
        }
    }
}

impl From<Coord> for Point<f64> {
    fn from(c: Coord) -> Self {
        Point::new(c.x, c.y)
    }
}

impl TryFrom<Vec<f64>> for Coord {
    type Error = String;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            [x, y] => Ok(Coord::xy(*x, *y)),
            [x, y, z] => Ok(Coord::xyz(*x, *y, *z)),
            other => Err(format!(
                "a coordinate needs 2 or 3 components, got {}",
                other.len()
            )),
        }
    }
}

impl From<Coord> for Vec<f64> {
    fn from(c: Coord) -> Self {
        match c.z {
            Some(z) => vec![c.x, c.y, z],
            None => vec![c.x, c.y],
        }
    }
}

/// Ordered coordinate sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct LineString(pub Vec<Coord>);

impl LineString {
    pub fn new(coords: Vec<Coord>) -> Self {
        Self(coords)
    }

    pub fn coords(&self) -> &[Coord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks that the linestring can carry fractional positions: at least
    /// two finite points and a non-zero planar length.
    pub fn validate(&self) -> NetworkResult<()> {
        if self.0.len() < 2 {
            return Err(TopologyError::InvalidGeometry(format!(
                "a linestring needs at least 2 points, got {}",
                self.0.len()
            )));
        }
        if let Some(i) = self.0.iter().position(|c| !c.is_finite()) {
            return Err(TopologyError::InvalidGeometry(format!(
                "coordinate {} is not finite",
                i
            )));
        }
        if self.length() <= 0.0 {
            return Err(TopologyError::InvalidGeometry(
                "linestring has zero length".to_string(),
            ));
        }
        Ok(())
    }

    /// Planar length.
    pub fn length(&self) -> f64 {
        polyline_length(&self.0)
    }

    fn cumulative(&self) -> Vec<f64> {
        let mut cum = Vec::with_capacity(self.0.len());
        let mut acc = 0.0;
        cum.push(acc);
        for w in self.0.windows(2) {
            acc += w[0].distance(&w[1]);
            cum.push(acc);
        }
        cum
    }

    /// Segment index and in-segment parameter for a fraction of the length.
    fn locate(&self, cum: &[f64], fraction: f64) -> (usize, f64) {
        let total = cum.last().copied().unwrap_or(0.0);
        let target = fraction.clamp(0.0, 1.0) * total;
        let last_segment = self.0.len().saturating_sub(2);
        for i in 0..=last_segment {
            if cum[i + 1] >= target || i == last_segment {
                let seg = cum[i + 1] - cum[i];
                let t = if seg > 0.0 { (target - cum[i]) / seg } else { 0.0 };
                return (i, t);
            }
        }
        (last_segment, 1.0)
    }

    /// Point at `fraction` of the planar length.
    pub fn interpolate(&self, fraction: f64) -> Coord {
        let cum = self.cumulative();
        self.interpolate_with(&cum, fraction)
    }

    fn interpolate_with(&self, cum: &[f64], fraction: f64) -> Coord {
        match self.0.len() {
            0 => Coord::xy(f64::NAN, f64::NAN),
            1 => self.0[0],
            _ => {
                let (i, t) = self.locate(cum, fraction);
                Coord::lerp(&self.0[i], &self.0[i + 1], t)
            }
        }
    }

    /// Unit direction of travel at `fraction`, as `(dx, dy)`.
    pub fn tangent_at(&self, fraction: f64) -> (f64, f64) {
        if self.0.len() < 2 {
            return (1.0, 0.0);
        }
        let cum = self.cumulative();
        let (i, _) = self.locate(&cum, fraction);
        // Zero-length segments have no direction; look for the nearest real one.
        let candidates = (i..self.0.len() - 1).chain((0..i).rev());
        for j in candidates {
            let (a, b) = (&self.0[j], &self.0[j + 1]);
            let d = a.distance(b);
            if d > 0.0 {
                return ((b.x - a.x) / d, (b.y - a.y) / d);
            }
        }
        (1.0, 0.0)
    }

    /// Sub-linestring between two fractions. When `start > end` the
    /// result runs backwards along the path; when they are equal it holds a
    /// single point.
    pub fn substring(&self, start: f64, end: f64) -> Vec<Coord> {
        if start > end {
            let mut forward = self.substring(end, start);
            forward.reverse();
            return forward;
        }
        let cum = self.cumulative();
        let first = self.interpolate_with(&cum, start);
        if start == end {
            return vec![first];
        }
        let total = cum.last().copied().unwrap_or(0.0);
        let (from, to) = (start.clamp(0.0, 1.0) * total, end.clamp(0.0, 1.0) * total);
        let mut out = vec![first];
        out.extend(
            self.0
                .iter()
                .zip(cum.iter())
                .filter(|(_, d)| **d > from && **d < to)
                .map(|(c, _)| *c),
        );
        out.push(self.interpolate_with(&cum, end));
        out
    }
}

/// Planar length of a coordinate run.
pub fn polyline_length(coords: &[Coord]) -> f64 {
    let line: geo::LineString<f64> = coords.iter().map(Coord::planar).collect();
    Euclidean.length(&line)
}

/// Translates `coords` perpendicular to the direction of travel.
///
/// Positive offsets move to the left. Interior vertices use a mitred join,
/// with the miter clamped to `MITER_LIMIT` times the offset on sharp turns.
pub fn offset_polyline(coords: &[Coord], offset: f64) -> Vec<Coord> {
    const MITER_LIMIT: f64 = 5.0;

    if offset == 0.0 || coords.len() < 2 {
        return coords.to_vec();
    }
    let normals: Vec<(f64, f64)> = coords
        .windows(2)
        .map(|w| {
            let d = w[0].distance(&w[1]);
            if d > 0.0 {
                (-(w[1].y - w[0].y) / d, (w[1].x - w[0].x) / d)
            } else {
                (0.0, 0.0)
            }
        })
        .collect();

    let mut out = Vec::with_capacity(coords.len());
    for (k, c) in coords.iter().enumerate() {
        let (nx, ny) = if k == 0 {
            normals[0]
        } else if k == coords.len() - 1 {
            normals[k - 1]
        } else {
            let (ax, ay) = normals[k - 1];
            let (bx, by) = normals[k];
            let (mx, my) = (ax + bx, ay + by);
            let m = mx.hypot(my);
            if m < 1e-12 {
                (bx, by)
            } else {
                let (ux, uy) = (mx / m, my / m);
                let cos = (ux * bx + uy * by).max(1.0 / MITER_LIMIT);
                (ux / cos, uy / cos)
            }
        };
        out.push(c.translated(nx * offset, ny * offset));
    }
    out
}

/// Translates a single point perpendicular to the direction `(tx, ty)`.
pub fn offset_point(c: &Coord, tangent: (f64, f64), offset: f64) -> Coord {
    if offset == 0.0 {
        return *c;
    }
    c.translated(-tangent.1 * offset, tangent.0 * offset)
}
