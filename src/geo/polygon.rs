use super::location::{EARTH_RADIUS_KM, Location};
use strum_macros::Display;

/// Kilometres per degree of arc on the reference sphere.
const KM_PER_DEG: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

#[derive(Debug, Display)]
pub enum BoundaryError {
    TooFewVertices(usize),
}

impl std::error::Error for BoundaryError {}

/// A closed polygonal region over latitude/longitude coordinates.
///
/// The vertex ring is implicitly closed; points exactly on an edge count as
/// inside.
#[derive(Debug, Clone)]
pub struct Boundary {
    vertices: Vec<Location>,
}

impl Boundary {
    pub fn new(vertices: Vec<Location>) -> Result<Self, BoundaryError> {
        if vertices.len() < 3 {
            return Err(BoundaryError::TooFewVertices(vertices.len()));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Location] { &self.vertices }

    /// Ray-cast containment test in coordinate space, with points on the
    /// boundary counting as inside.
    pub fn contains(&self, p: &Location) -> bool {
        let n = self.vertices.len();
        let (px, py) = (p.lon(), p.lat());
        let mut inside = false;
        for i in 0..n {
            let a = &self.vertices[i];
            let b = &self.vertices[(i + 1) % n];
            let (ax, ay) = (a.lon(), a.lat());
            let (bx, by) = (b.lon(), b.lat());
            if on_segment(ax, ay, bx, by, px, py) {
                return true;
            }
            if (ay > py) != (by > py) {
                let x_cross = ax + (py - ay) / (by - ay) * (bx - ax);
                if px < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Returns the point on the boundary closest to `p`, using a flat
    /// local projection centred on `p`. The polygon spans a regional area,
    /// so the projection error is negligible against the force dynamics it
    /// feeds.
    pub fn nearest_boundary_point(&self, p: &Location) -> Location {
        let n = self.vertices.len();
        let scale = p.lat().to_radians().cos();
        let to_xy = |loc: &Location| {
            (
                (loc.lon() - p.lon()) * scale * KM_PER_DEG,
                (loc.lat() - p.lat()) * KM_PER_DEG,
            )
        };
        let mut best = (f64::INFINITY, self.vertices[0]);
        for i in 0..n {
            let a = &self.vertices[i];
            let b = &self.vertices[(i + 1) % n];
            let (ax, ay) = to_xy(a);
            let (bx, by) = to_xy(b);
            let (dx, dy) = (bx - ax, by - ay);
            let len_sq = dx * dx + dy * dy;
            let t = if len_sq < 1e-12 {
                0.0
            } else {
                (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
            };
            let (cx, cy) = (ax + t * dx, ay + t * dy);
            let d_sq = cx * cx + cy * cy;
            if d_sq < best.0 {
                let lat = p.lat() + cy / KM_PER_DEG;
                let lon = p.lon() + cx / (scale * KM_PER_DEG);
                best = (d_sq, Location::new(lat, lon));
            }
        }
        best.1
    }
}

fn on_segment(ax: f64, ay: f64, bx: f64, by: f64, px: f64, py: f64) -> bool {
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross.abs() > 1e-12 {
        return false;
    }
    px >= ax.min(bx) - 1e-12
        && px <= ax.max(bx) + 1e-12
        && py >= ay.min(by) - 1e-12
        && py <= ay.max(by) + 1e-12
}
