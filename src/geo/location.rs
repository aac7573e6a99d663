use std::fmt::{Display, Formatter};

/// Mean Earth radius used for all great-circle arithmetic, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the Earth's surface in degrees of latitude and longitude.
///
/// All distances derived from locations are great-circle distances on a
/// sphere of radius [`EARTH_RADIUS_KM`]; all durations in the simulation are
/// minutes.
#[derive(Debug, PartialEq, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct Location {
    lat: f64,
    lon: f64,
}

impl Location {
    /// Creates a new location from latitude and longitude in degrees.
    pub const fn new(lat: f64, lon: f64) -> Self { Self { lat, lon } }

    /// Returns the latitude in degrees.
    pub const fn lat(&self) -> f64 { self.lat }

    /// Returns the longitude in degrees.
    pub const fn lon(&self) -> f64 { self.lon }

    /// Computes the great-circle distance to `other` in kilometres using the
    /// haversine formula.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }

    /// Computes the initial bearing towards `other`, in degrees clockwise
    /// from north, in `[0, 360)`.
    pub fn initial_bearing_to(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let y = d_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
        y.atan2(x).to_degrees().rem_euclid(360.0)
    }

    /// Returns the point at `fraction` of the great-circle arc from `self`
    /// towards `other`. The fraction is clamped to `[0, 1]`.
    pub fn intermediate_to(&self, other: &Self, fraction: f64) -> Self {
        let f = fraction.clamp(0.0, 1.0);
        let delta = self.distance_to(other) / EARTH_RADIUS_KM;
        if delta < 1e-12 {
            return *self;
        }
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();
        let lat2 = other.lat.to_radians();
        let lon2 = other.lon.to_radians();
        let sin_d = delta.sin();
        let a = (((1.0 - f) * delta).sin()) / sin_d;
        let b = ((f * delta).sin()) / sin_d;
        let x = a * lat1.cos() * lon1.cos() + b * lat2.cos() * lon2.cos();
        let y = a * lat1.cos() * lon1.sin() + b * lat2.cos() * lon2.sin();
        let z = a * lat1.sin() + b * lat2.sin();
        Self::new(
            z.atan2((x * x + y * y).sqrt()).to_degrees(),
            y.atan2(x).to_degrees(),
        )
    }

    /// Returns the destination point after travelling `distance_km` along
    /// the given initial bearing (degrees clockwise from north).
    pub fn destination(&self, bearing_deg: f64, distance_km: f64) -> Self {
        let delta = distance_km / EARTH_RADIUS_KM;
        let theta = bearing_deg.to_radians();
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();
        let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
        let lon2 = lon1
            + (theta.sin() * delta.sin() * lat1.cos())
                .atan2(delta.cos() - lat1.sin() * lat2.sin());
        let lon_deg = (lon2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
        Self::new(lat2.to_degrees(), lon_deg)
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Interpolates the position of a craft that departs `a` at `t_start` and
/// arrives at `b` at `t_end`, evaluated at time `t`.
///
/// Outside `[t_start, t_end]` the nearer endpoint is returned; a degenerate
/// leg (`t_end <= t_start`) evaluates to `b`.
pub fn position_at(a: &Location, b: &Location, t_start: f64, t_end: f64, t: f64) -> Location {
    if t_end <= t_start {
        return *b;
    }
    a.intermediate_to(b, (t - t_start) / (t_end - t_start))
}

/// Returns the index of the point closest to `p`, or `None` for an empty
/// set. Ties resolve to the lowest index.
pub fn nearest<'a, I>(points: I, p: &Location) -> Option<usize>
where I: IntoIterator<Item = &'a Location> {
    let mut best: Option<(usize, f64)> = None;
    for (i, point) in points.into_iter().enumerate() {
        let d = p.distance_to(point);
        if best.is_none_or(|(_, b)| d < b) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}
