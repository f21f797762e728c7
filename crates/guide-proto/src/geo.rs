//! Small-area geodesy helpers shared by the fence, traffic and mode code.
//! Equirectangular projection is good enough at the distances involved.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Project to a local plane around (lat0, lon0); x east, y north, meters.
pub fn to_xy(lat: f64, lon: f64, lat0: f64, lon0: f64) -> (f64, f64) {
    let x = (lon - lon0).to_radians() * EARTH_RADIUS_M * lat0.to_radians().cos();
    let y = (lat - lat0).to_radians() * EARTH_RADIUS_M;
    (x, y)
}

/// Inverse of [`to_xy`].
pub fn from_xy(x: f64, y: f64, lat0: f64, lon0: f64) -> (f64, f64) {
    let lat = lat0 + (y / EARTH_RADIUS_M).to_degrees();
    let lon = lon0 + (x / (EARTH_RADIUS_M * lat0.to_radians().cos())).to_degrees();
    (lat, lon)
}

/// Move from (lat, lon) by the given local offsets in meters.
pub fn offset_m(lat: f64, lon: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    from_xy(east_m, north_m, lat, lon)
}

/// Bearing from point 1 to point 2, radians from north, in (-pi, pi].
pub fn bearing_rad(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (x, y) = to_xy(lat2, lon2, lat1, lon1);
    x.atan2(y)
}

// Ray casting polygon test
pub fn point_in_polygon(poly: &[Point], lat: f64, lon: f64) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let xi = poly[i].lon;
        let yi = poly[i].lat;
        let xj = poly[j].lon;
        let yj = poly[j].lat;
        let intersect = ((yi > lat) != (yj > lat))
            && (lon < (xj - xi) * (lat - yi) / (yj - yi + 1e-12) + xi);
        if intersect {
            inside = !inside;
        }
        j = i;
    }
    inside
}
