//! Planar and geographic primitives shared by routes and renderers: points,
//! Mercator's projection, distance metrics and point-to-segment projection.

pub mod polyline;

use serde::{Deserialize, Serialize};

/// Earth radius used by the haversine metric, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Data structure representing a point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point<T> {
    /// X coordinate (longitude for geographic points).
    pub x: T,
    /// Y coordinate (latitude for geographic points).
    pub y: T,
}

impl<T> Point<T> {
    /// Creates a point from its coordinates.
    pub const fn new(x: T, y: T) -> Self {
        Point { x, y }
    }
}

impl Point<f64> {
    /// Linear interpolation between `self` (at `t = 0`) and `other` (at `t =
    /// 1`).
    pub fn lerp(&self, other: &Point<f64>, t: f64) -> Point<f64> {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Returns the coordinates as an array, as expected by the spatial index.
    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Data structure representing a latitude-longitude coordinate.
#[derive(Clone, Copy, Debug)]
pub struct LatLon {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl LatLon {
    /// Converts the coordinates into Mercator's projection, where the whole
    /// world is the unit square.
    pub fn as_mercator(&self) -> Point<f64> {
        let x = 0.5 + self.lon / 360.0;
        let s = (self.lat * std::f64::consts::PI / 180.0).tan().asinh();
        let y = 0.5 - s / (2.0 * std::f64::consts::PI);

        Point { x, y }
    }

    /// Converts a point whose `x` is the longitude and `y` the latitude.
    pub fn from_lon_lat(p: &Point<f64>) -> Self {
        LatLon { lat: p.y, lon: p.x }
    }

    /// Converts back to a point whose `x` is the longitude and `y` the
    /// latitude.
    pub fn to_lon_lat(self) -> Point<f64> {
        Point {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// How distances along a route are measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceMetric {
    /// Euclidean distance in the coordinate space of the points.
    #[default]
    Planar,
    /// Great-circle distance in meters, points being (longitude, latitude) in
    /// degrees.
    Haversine,
}

impl DistanceMetric {
    /// Distance between two points under this metric.
    pub fn distance(self, a: &Point<f64>, b: &Point<f64>) -> f64 {
        match self {
            DistanceMetric::Planar => planar_distance(a, b),
            DistanceMetric::Haversine => haversine_distance(a, b),
        }
    }

    /// Tolerance used when comparing distances under this metric.
    pub fn epsilon(self) -> f64 {
        match self {
            DistanceMetric::Planar => 1e-8,
            DistanceMetric::Haversine => 1e-10,
        }
    }

    /// Bearing of the direction from `a` to `b`, in degrees clockwise from
    /// north, within `[0, 360)`.
    pub fn bearing(self, a: &Point<f64>, b: &Point<f64>) -> f64 {
        let degrees = match self {
            DistanceMetric::Planar => (b.x - a.x).atan2(b.y - a.y).to_degrees(),
            DistanceMetric::Haversine => {
                let lat1 = a.y.to_radians();
                let lat2 = b.y.to_radians();
                let dlon = (b.x - a.x).to_radians();
                let y = dlon.sin() * lat2.cos();
                let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
                y.atan2(x).to_degrees()
            }
        };
        if a == b {
            0.0
        } else {
            degrees.rem_euclid(360.0)
        }
    }
}

/// Euclidean distance between two points.
pub fn planar_distance(a: &Point<f64>, b: &Point<f64>) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Great-circle distance in meters between two (longitude, latitude) points.
pub fn haversine_distance(a: &Point<f64>, b: &Point<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.x - a.x).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Result of projecting a point onto a segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentProjection {
    /// Closest point of the segment.
    pub point: Point<f64>,
    /// Parameter of the closest point along the segment, in `[0, 1]`.
    pub fraction: f64,
    /// Squared Euclidean distance between the query and the closest point.
    pub distance_sq: f64,
}

/// Projects `query` onto the segment `[a, b]`, clamping to the endpoints.
///
/// Segments shorter than `epsilon` (squared length) project onto `a`.
pub fn project_onto_segment(
    a: &Point<f64>,
    b: &Point<f64>,
    query: &Point<f64>,
    epsilon: f64,
) -> SegmentProjection {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;

    let fraction = if len_sq > epsilon {
        (((query.x - a.x) * dx + (query.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let point = a.lerp(b, fraction);
    let ex = query.x - point.x;
    let ey = query.y - point.y;
    SegmentProjection {
        point,
        fraction,
        distance_sq: ex * ex + ey * ey,
    }
}
