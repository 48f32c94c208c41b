//! Decoding of route geometries encoded with [Google's polyline
//! algorithm](https://developers.google.com/maps/documentation/utilities/polylinealgorithm),
//! the format most routing services use to ship a route.

use super::Point;
use std::str::Bytes;

/// A polyline encoded as a starting point followed by relative increments, all
/// in scaled latitude-longitude coordinates.
#[derive(Clone, Debug)]
pub struct EncodedPolyline {
    /// Scaled (latitude, longitude) increments.
    points: Vec<Point<i32>>,
    /// Scale factor of the coordinates (1e5 for the standard precision, 1e6
    /// for OSRM's `polyline6`).
    scale: f64,
}

impl EncodedPolyline {
    /// Scale factor of the standard 5-digits precision.
    pub const PRECISION_5: f64 = 1e5;
    /// Scale factor of the 6-digits precision used by OSRM and Valhalla.
    pub const PRECISION_6: f64 = 1e6;

    /// Decodes a polyline with the standard 5-digits precision.
    pub fn new(encoded: &str) -> Option<Self> {
        Self::with_precision(encoded, Self::PRECISION_5)
    }

    /// Decodes a polyline whose coordinates are scaled by `scale`.
    pub fn with_precision(encoded: &str, scale: f64) -> Option<Self> {
        let mut bytes = encoded.bytes();
        let mut points = Vec::new();

        while let Some(x) = Self::get_value(&mut bytes) {
            let y = Self::get_value(&mut bytes)?;
            points.push(Point { x, y });
        }

        Some(EncodedPolyline { points, scale })
    }

    /// Returns the number of points on the polyline.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Checks whether the polyline contains any point.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the decoded points, with `x` the longitude and `y` the
    /// latitude.
    pub fn lon_lat_points(&self) -> Vec<Point<f64>> {
        let mut it = self.points.iter();
        let mut result = Vec::with_capacity(self.points.len());

        if let Some(mut cursor) = it.next().copied() {
            result.push(self.to_lon_lat(cursor));

            for p in it {
                cursor.x += p.x;
                cursor.y += p.y;
                result.push(self.to_lon_lat(cursor));
            }
        }

        result
    }

    /// Converts an accumulated (latitude, longitude) pair.
    fn to_lon_lat(&self, p: Point<i32>) -> Point<f64> {
        Point {
            x: p.y as f64 / self.scale,
            y: p.x as f64 / self.scale,
        }
    }

    /// Reads an encoded signed value.
    fn get_value(bytes: &mut Bytes) -> Option<i32> {
        let mut x = Self::get_raw_value(bytes)? as i32;
        if x & 1 == 1 {
            x = !x;
        }
        Some(x >> 1)
    }

    /// Reads an encoded unsigned value.
    fn get_raw_value(bytes: &mut Bytes) -> Option<u32> {
        let mut result = 0;
        let mut shift = 0;
        loop {
            let x = Self::get_base64_digit(bytes)?;
            if shift >= 32 {
                return None;
            }
            result |= (x & 0x1F) << shift;
            if x & 0x20 == 0 {
                return Some(result);
            }
            shift += 5;
        }
    }

    /// Reads a base-64 digit.
    fn get_base64_digit(bytes: &mut Bytes) -> Option<u32> {
        let x = bytes.next()?.checked_sub(63)?;
        if x < 64 {
            Some(x as u32)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_close(a: Point<f64>, b: Point<f64>) {
        assert!(
            (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn decode_reference_polyline() {
        // Example from the algorithm's documentation.
        let polyline = EncodedPolyline::new("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(polyline.len(), 3);

        let points = polyline.lon_lat_points();
        assert_close(points[0], Point::new(-120.2, 38.5));
        assert_close(points[1], Point::new(-120.95, 40.7));
        assert_close(points[2], Point::new(-126.453, 43.252));
    }

    #[test]
    fn decode_empty() {
        let polyline = EncodedPolyline::new("").unwrap();
        assert!(polyline.is_empty());
        assert!(polyline.lon_lat_points().is_empty());
    }

    #[test]
    fn decode_truncated() {
        // A latitude without its longitude.
        assert!(EncodedPolyline::new("_p~iF").is_none());
        // Bytes below the base-64 alphabet.
        assert!(EncodedPolyline::new("_p~iF !").is_none());
    }

    #[test]
    fn decode_precision_6() {
        let polyline =
            EncodedPolyline::with_precision("_izlhA~rlgdF", EncodedPolyline::PRECISION_6).unwrap();
        let points = polyline.lon_lat_points();
        assert_eq!(points.len(), 1);
        assert_close(points[0], Point::new(-120.2, 38.5));
    }
}
