//! Mapping between progress values in `[0, 1]` and points along a route: the
//! vanishing point of the traveled portion, and the nearest point to a GPS fix
//! or a pick.

use super::geometry::RouteGeometry;
use super::Precision;
use crate::geometry::{project_onto_segment, Point};

/// Closest point of a route to a query point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearestPoint {
    /// Index of the closest segment.
    pub segment: usize,
    /// Parameter of the closest point along that segment, in `[0, 1]`.
    pub fraction: f64,
    /// Closest point.
    pub point: Point<f64>,
    /// Normalized position of the closest point along the route.
    pub percent: f64,
    /// Squared distance between the query and the closest point, in the
    /// coordinate space of the route.
    pub distance_sq: f64,
}

/// Clamps a percentage to `[0, 1]`, mapping NaN to 0.
fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 1.0)
    }
}

impl RouteGeometry {
    /// Finds the segment containing the point at `percent` of the total
    /// distance, with the fraction of that segment to travel to reach it.
    ///
    /// A point exactly on a vertex resolves to the end of the segment before
    /// it. Returns `None` for routes without any segment.
    fn locate(&self, percent: f64) -> Option<(usize, f64)> {
        let distances = self.segment_distances();
        if distances.is_empty() {
            return None;
        }

        let epsilon = self.metric().epsilon();
        let target = clamp_percent(percent) * self.total_distance();
        for (i, &length) in distances.iter().enumerate() {
            let start = self.cumulative_distance(i);
            if start + length >= target - epsilon {
                let fraction = if length > epsilon {
                    ((target - start) / length).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                return Some((i, fraction));
            }
        }
        Some((distances.len() - 1, 1.0))
    }

    /// Returns the point at `percent` of the total distance.
    ///
    /// Percentages at or below 0 map to the first vertex, at or above 1 to the
    /// last vertex. An empty route yields the origin.
    pub fn point_at(&self, percent: f64, precision: Precision) -> Point<f64> {
        self.point_and_bearing(percent, precision).0
    }

    /// Returns the point at `percent` of the total distance, together with the
    /// bearing of the route at that point, in degrees clockwise from north.
    pub fn point_and_bearing(&self, percent: f64, precision: Precision) -> (Point<f64>, f64) {
        let points = self.points();
        if points.len() < 2 {
            return (self.first_point(), 0.0);
        }
        if percent.is_nan() || percent <= 0.0 {
            return (points[0], self.bearing_of_segment(0));
        }
        let last_segment = points.len() - 2;
        if percent >= 1.0 {
            return (self.last_point(), self.bearing_of_segment(last_segment));
        }

        let (i, fraction) = self.locate(percent).unwrap_or((last_segment, 1.0));
        let point = match precision {
            Precision::Fine => points[i].lerp(&points[i + 1], fraction),
            Precision::Coarse => points[i],
        };
        (point, self.bearing_of_segment(i))
    }

    /// Bearing of segment `i`, or of the nearest non-degenerate segment when
    /// it has no length.
    fn bearing_of_segment(&self, i: usize) -> f64 {
        let points = self.points();
        let distances = self.segment_distances();
        let epsilon = self.metric().epsilon();
        let candidate = (i..distances.len())
            .chain((0..i).rev())
            .find(|&j| distances[j] > epsilon);
        match candidate {
            Some(j) => self.metric().bearing(&points[j], &points[j + 1]),
            None => 0.0,
        }
    }

    /// Returns the segment index and the fraction within that segment of the
    /// point at `percent` of the total distance.
    pub fn interval_fraction(&self, percent: f64) -> Option<(usize, f64)> {
        self.locate(percent)
    }

    /// Converts a position given as a vertex index and a fraction of the
    /// following segment into a normalized position along the route.
    ///
    /// The last vertex maps to 1. Indices beyond it yield `None`.
    pub fn normalized_position(&self, index: usize, fraction: f64) -> Option<f64> {
        if index >= self.len() {
            return None;
        }
        let total = self.total_distance();
        if total <= 0.0 {
            return Some(0.0);
        }
        let distances = self.segment_distances();
        if index == distances.len() {
            return Some(1.0);
        }
        let fraction = clamp_percent(fraction);
        let distance = self.cumulative_distance(index) + fraction * distances[index];
        Some(clamp_percent(distance / total))
    }

    /// Converts a distance traveled from the first vertex into a normalized
    /// position.
    pub fn percent_from_distance(&self, distance: f64) -> f64 {
        let total = self.total_distance();
        if total <= 0.0 {
            0.0
        } else {
            clamp_percent(distance / total)
        }
    }

    /// Returns the closest point of the route to `query`.
    ///
    /// Long routes go through their spatial index, which selects the same
    /// point as [`Self::nearest_point_linear`].
    pub fn nearest_point(&self, query: &Point<f64>) -> Option<NearestPoint> {
        match self.segment_index() {
            Some(index) => {
                let segment = index.nearest_segment(query)?;
                Some(self.nearest_point_on_segment(segment, query))
            }
            None => self.nearest_point_linear(query),
        }
    }

    /// Returns the closest point of the route to `query`, testing every
    /// segment. Ties go to the lowest segment index.
    pub fn nearest_point_linear(&self, query: &Point<f64>) -> Option<NearestPoint> {
        let points = self.points();
        match points.len() {
            0 => None,
            1 => {
                let ex = query.x - points[0].x;
                let ey = query.y - points[0].y;
                Some(NearestPoint {
                    segment: 0,
                    fraction: 0.0,
                    point: points[0],
                    percent: 0.0,
                    distance_sq: ex * ex + ey * ey,
                })
            }
            _ => {
                let mut best: Option<NearestPoint> = None;
                for i in 0..points.len() - 1 {
                    let candidate = self.nearest_point_on_segment(i, query);
                    if best.is_none_or(|b| candidate.distance_sq < b.distance_sq) {
                        best = Some(candidate);
                    }
                }
                best
            }
        }
    }

    /// Projects `query` onto segment `i`.
    fn nearest_point_on_segment(&self, i: usize, query: &Point<f64>) -> NearestPoint {
        let points = self.points();
        let projection =
            project_onto_segment(&points[i], &points[i + 1], query, self.metric().epsilon());
        let percent = self
            .normalized_position(i, projection.fraction)
            .unwrap_or(0.0);
        NearestPoint {
            segment: i,
            fraction: projection.fraction,
            point: projection.point,
            percent,
            distance_sq: projection.distance_sq,
        }
    }

    /// Returns the normalized position of the point of the route closest to
    /// `query`, or 0 for an empty route.
    pub fn progress_percent(&self, query: &Point<f64>) -> f64 {
        self.nearest_point(query).map_or(0.0, |n| n.percent)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::DistanceMetric;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_close(a: Point<f64>, b: Point<f64>) {
        assert!(
            (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9,
            "{a:?} != {b:?}"
        );
    }

    fn elbow() -> RouteGeometry {
        RouteGeometry::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
            ],
            DistanceMetric::Planar,
        )
    }

    fn circle(radius: f64, resolution: usize) -> RouteGeometry {
        let points = (0..resolution)
            .map(|i| {
                let angle = i as f64 / resolution as f64 * std::f64::consts::TAU;
                Point::new(radius * angle.sin(), radius * angle.cos())
            })
            .collect();
        RouteGeometry::new(points, DistanceMetric::Planar)
    }

    #[test]
    fn point_at_ends_and_middle() {
        let route = elbow();
        assert_eq!(route.point_at(0.0, Precision::Fine), Point::new(0.0, 0.0));
        assert_eq!(route.point_at(1.0, Precision::Fine), Point::new(10.0, 10.0));
        assert_eq!(route.point_at(-3.0, Precision::Fine), Point::new(0.0, 0.0));
        assert_eq!(route.point_at(7.0, Precision::Fine), Point::new(10.0, 10.0));
        assert_close(route.point_at(0.5, Precision::Fine), Point::new(10.0, 0.0));
        assert_close(route.point_at(0.25, Precision::Fine), Point::new(5.0, 0.0));
        assert_close(route.point_at(0.75, Precision::Fine), Point::new(10.0, 5.0));
    }

    #[test]
    fn point_at_is_distance_based() {
        // Segments of length 2 and 8.
        let route = RouteGeometry::new(
            vec![Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(10.0, 0.0)],
            DistanceMetric::Planar,
        );
        assert_close(route.point_at(0.5, Precision::Fine), Point::new(5.0, 0.0));
        assert_eq!(route.point_at(0.5, Precision::Coarse), Point::new(2.0, 0.0));
        assert_eq!(route.point_at(0.1, Precision::Coarse), Point::new(0.0, 0.0));
    }

    #[test]
    fn degenerate_routes() {
        let empty = RouteGeometry::new(vec![], DistanceMetric::Planar);
        assert_eq!(empty.point_at(0.5, Precision::Fine), Point::new(0.0, 0.0));
        assert_eq!(empty.interval_fraction(0.5), None);
        assert_eq!(empty.progress_percent(&Point::new(1.0, 1.0)), 0.0);
        assert_eq!(empty.normalized_position(0, 0.0), None);

        let single = RouteGeometry::new(vec![Point::new(4.0, 2.0)], DistanceMetric::Planar);
        assert_eq!(single.point_and_bearing(0.5, Precision::Fine), (Point::new(4.0, 2.0), 0.0));
        assert_eq!(single.progress_percent(&Point::new(1.0, 1.0)), 0.0);
        assert_eq!(single.normalized_position(0, 0.5), Some(0.0));
        assert_eq!(single.percent_from_distance(100.0), 0.0);
    }

    #[test]
    fn bearings_follow_the_route() {
        let route = elbow();
        let (_, east) = route.point_and_bearing(0.25, Precision::Fine);
        assert!((east - 90.0).abs() < 1e-9);
        let (_, north) = route.point_and_bearing(0.75, Precision::Fine);
        assert!(north.abs() < 1e-9);
        let (_, end) = route.point_and_bearing(1.0, Precision::Fine);
        assert!(end.abs() < 1e-9);

        // A zero-length segment takes the bearing of its neighbour.
        let stutter = RouteGeometry::new(
            vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0), Point::new(0.0, -5.0)],
            DistanceMetric::Planar,
        );
        let (_, south) = stutter.point_and_bearing(0.0, Precision::Fine);
        assert!((south - 180.0).abs() < 1e-9);
    }

    #[test]
    fn interval_fraction_and_back() {
        let route = elbow();
        assert_eq!(route.interval_fraction(0.0), Some((0, 0.0)));
        assert_eq!(route.interval_fraction(0.25), Some((0, 0.5)));
        // A vertex resolves to the end of the preceding segment.
        assert_eq!(route.interval_fraction(0.5), Some((0, 1.0)));
        assert_eq!(route.interval_fraction(0.75), Some((1, 0.5)));
        assert_eq!(route.interval_fraction(1.0), Some((1, 1.0)));

        for percent in [0.0, 0.1, 0.25, 0.5, 0.6, 0.9, 1.0] {
            let (index, fraction) = route.interval_fraction(percent).unwrap();
            let back = route.normalized_position(index, fraction).unwrap();
            assert!((back - percent).abs() < 1e-12, "{percent} -> {back}");
        }
    }

    #[test]
    fn normalized_position_bounds() {
        let route = elbow();
        assert_eq!(route.normalized_position(0, 0.0), Some(0.0));
        assert_eq!(route.normalized_position(1, 0.0), Some(0.5));
        assert_eq!(route.normalized_position(1, 1.0), Some(1.0));
        assert_eq!(route.normalized_position(2, 0.0), Some(1.0));
        assert_eq!(route.normalized_position(2, 0.7), Some(1.0));
        assert_eq!(route.normalized_position(3, 0.0), None);
        assert_eq!(route.normalized_position(0, 5.0), Some(0.5));
    }

    #[test]
    fn progress_percent_projects_onto_route() {
        let route = elbow();
        assert!((route.progress_percent(&Point::new(5.0, 3.0)) - 0.25).abs() < 1e-12);
        assert!((route.progress_percent(&Point::new(13.0, 5.0)) - 0.75).abs() < 1e-12);
        assert_eq!(route.progress_percent(&Point::new(-4.0, -4.0)), 0.0);
        assert_eq!(route.progress_percent(&Point::new(10.0, 20.0)), 1.0);
        assert_eq!(route.percent_from_distance(5.0), 0.25);
        assert_eq!(route.percent_from_distance(-5.0), 0.0);
    }

    #[test]
    fn progress_inverts_point_at() {
        let route = circle(50.0, 10);
        for i in 0..=100 {
            let p = i as f64 / 100.0;
            let point = route.point_at(p, Precision::Fine);
            let back = route.progress_percent(&point);
            assert!((back - p).abs() < 1e-9, "{p} -> {back}");
        }
    }

    #[test]
    fn circle_points_are_idempotent() {
        let route = circle(50.0, 10);
        let total = route.total_distance();
        for p in [0.25, 0.5, 0.75, 1.0] {
            let a = route.point_at(p, Precision::Fine);
            let b = route.point_at(p, Precision::Fine);
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());

            // On the polygon inscribed in the circle.
            let r = a.x.hypot(a.y);
            assert!(r <= 50.0 + 1e-9 && r >= 50.0 * (std::f64::consts::PI / 10.0).cos() - 1e-9);

            // At the requested arc-length fraction.
            let (index, fraction) = route.interval_fraction(p).unwrap();
            let traveled =
                route.cumulative_distance(index) + fraction * route.segment_distances()[index];
            assert!((traveled - p * total).abs() < 1e-9);
        }
        assert_close(route.point_at(1.0, Precision::Fine), route.last_point());
    }

    #[test]
    fn index_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut cursor = Point::new(0.0, 0.0);
        let mut points = vec![cursor];
        for _ in 0..2 * RouteGeometry::INDEX_THRESHOLD {
            cursor = Point::new(
                cursor.x + rng.random_range(-1.0..1.0),
                cursor.y + rng.random_range(-1.0..1.0),
            );
            points.push(cursor);
        }
        // Revisit some vertices exactly, to create ties.
        points.extend_from_slice(&points[10..20].to_vec());
        let route = RouteGeometry::new(points, DistanceMetric::Planar);
        assert!(route.segment_index().is_some());

        for _ in 0..500 {
            let query = Point::new(rng.random_range(-30.0..30.0), rng.random_range(-30.0..30.0));
            let indexed = route.nearest_point(&query).unwrap();
            let linear = route.nearest_point_linear(&query).unwrap();
            assert_eq!(indexed, linear);
        }
        for p in route.points().to_vec() {
            assert_eq!(route.nearest_point(&p), route.nearest_point_linear(&p));
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_progress_round_trip(p in 0.0..=1.0f64, radius in 1.0..1000.0f64, resolution in 3usize..64) {
                let route = circle(radius, resolution);
                let back = route.progress_percent(&route.point_at(p, Precision::Fine));
                prop_assert!((back - p).abs() < 1e-9);
            }

            #[test]
            fn prop_percent_is_clamped(x in -1e6..1e6f64, y in -1e6..1e6f64) {
                let percent = elbow().progress_percent(&Point::new(x, y));
                prop_assert!((0.0..=1.0).contains(&percent));
            }
        }
    }
}
