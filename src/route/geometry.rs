//! Immutable route polylines with their precomputed distances.

use super::spatial::SegmentIndex;
use crate::geometry::{DistanceMetric, Point};
use log::debug;

/// A route polyline, parameterized by the distance traveled along it.
///
/// Distances are computed once at construction.
#[derive(Clone, Debug)]
pub struct RouteGeometry {
    points: Vec<Point<f64>>,
    /// Length of each segment, `segment_distances[i]` being the distance
    /// between `points[i]` and `points[i + 1]`.
    segment_distances: Vec<f64>,
    /// Distance from the first point to the start of each segment.
    cumulative: Vec<f64>,
    total_distance: f64,
    metric: DistanceMetric,
    /// Spatial index of the segments, for long routes.
    index: Option<SegmentIndex>,
}

impl RouteGeometry {
    /// Number of segments from which nearest-point queries go through a
    /// spatial index.
    pub const INDEX_THRESHOLD: usize = 256;

    /// Creates a route geometry, measured with the given metric.
    pub fn new(points: Vec<Point<f64>>, metric: DistanceMetric) -> Self {
        let segment_distances: Vec<f64> = points
            .windows(2)
            .map(|w| metric.distance(&w[0], &w[1]))
            .collect();

        let mut cumulative = Vec::with_capacity(segment_distances.len());
        let mut total_distance = 0.0;
        for d in &segment_distances {
            cumulative.push(total_distance);
            total_distance += d;
        }

        let index = if segment_distances.len() >= Self::INDEX_THRESHOLD {
            debug!(
                "Indexing {} segments for nearest-point queries",
                segment_distances.len()
            );
            Some(SegmentIndex::new(&points, metric.epsilon()))
        } else {
            None
        };

        RouteGeometry {
            points,
            segment_distances,
            cumulative,
            total_distance,
            metric,
            index,
        }
    }

    /// Returns the vertices of the polyline.
    pub fn points(&self) -> &[Point<f64>] {
        &self.points
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Checks whether the polyline has no vertex.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the length of each segment.
    pub fn segment_distances(&self) -> &[f64] {
        &self.segment_distances
    }

    /// Returns the distance from the first vertex to the start of segment `i`.
    pub fn cumulative_distance(&self, i: usize) -> f64 {
        self.cumulative.get(i).copied().unwrap_or(self.total_distance)
    }

    /// Returns the total length of the polyline.
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Returns the metric distances are measured with.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Returns the spatial index of the segments, if the route is long enough
    /// to have one.
    pub fn segment_index(&self) -> Option<&SegmentIndex> {
        self.index.as_ref()
    }

    /// Returns the first vertex, or the origin for an empty polyline.
    pub fn first_point(&self) -> Point<f64> {
        self.points.first().copied().unwrap_or_default()
    }

    /// Returns the last vertex, or the origin for an empty polyline.
    pub fn last_point(&self) -> Point<f64> {
        self.points.last().copied().unwrap_or_default()
    }

    /// Returns the bounding box of the polyline, as (min, max) corners.
    pub fn bounding_box(&self) -> Option<(Point<f64>, Point<f64>)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distances_are_precomputed() {
        let geometry = RouteGeometry::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(3.0, 4.0),
                Point::new(3.0, 10.0),
                Point::new(3.0, 10.0),
            ],
            DistanceMetric::Planar,
        );
        assert_eq!(geometry.len(), 4);
        assert_eq!(geometry.segment_distances(), &[5.0, 6.0, 0.0]);
        assert_eq!(geometry.segment_distances().len() + 1, geometry.len());
        assert_eq!(geometry.total_distance(), 11.0);
        assert_eq!(geometry.cumulative_distance(0), 0.0);
        assert_eq!(geometry.cumulative_distance(2), 11.0);
        assert_eq!(geometry.cumulative_distance(10), 11.0);
        assert!(geometry.segment_index().is_none());
    }

    #[test]
    fn total_is_sum_of_segments() {
        let points: Vec<_> = (0..50)
            .map(|i| {
                let t = i as f64 * 0.3;
                Point::new(t.cos() * t, t.sin() * 2.0)
            })
            .collect();
        let geometry = RouteGeometry::new(points, DistanceMetric::Planar);
        let sum: f64 = geometry.segment_distances().iter().sum();
        assert_eq!(geometry.segment_distances().len(), 49);
        assert!((geometry.total_distance() - sum).abs() < 1e-9);
    }

    #[test]
    fn degenerate_geometries() {
        let empty = RouteGeometry::new(vec![], DistanceMetric::Planar);
        assert!(empty.is_empty());
        assert_eq!(empty.total_distance(), 0.0);
        assert_eq!(empty.first_point(), Point::new(0.0, 0.0));
        assert!(empty.bounding_box().is_none());

        let single = RouteGeometry::new(vec![Point::new(2.0, 3.0)], DistanceMetric::Haversine);
        assert_eq!(single.total_distance(), 0.0);
        assert!(single.segment_distances().is_empty());
        assert_eq!(single.last_point(), Point::new(2.0, 3.0));
    }

    #[test]
    fn haversine_route_in_meters() {
        let geometry = RouteGeometry::new(
            vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0), Point::new(0.0, 2.0)],
            DistanceMetric::Haversine,
        );
        let degree = crate::geometry::EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;
        assert!((geometry.total_distance() - 2.0 * degree).abs() < 1e-6);
    }

    #[test]
    fn long_routes_are_indexed() {
        let points: Vec<_> = (0..=RouteGeometry::INDEX_THRESHOLD)
            .map(|i| Point::new(i as f64, 0.0))
            .collect();
        let geometry = RouteGeometry::new(points, DistanceMetric::Planar);
        assert!(geometry.segment_index().is_some());
        assert_eq!(
            geometry.bounding_box(),
            Some((
                Point::new(0.0, 0.0),
                Point::new(RouteGeometry::INDEX_THRESHOLD as f64, 0.0)
            ))
        );
    }
}
