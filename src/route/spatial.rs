//! R-tree of route segments, to answer nearest-point queries on long routes
//! without testing every segment.

use crate::geometry::{project_onto_segment, Point};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A route segment, as stored in the R-tree.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedSegment {
    /// Index of the segment along the route.
    pub index: usize,
    /// Start vertex.
    pub a: Point<f64>,
    /// End vertex.
    pub b: Point<f64>,
    /// Squared length under which the segment is treated as a point.
    epsilon: f64,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a.to_array(), self.b.to_array())
    }
}

impl PointDistance for IndexedSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let query = Point::new(point[0], point[1]);
        project_onto_segment(&self.a, &self.b, &query, self.epsilon).distance_sq
    }
}

/// Spatial index over the segments of a polyline.
#[derive(Clone, Debug)]
pub struct SegmentIndex {
    tree: RTree<IndexedSegment>,
}

impl SegmentIndex {
    /// Bulk-loads the segments of the given polyline.
    pub fn new(points: &[Point<f64>], epsilon: f64) -> Self {
        let segments = points
            .windows(2)
            .enumerate()
            .map(|(index, w)| IndexedSegment {
                index,
                a: w[0],
                b: w[1],
                epsilon,
            })
            .collect();
        SegmentIndex {
            tree: RTree::bulk_load(segments),
        }
    }

    /// Returns the number of indexed segments.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Checks whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Returns the index of the segment closest to `query`.
    ///
    /// Among segments at the same distance, the one with the lowest index
    /// wins, so that the answer is the same as a linear scan keeping the first
    /// strict minimum.
    pub fn nearest_segment(&self, query: &Point<f64>) -> Option<usize> {
        let q = query.to_array();
        let nearest = self.tree.nearest_neighbor(&q)?;
        let best_distance_2 = nearest.distance_2(&q);

        // All the segments at the minimal distance have their envelope within
        // that distance of the query.
        let radius = best_distance_2.sqrt();
        let radius = radius + radius.max(1.0) * 1e-9;
        let search = AABB::from_corners([q[0] - radius, q[1] - radius], [q[0] + radius, q[1] + radius]);

        let mut best = (best_distance_2, nearest.index);
        for segment in self.tree.locate_in_envelope_intersecting(&search) {
            let d2 = segment.distance_2(&q);
            if d2 < best.0 || (d2 == best.0 && segment.index < best.1) {
                best = (d2, segment.index);
            }
        }
        Some(best.1)
    }
}
