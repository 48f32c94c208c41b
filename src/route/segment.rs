//! Traffic segments: colored sub-ranges of a route, addressed by vertex
//! indices and fractions or by explicit geometry.

use super::geometry::RouteGeometry;
use super::SegmentId;
use crate::geometry::Point;
use crate::render::color::Color;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Description of a traffic segment, as given by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteSegmentOptions {
    /// Vertex starting the segment.
    pub first_index: u32,
    /// Fraction of the route segment following `first_index` where the
    /// segment starts.
    pub first_index_fraction: f64,
    /// Vertex ending the segment.
    pub last_index: u32,
    /// Fraction of the route segment following `last_index` where the segment
    /// ends.
    pub last_index_fraction: f64,
    /// Color of the route line over the segment.
    pub color: Color,
    /// Color of the route casing over the segment.
    pub outer_color: Color,
    /// Segments with a higher priority are drawn over overlapping ones.
    pub priority: u32,
    /// Explicit geometry of the segment, used when segments are addressed by
    /// geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Vec<Point<f64>>>,
}

impl Default for RouteSegmentOptions {
    fn default() -> Self {
        RouteSegmentOptions {
            first_index: 0,
            first_index_fraction: 0.0,
            last_index: 0,
            last_index_fraction: 1.0,
            color: Color::WHITE,
            outer_color: Color::WHITE,
            priority: 0,
            geometry: None,
        }
    }
}

/// How the bounds of new segments are given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentAddressing {
    /// Vertex indices plus fractions of the following route segments.
    #[default]
    IndexFractions,
    /// First and last points of the segment geometry, projected onto the
    /// route.
    Geometry,
}

/// A sub-range of a route, as normalized positions in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedRange {
    /// Start position.
    pub start: f64,
    /// End position, not less than the start.
    pub end: f64,
}

impl NormalizedRange {
    /// Checks whether the range covers no distance at all.
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    /// Checks whether a position lies within the range.
    pub fn contains(&self, position: f64) -> bool {
        self.start <= position && position <= self.end
    }
}

/// A traffic segment resolved against its route.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteSegment {
    id: SegmentId,
    options: RouteSegmentOptions,
    addressing: SegmentAddressing,
    range: NormalizedRange,
}

impl RouteSegment {
    /// Resolves segment options against a route geometry.
    ///
    /// Returns `None` if the options address vertices outside of the route,
    /// lack a geometry in [`SegmentAddressing::Geometry`] mode, or end before
    /// they start.
    pub fn resolve(
        id: SegmentId,
        options: RouteSegmentOptions,
        route: &RouteGeometry,
        addressing: SegmentAddressing,
    ) -> Option<Self> {
        let range = match addressing {
            SegmentAddressing::IndexFractions => {
                let start =
                    route.normalized_position(options.first_index as usize, options.first_index_fraction);
                let end =
                    route.normalized_position(options.last_index as usize, options.last_index_fraction);
                match (start, end) {
                    (Some(start), Some(end)) => NormalizedRange { start, end },
                    _ => {
                        warn!(
                            "Segment indices [{}, {}] are outside of the route ({} points)",
                            options.first_index,
                            options.last_index,
                            route.len()
                        );
                        return None;
                    }
                }
            }
            SegmentAddressing::Geometry => {
                let geometry = options.geometry.as_deref().unwrap_or_default();
                let (Some(first), Some(last)) = (geometry.first(), geometry.last()) else {
                    warn!("Segment has no geometry to place it on the route");
                    return None;
                };
                NormalizedRange {
                    start: route.progress_percent(first),
                    end: route.progress_percent(last),
                }
            }
        };

        if range.start > range.end {
            warn!(
                "Segment ends at {} before it starts at {}",
                range.end, range.start
            );
            return None;
        }
        debug!("Segment {:?} spans [{}, {}]", id, range.start, range.end);

        Some(RouteSegment {
            id,
            options,
            addressing,
            range,
        })
    }

    /// Returns the identifier of this segment.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns the options this segment was created with.
    pub fn options(&self) -> &RouteSegmentOptions {
        &self.options
    }

    /// Returns how the options of this segment were resolved.
    pub fn addressing(&self) -> SegmentAddressing {
        self.addressing
    }

    /// Returns the normalized positions covered by this segment.
    pub fn range(&self) -> NormalizedRange {
        self.range
    }
}

/// Traffic segments of one route, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct SegmentTable {
    segments: Vec<RouteSegment>,
    next_id: u32,
}

impl SegmentTable {
    /// Resolves and appends a segment.
    pub fn insert(
        &mut self,
        options: RouteSegmentOptions,
        route: &RouteGeometry,
        addressing: SegmentAddressing,
    ) -> Option<SegmentId> {
        let id = SegmentId(self.next_id);
        let segment = RouteSegment::resolve(id, options, route, addressing)?;
        self.next_id += 1;
        self.segments.push(segment);
        Some(id)
    }

    /// Replaces a segment, keeping its position in the insertion order.
    pub fn update(
        &mut self,
        id: SegmentId,
        options: RouteSegmentOptions,
        route: &RouteGeometry,
        addressing: SegmentAddressing,
    ) -> bool {
        let Some(slot) = self.segments.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        match RouteSegment::resolve(id, options, route, addressing) {
            Some(segment) => {
                *slot = segment;
                true
            }
            None => false,
        }
    }

    /// Removes a segment.
    pub fn remove(&mut self, id: SegmentId) -> bool {
        let before = self.segments.len();
        self.segments.retain(|s| s.id != id);
        self.segments.len() != before
    }

    /// Removes all segments.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Returns a segment by identifier.
    pub fn get(&self, id: SegmentId) -> Option<&RouteSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Returns the segments, in insertion order.
    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Checks whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
