//! Navigation routes: geometry, progress, traffic segments and their color
//! ramps, owned by a [`manager::RouteManager`].

pub mod capture;
pub mod channel;
pub mod color_ramp;
pub mod geometry;
pub mod id_pool;
pub mod manager;
pub mod progress;
pub mod segment;
pub mod spatial;
pub mod state;

use crate::geometry::DistanceMetric;
use crate::render::color::{palette, Color};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a route owned by a [`manager::RouteManager`].
///
/// Identifiers are allocated from an [`id_pool::IdPool`], so they are the
/// smallest integers available and get reused once a route is disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(u32);

impl RouteId {
    /// An identifier that never designates a route.
    pub const INVALID: RouteId = RouteId(u32::MAX);

    /// Wraps a raw identifier.
    pub const fn new(id: u32) -> Self {
        RouteId(id)
    }

    /// Returns the raw identifier.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Returns the identifier as an index into the route storage.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks whether this identifier could designate a route.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for RouteId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a traffic segment within one route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u32);

/// How points along a route are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Precision {
    /// Snap to the vertex starting the segment containing the point.
    Coarse,
    /// Interpolate within the segment containing the point.
    #[default]
    Fine,
}

/// Coordinate space of a route geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectionMode {
    /// Points live in a planar (projected or screen) space.
    #[default]
    Planar,
    /// Points are (longitude, latitude) pairs, displayed with Mercator's
    /// projection.
    Mercator,
}

impl ProjectionMode {
    /// Distance metric used to parameterize routes in this space.
    pub fn metric(self) -> DistanceMetric {
        match self {
            ProjectionMode::Planar => DistanceMetric::Planar,
            ProjectionMode::Mercator => DistanceMetric::Haversine,
        }
    }
}

/// Style of a route, fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteOptions {
    /// Color of the route line.
    pub inner_color: Color,
    /// Color of the route casing.
    pub outer_color: Color,
    /// Width of the route line, in pixels.
    pub inner_width: f64,
    /// Width of the route casing, in pixels.
    pub outer_width: f64,
    /// Color of the traveled part of the line.
    pub inner_clip_color: Color,
    /// Color of the traveled part of the casing.
    pub outer_clip_color: Color,
    /// Coordinate space of the geometry.
    pub projection: ProjectionMode,
}

impl Default for RouteOptions {
    fn default() -> Self {
        RouteOptions {
            inner_color: palette::ROUTE,
            outer_color: palette::ROUTE_CASING,
            inner_width: 6.0,
            outer_width: 10.0,
            inner_clip_color: Color::TRANSPARENT,
            outer_clip_color: Color::TRANSPARENT,
            projection: ProjectionMode::Planar,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn route_id_validity() {
        assert!(RouteId::new(0).is_valid());
        assert!(!RouteId::INVALID.is_valid());
        assert!(!RouteId::default().is_valid());
        assert_eq!(RouteId::new(7).index(), 7);
    }

    #[test]
    fn options_from_partial_json() {
        let options: RouteOptions =
            serde_json::from_str(r##"{"innerColor": "#FF0000", "projection": "mercator"}"##)
                .unwrap();
        assert_eq!(options.inner_color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(options.outer_width, 10.0);
        assert_eq!(options.projection.metric(), DistanceMetric::Haversine);
    }
}
