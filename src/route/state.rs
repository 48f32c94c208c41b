//! A single route: its geometry, style, progress and traffic segments.

use super::color_ramp::{ColorRamp, ColorSpan};
use super::geometry::RouteGeometry;
use super::segment::{RouteSegmentOptions, SegmentAddressing, SegmentTable};
use super::{Precision, RouteOptions, SegmentId};
use crate::geometry::Point;
use crate::render::color::Color;
use std::sync::Arc;

/// Color ramps of the line and of the casing of a route.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteRamps {
    /// Ramp of the route line.
    pub inner: ColorRamp,
    /// Ramp of the route casing.
    pub outer: ColorRamp,
}

/// A navigation route.
#[derive(Clone, Debug)]
pub struct Route {
    geometry: Arc<RouteGeometry>,
    options: RouteOptions,
    /// Creation counter, distinguishing routes that reuse an identifier.
    serial: u64,
    progress: f64,
    progress_point: Point<f64>,
    segments: SegmentTable,
    /// Ramps built from the segments, before applying the progress.
    segment_ramps: Option<RouteRamps>,
}

impl Route {
    /// Creates a route from its polyline.
    pub fn new(points: Vec<Point<f64>>, options: RouteOptions, serial: u64) -> Self {
        let geometry = Arc::new(RouteGeometry::new(points, options.projection.metric()));
        let progress_point = geometry.first_point();
        Route {
            geometry,
            options,
            serial,
            progress: 0.0,
            progress_point,
            segments: SegmentTable::default(),
            segment_ramps: None,
        }
    }

    /// Returns the geometry of this route.
    pub fn geometry(&self) -> &Arc<RouteGeometry> {
        &self.geometry
    }

    /// Returns the style of this route.
    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Returns the creation serial of this route.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns the traveled fraction of the route.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Returns the point at the current progress.
    pub fn progress_point(&self) -> Point<f64> {
        self.progress_point
    }

    /// Sets the traveled fraction of the route, clamped to `[0, 1]`.
    pub fn set_progress(&mut self, percent: f64) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 1.0)
        };
        self.progress = percent;
        self.progress_point = self.geometry.point_at(percent, Precision::Fine);
    }

    /// Returns the traffic segments.
    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    /// Adds a traffic segment.
    pub fn segment_create(
        &mut self,
        options: RouteSegmentOptions,
        addressing: SegmentAddressing,
    ) -> Option<SegmentId> {
        let id = self.segments.insert(options, &self.geometry, addressing)?;
        self.segment_ramps = None;
        Some(id)
    }

    /// Replaces a traffic segment.
    pub fn segment_update(
        &mut self,
        id: SegmentId,
        options: RouteSegmentOptions,
        addressing: SegmentAddressing,
    ) -> bool {
        let updated = self.segments.update(id, options, &self.geometry, addressing);
        if updated {
            self.segment_ramps = None;
        }
        updated
    }

    /// Removes a traffic segment.
    pub fn segment_dispose(&mut self, id: SegmentId) -> bool {
        let removed = self.segments.remove(id);
        if removed {
            self.segment_ramps = None;
        }
        removed
    }

    /// Removes all traffic segments.
    pub fn segments_clear(&mut self) {
        self.segments.clear();
        self.segment_ramps = None;
    }

    /// Returns the colored spans of the segments, with the color picked by
    /// `color`.
    fn spans(&self, color: impl Fn(&RouteSegmentOptions) -> Color) -> Vec<ColorSpan> {
        self.segments
            .segments()
            .iter()
            .enumerate()
            .map(|(order, segment)| ColorSpan {
                range: segment.range(),
                priority: segment.options().priority,
                order,
                color: color(segment.options()),
            })
            .collect()
    }

    /// Returns the ramps of the segments alone, building them if the segments
    /// changed since the last call.
    pub fn segment_ramps(&mut self) -> &RouteRamps {
        let ramps = match self.segment_ramps.take() {
            Some(ramps) => ramps,
            None => RouteRamps {
                inner: ColorRamp::from_spans(&self.spans(|o| o.color), self.options.inner_color),
                outer: ColorRamp::from_spans(
                    &self.spans(|o| o.outer_color),
                    self.options.outer_color,
                ),
            },
        };
        self.segment_ramps.insert(ramps)
    }

    /// Returns the ramps to draw the route with: the segment ramps with the
    /// traveled range painted in the clip colors.
    pub fn ramps(&mut self) -> RouteRamps {
        let progress = self.progress;
        let inner_clip = self.options.inner_clip_color;
        let outer_clip = self.options.outer_clip_color;
        let ramps = self.segment_ramps();
        RouteRamps {
            inner: ramps.inner.with_progress(progress, inner_clip),
            outer: ramps.outer.with_progress(progress, outer_clip),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::route::color_ramp::RAMP_EPSILON;

    const RED: Color = Color([1.0, 0.0, 0.0, 1.0]);
    const BLACK: Color = Color([0.0, 0.0, 0.0, 1.0]);

    fn route() -> Route {
        let points = (0..=10).map(|i| Point::new(i as f64, 0.0)).collect();
        Route::new(
            points,
            RouteOptions {
                inner_clip_color: Color::WHITE,
                outer_clip_color: Color::WHITE,
                ..Default::default()
            },
            0,
        )
    }

    fn traffic(first: u32, last: u32) -> RouteSegmentOptions {
        RouteSegmentOptions {
            first_index: first,
            last_index: last,
            last_index_fraction: 0.0,
            color: RED,
            outer_color: BLACK,
            ..Default::default()
        }
    }

    #[test]
    fn progress_moves_point() {
        let mut route = route();
        assert_eq!(route.progress_point(), Point::new(0.0, 0.0));
        route.set_progress(0.25);
        assert_eq!(route.progress(), 0.25);
        assert_eq!(route.progress_point(), Point::new(2.5, 0.0));
        route.set_progress(3.0);
        assert_eq!(route.progress(), 1.0);
        assert_eq!(route.progress_point(), Point::new(10.0, 0.0));
    }

    #[test]
    fn ramps_follow_segments() {
        let mut route = route();
        let base = route.options().inner_color;
        assert_eq!(route.ramps().inner, ColorRamp::flat(base));

        let id = route
            .segment_create(traffic(2, 4), SegmentAddressing::IndexFractions)
            .unwrap();
        let ramps = route.ramps();
        assert_eq!(ramps.inner.color_at(0.3), RED);
        assert_eq!(ramps.outer.color_at(0.3), BLACK);
        assert_eq!(ramps.inner.color_at(0.5), base);

        assert!(route.segment_update(id, traffic(6, 8), SegmentAddressing::IndexFractions));
        assert_eq!(route.ramps().inner.color_at(0.3), base);
        assert_eq!(route.ramps().inner.color_at(0.7), RED);

        assert!(route.segment_dispose(id));
        assert_eq!(route.ramps().inner, ColorRamp::flat(base));
    }

    #[test]
    fn rejected_segment_keeps_ramps() {
        let mut route = route();
        route.segment_create(traffic(2, 4), SegmentAddressing::IndexFractions);
        let before = route.ramps();
        assert!(route
            .segment_create(traffic(2, 40), SegmentAddressing::IndexFractions)
            .is_none());
        assert_eq!(route.ramps(), before);
        assert_eq!(route.segments().len(), 1);
    }

    #[test]
    fn progress_clips_ramps() {
        let mut route = route();
        route.segment_create(traffic(2, 4), SegmentAddressing::IndexFractions);
        route.set_progress(0.3);
        let ramps = route.ramps();
        assert_eq!(ramps.inner.color_at(0.1), Color::WHITE);
        assert_eq!(ramps.inner.color_at(0.3), Color::WHITE);
        assert_eq!(ramps.inner.color_at(0.3 + RAMP_EPSILON), RED);
        assert_eq!(ramps.outer.color_at(0.35), BLACK);

        route.segments_clear();
        assert!(route.segments().is_empty());
        assert_eq!(route.ramps().inner.color_at(0.5), route.options().inner_color);
    }
}
