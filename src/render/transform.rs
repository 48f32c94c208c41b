//! 2D view transform from route coordinates to the screen.

use crate::geometry::{LatLon, Point};
use crate::route::ProjectionMode;

/// Affine mapping from world coordinates to clip space, as passed to shaders:
/// `clip = world * scale + translate`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewUniforms {
    /// Scale factor of each axis.
    pub scale: [f32; 2],
    /// Translation of each axis.
    pub translate: [f32; 2],
}

/// 2D view representing where the window is looking at.
///
/// Route coordinates are first projected into world coordinates, whose y axis
/// points down like the screen's:
/// - planar coordinates are flipped vertically, as their y axis points north,
/// - Mercator (longitude, latitude) coordinates are projected on the unit
///   square.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    /// Window width, in pixels.
    width: f64,
    /// Window height, in pixels.
    height: f64,
    /// Current zoom level, measured in pixels per world unit.
    zoom: f64,
    /// World coordinates at the center of the window.
    center: Point<f64>,
    /// Coordinate space of the routes.
    projection: ProjectionMode,
}

impl Transform {
    /// Minimum zoom level, in pixels per world unit.
    const MIN_ZOOM: f64 = 1.0 / 33_554_432.0;
    /// Maximum zoom level, in pixels per world unit.
    const MAX_ZOOM: f64 = /* 2^25 */ 33_554_432.0;

    /// Returns a default view, based on the given window size: one world unit
    /// spans the smallest window dimension.
    pub fn new(width: u32, height: u32, projection: ProjectionMode) -> Self {
        let center = match projection {
            ProjectionMode::Planar => Point::new(0.0, 0.0),
            ProjectionMode::Mercator => Point::new(0.5, 0.5),
        };
        Self {
            width: width as f64,
            height: height as f64,
            zoom: std::cmp::min(width, height).max(1) as f64,
            center,
            projection,
        }
    }

    /// Returns the window width, in pixels.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Returns the window height, in pixels.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Returns the zoom level, in pixels per world unit.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Returns the world coordinates at the center of the window.
    pub fn center(&self) -> Point<f64> {
        self.center
    }

    /// Returns the coordinate space of the routes.
    pub fn projection(&self) -> ProjectionMode {
        self.projection
    }

    /// Sets the zoom level, in pixels per world unit.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
    }

    /// Centers the view on a point in route coordinates.
    pub fn set_center(&mut self, point: &Point<f64>) {
        self.center = self.project(point);
    }

    /// Centers and zooms the view so that the box between `min` and `max`
    /// (route coordinates) is visible, with a margin of `padding` pixels.
    pub fn fit_bounds(&mut self, min: &Point<f64>, max: &Point<f64>, padding: f64) {
        let a = self.project(min);
        let b = self.project(max);
        self.center = a.lerp(&b, 0.5);

        let span_x = (a.x - b.x).abs();
        let span_y = (a.y - b.y).abs();
        let room_x = (self.width - 2.0 * padding).max(1.0);
        let room_y = (self.height - 2.0 * padding).max(1.0);
        let zoom = match (span_x > 0.0, span_y > 0.0) {
            (true, true) => (room_x / span_x).min(room_y / span_y),
            (true, false) => room_x / span_x,
            (false, true) => room_y / span_y,
            (false, false) => self.zoom,
        };
        self.set_zoom(zoom);
    }

    /// Projects a point from route coordinates to world coordinates.
    pub fn project(&self, point: &Point<f64>) -> Point<f64> {
        Self::project_point(self.projection, point)
    }

    /// Projects a point from the given coordinate space to world coordinates.
    pub fn project_point(projection: ProjectionMode, point: &Point<f64>) -> Point<f64> {
        match projection {
            ProjectionMode::Planar => Point::new(point.x, -point.y),
            ProjectionMode::Mercator => LatLon::from_lon_lat(point).as_mercator(),
        }
    }

    /// Converts a point from world coordinates to window pixel coordinates.
    pub fn world_to_screen(&self, world: &Point<f64>) -> Point<f64> {
        Point::new(
            (world.x - self.center.x) * self.zoom + self.width / 2.0,
            (world.y - self.center.y) * self.zoom + self.height / 2.0,
        )
    }

    /// Converts a point from route coordinates to window pixel coordinates.
    pub fn to_screen(&self, point: &Point<f64>) -> Point<f64> {
        self.world_to_screen(&self.project(point))
    }

    /// Converts a point from route coordinates to clip space, where the window
    /// spans `[-1, 1]` on both axes.
    pub fn to_clip(&self, point: &Point<f64>) -> Point<f64> {
        let screen = self.to_screen(point);
        Point::new(
            screen.x / self.width * 2.0 - 1.0,
            screen.y / self.height * 2.0 - 1.0,
        )
    }

    /// Returns the mapping from world coordinates to clip space.
    pub fn view_uniforms(&self) -> ViewUniforms {
        let sx = 2.0 * self.zoom / self.width;
        let sy = 2.0 * self.zoom / self.height;
        ViewUniforms {
            scale: [sx as f32, sy as f32],
            translate: [(-self.center.x * sx) as f32, (-self.center.y * sy) as f32],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn close(a: Point<f64>, b: Point<f64>) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn center_maps_to_middle() {
        let mut transform = Transform::new(800, 600, ProjectionMode::Planar);
        transform.set_center(&Point::new(10.0, 20.0));
        assert!(close(
            transform.to_screen(&Point::new(10.0, 20.0)),
            Point::new(400.0, 300.0)
        ));
        assert!(close(
            transform.to_clip(&Point::new(10.0, 20.0)),
            Point::new(0.0, 0.0)
        ));
    }

    #[test]
    fn planar_north_is_up() {
        let transform = Transform::new(100, 100, ProjectionMode::Planar);
        let origin = transform.to_screen(&Point::new(0.0, 0.0));
        let north = transform.to_screen(&Point::new(0.0, 0.1));
        assert!(north.y < origin.y);
        assert_eq!(north.x, origin.x);
    }

    #[test]
    fn mercator_projection() {
        let transform = Transform::new(256, 256, ProjectionMode::Mercator);
        // Null island is at the center of the world.
        assert!(close(
            transform.to_screen(&Point::new(0.0, 0.0)),
            Point::new(128.0, 128.0)
        ));
        let north = transform.to_screen(&Point::new(0.0, 45.0));
        let east = transform.to_screen(&Point::new(90.0, 0.0));
        assert!(north.y < 128.0);
        assert!((east.x - 192.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut transform = Transform::new(100, 100, ProjectionMode::Planar);
        assert_eq!(transform.zoom(), 100.0);
        transform.set_zoom(1e12);
        assert_eq!(transform.zoom(), Transform::MAX_ZOOM);
        transform.set_zoom(0.0);
        assert_eq!(transform.zoom(), Transform::MIN_ZOOM);
    }

    #[test]
    fn fit_bounds_shows_corners() {
        let mut transform = Transform::new(800, 400, ProjectionMode::Planar);
        let min = Point::new(-50.0, -50.0);
        let max = Point::new(50.0, 50.0);
        transform.fit_bounds(&min, &max, 20.0);
        for corner in [min, max, Point::new(min.x, max.y), Point::new(max.x, min.y)] {
            let clip = transform.to_clip(&corner);
            assert!(clip.x.abs() <= 1.0 && clip.y.abs() <= 1.0);
        }
        assert!((transform.zoom() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn uniforms_match_clip() {
        let mut transform = Transform::new(640, 480, ProjectionMode::Planar);
        transform.set_center(&Point::new(3.0, -2.0));
        transform.set_zoom(12.5);
        let uniforms = transform.view_uniforms();
        let point = Point::new(7.0, 4.0);
        let world = transform.project(&point);
        let clip = transform.to_clip(&point);
        let x = world.x as f32 * uniforms.scale[0] + uniforms.translate[0];
        let y = world.y as f32 * uniforms.scale[1] + uniforms.translate[1];
        assert!((x as f64 - clip.x).abs() < 1e-5);
        assert!((y as f64 - clip.y).abs() < 1e-5);
    }
}
