//! Rendering of routes and their overlays through a [`backend::RenderBackend`].

pub mod backend;
pub mod color;
pub mod dots;
pub mod picking;
pub mod route_layer;
pub mod tessellator;
pub mod transform;
pub mod vanishing_line;

use crate::geometry::Point;
use crate::route::manager::RouteSnapshot;
use backend::{BackendScope, RenderBackend};
use dots::{Dots, DotsHandle};
use log::debug;
use route_layer::RouteLayer;
use std::fmt::Display;
use tessellator::Tessellator;
use transform::Transform;
use vanishing_line::{VanishingLine, VanishingLineHandle};

/// Location puck state, passed explicitly to each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PuckState {
    /// Location of the puck, in route coordinates.
    pub location: Point<f64>,
    /// Bearing of the puck, in degrees clockwise from north.
    pub bearing: f64,
    /// Whether the puck is drawn.
    pub visible: bool,
}

/// Inputs of a frame, besides the routes.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameState {
    /// View of the frame.
    pub transform: Transform,
    /// State of the puck.
    pub puck: PuckState,
}

/// Statistics about a rendered frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Number of routes drawn.
    pub routes_drawn: usize,
    /// Number of route meshes tessellated and uploaded.
    pub meshes_built: usize,
    /// Number of route meshes released.
    pub meshes_released: usize,
    /// Number of routes whose gradients were uploaded.
    pub ramps_uploaded: usize,
    /// Number of vertices of the vanishing line.
    pub blue_line_vertices: usize,
    /// Number of dots drawn.
    pub dots_drawn: usize,
    /// Whether the puck was drawn.
    pub puck_drawn: bool,
}

impl Display for RenderStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} routes drawn ({} built, {} released, {} ramps uploaded), {} blue line vertices, {} dots{}",
            self.routes_drawn,
            self.meshes_built,
            self.meshes_released,
            self.ramps_uploaded,
            self.blue_line_vertices,
            self.dots_drawn,
            if self.puck_drawn { ", puck" } else { "" }
        )
    }
}

/// Renders the routes of snapshots, the vanishing line, the dots and the
/// puck. Lives on the render thread.
pub struct RouteRenderer<T: Tessellator> {
    routes: RouteLayer<T>,
    blue_line: VanishingLine,
    blue_line_handle: VanishingLineHandle,
    dots: Dots,
    dots_handle: DotsHandle,
}

impl<T: Tessellator> RouteRenderer<T> {
    /// Creates a renderer using the given tessellator for routes.
    pub fn new(tessellator: T) -> Self {
        let (blue_line_handle, blue_line) = vanishing_line::vanishing_line();
        let (dots_handle, dots) = dots::dots();
        RouteRenderer {
            routes: RouteLayer::new(tessellator),
            blue_line,
            blue_line_handle,
            dots,
            dots_handle,
        }
    }

    /// Returns a handle to update the vanishing line from any thread.
    pub fn blue_line_handle(&self) -> VanishingLineHandle {
        self.blue_line_handle.clone()
    }

    /// Returns a handle to update the dots from any thread.
    pub fn dots_handle(&self) -> DotsHandle {
        self.dots_handle.clone()
    }

    /// Draws a frame: routes first, then the vanishing line, the dots and the
    /// puck on top.
    pub fn render<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        snapshot: &RouteSnapshot,
        frame: &FrameState,
    ) -> RenderStats {
        let mut stats = RenderStats::default();
        let mut scope = BackendScope::enter(backend);

        self.routes.update(&mut scope, snapshot, &mut stats);
        self.routes
            .draw(&mut scope, snapshot, &frame.transform, &mut stats);
        self.blue_line
            .draw(&mut scope, &frame.transform, &mut stats);
        self.dots.draw(&mut scope, &frame.transform, &mut stats);

        if frame.puck.visible {
            let position = frame.transform.to_screen(&frame.puck.location);
            scope.draw_puck(position, &frame.puck);
            stats.puck_drawn = true;
        }

        debug!("Frame {}: {}", snapshot.generation, stats);
        stats
    }

    /// Releases all GPU resources.
    pub fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        let mut scope = BackendScope::enter(backend);
        self.routes.release_all(&mut scope);
        self.blue_line.release_all(&mut scope);
        self.dots.release_all(&mut scope);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::render::backend::{DrawCommand, RecordingBackend};
    use crate::render::tessellator::StrokeTessellator;
    use crate::route::manager::RouteManager;
    use crate::route::{ProjectionMode, RouteOptions};

    fn frame(puck: PuckState) -> FrameState {
        let mut transform = Transform::new(400, 400, ProjectionMode::Planar);
        transform.set_zoom(10.0);
        FrameState { transform, puck }
    }

    #[test]
    fn draw_order() {
        let mut manager = RouteManager::new();
        let line = vec![Point::new(-10.0, 0.0), Point::new(10.0, 0.0)];
        let id = manager
            .route_create(line.clone(), RouteOptions::default())
            .unwrap();
        manager.route_set_progress_percent(id, 0.25);
        let snapshot = manager.finalize();

        let mut renderer = RouteRenderer::new(StrokeTessellator::default());
        let mut backend = RecordingBackend::new();
        renderer.blue_line_handle().set_line(line.clone()).unwrap();
        renderer.blue_line_handle().set_percent(0.25).unwrap();
        renderer.dots_handle().set_points(line).unwrap();
        renderer.dots_handle().set_enabled(true).unwrap();

        let puck = PuckState {
            location: manager.route_progress_point(id).unwrap(),
            bearing: 90.0,
            visible: true,
        };
        let stats = renderer.render(&mut backend, &snapshot, &frame(puck));
        assert_eq!(stats.routes_drawn, 1);
        assert_eq!(stats.meshes_built, 1);
        assert_eq!(stats.blue_line_vertices, 2);
        assert_eq!(stats.dots_drawn, 2);
        assert!(stats.puck_drawn);

        let commands = backend.take_commands();
        assert_eq!(commands.len(), 4);
        assert!(matches!(commands[0], DrawCommand::Route(_)));
        assert!(matches!(&commands[1], DrawCommand::Line { vertices, .. } if vertices[0] == [-0.25, 0.0]));
        assert!(matches!(commands[2], DrawCommand::Dots { .. }));
        assert_eq!(
            commands[3],
            DrawCommand::Puck {
                position: Point::new(150.0, 200.0),
                bearing: 90.0
            }
        );
    }

    #[test]
    fn hidden_puck() {
        let manager = RouteManager::new();
        let mut renderer = RouteRenderer::new(StrokeTessellator::default());
        let mut backend = RecordingBackend::new();
        let stats = renderer.render(&mut backend, &manager.snapshot(), &frame(PuckState::default()));
        assert_eq!(stats, RenderStats::default());
        assert!(backend.take_commands().is_empty());
    }

    #[test]
    fn release_frees_resources() {
        let mut manager = RouteManager::new();
        let line = vec![Point::new(-10.0, 0.0), Point::new(10.0, 0.0)];
        manager.route_create(line.clone(), RouteOptions::default());
        let snapshot = manager.finalize();

        let mut renderer = RouteRenderer::new(StrokeTessellator::default());
        let mut backend = RecordingBackend::new();
        renderer.blue_line_handle().set_line(line).unwrap();
        renderer.render(&mut backend, &snapshot, &frame(PuckState::default()));
        assert_ne!(backend.live_resources(), (0, 0, 0));

        renderer.release(&mut backend);
        assert_eq!(backend.live_resources(), (0, 0, 0));
    }
}
