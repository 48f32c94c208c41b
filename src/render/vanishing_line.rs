//! The "blue line" overlay: a line trailing the puck, whose traveled part
//! vanishes.
//!
//! Setters may be called from any thread through a [`VanishingLineHandle`];
//! the render thread owns the line and applies pending changes before each
//! draw.

use super::backend::{BackendScope, BufferHandle, RenderBackend};
use super::color::{palette, Color};
use super::transform::Transform;
use super::RenderStats;
use crate::geometry::Point;
use anyhow::Context;
use log::trace;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Change of the vanishing line requested to the render thread.
#[derive(Clone, Debug, PartialEq)]
pub enum VanishingLineMessage {
    /// Replaces the line.
    SetLine(Vec<Point<f64>>),
    /// Sets the traveled fraction of the line, clamped to `[0, 1]`.
    SetPercent(f64),
    /// Sets the style of the line.
    SetStyle {
        /// Color of the line.
        color: Color,
        /// Width of the line, in pixels.
        width: f32,
    },
    /// Removes the line.
    Clear,
}

/// Handle to update the vanishing line from another thread.
#[derive(Clone)]
pub struct VanishingLineHandle {
    tx: Sender<VanishingLineMessage>,
}

impl VanishingLineHandle {
    /// Replaces the line.
    pub fn set_line(&self, line: Vec<Point<f64>>) -> anyhow::Result<()> {
        self.send(VanishingLineMessage::SetLine(line))
    }

    /// Sets the traveled fraction of the line.
    pub fn set_percent(&self, percent: f64) -> anyhow::Result<()> {
        self.send(VanishingLineMessage::SetPercent(percent))
    }

    /// Sets the style of the line.
    pub fn set_style(&self, color: Color, width: f32) -> anyhow::Result<()> {
        self.send(VanishingLineMessage::SetStyle { color, width })
    }

    /// Removes the line.
    pub fn clear(&self) -> anyhow::Result<()> {
        self.send(VanishingLineMessage::Clear)
    }

    fn send(&self, msg: VanishingLineMessage) -> anyhow::Result<()> {
        self.tx
            .send(msg)
            .context("Failed to send vanishing line update to the render thread")
    }
}

/// State of the vanishing line, owned by the render thread.
pub struct VanishingLine {
    rx: Receiver<VanishingLineMessage>,
    line: Vec<Point<f64>>,
    percent: f64,
    color: Color,
    width: f32,
    /// Whether the vertex buffer must be released before the next draw.
    clear_vertex_buffer: bool,
    /// Pixel position of the first point and percent at the last update of
    /// the vertex buffer.
    previous: Option<(Point<i64>, f64)>,
    buffer: Option<BufferHandle>,
    vertex_count: usize,
}

/// Constructs a vanishing line and the handle to update it.
pub fn vanishing_line() -> (VanishingLineHandle, VanishingLine) {
    let (tx, rx) = channel();
    (
        VanishingLineHandle { tx },
        VanishingLine {
            rx,
            line: Vec::new(),
            percent: 0.0,
            color: palette::ROUTE,
            width: 4.0,
            clear_vertex_buffer: false,
            previous: None,
            buffer: None,
            vertex_count: 0,
        },
    )
}

impl VanishingLine {
    /// Applies the pending changes.
    fn drain(&mut self) {
        for msg in self.rx.try_iter() {
            match msg {
                VanishingLineMessage::SetLine(line) => {
                    self.line = line;
                    self.clear_vertex_buffer = true;
                }
                VanishingLineMessage::SetPercent(percent) => {
                    self.percent = if percent.is_nan() {
                        0.0
                    } else {
                        percent.clamp(0.0, 1.0)
                    };
                }
                VanishingLineMessage::SetStyle { color, width } => {
                    self.color = color;
                    self.width = width;
                }
                VanishingLineMessage::Clear => {
                    self.line.clear();
                    self.percent = 0.0;
                    self.clear_vertex_buffer = true;
                }
            }
        }
    }

    /// Checks whether the line moved by at least one pixel, or its percent
    /// changed, since the last update of the vertex buffer.
    fn transform_changed(&mut self, transform: &Transform) -> bool {
        let Some(first) = self.line.first() else {
            return false;
        };
        let screen = transform.to_screen(first);
        let pixel = Point::new(screen.x.round() as i64, screen.y.round() as i64);
        let current = (pixel, self.percent);
        let changed = self.previous != Some(current);
        self.previous = Some(current);
        changed
    }

    fn release<B: RenderBackend + ?Sized>(&mut self, scope: &mut BackendScope<'_, B>) {
        if let Some(buffer) = self.buffer.take() {
            scope.release_buffer(buffer);
        }
        self.vertex_count = 0;
    }

    /// Applies pending changes, updates the vertex buffer if the view or the
    /// percent changed, and draws the line.
    pub fn draw<B: RenderBackend + ?Sized>(
        &mut self,
        scope: &mut BackendScope<'_, B>,
        transform: &Transform,
        stats: &mut RenderStats,
    ) {
        self.drain();
        if self.clear_vertex_buffer {
            self.release(scope);
            self.previous = None;
            self.clear_vertex_buffer = false;
        }
        if self.line.is_empty() {
            return;
        }

        if self.transform_changed(transform) {
            let clip: Vec<Point<f64>> = self.line.iter().map(|p| transform.to_clip(p)).collect();
            let vertices = vanish_and_clip(&clip, self.percent);
            trace!(
                "Vanishing line: {} / {} vertices visible",
                vertices.len(),
                clip.len()
            );
            if vertices.is_empty() {
                self.release(scope);
                return;
            }
            self.buffer = Some(scope.upload_vertices(self.buffer, &vertices));
            self.vertex_count = vertices.len();
        }

        if let Some(buffer) = self.buffer {
            scope.draw_line(buffer, self.color, self.width);
            stats.blue_line_vertices = self.vertex_count;
        }
    }

    /// Releases the GPU resources.
    pub fn release_all<B: RenderBackend + ?Sized>(&mut self, scope: &mut BackendScope<'_, B>) {
        self.release(scope);
        self.previous = None;
    }
}

fn outside_clip(p: &Point<f64>) -> bool {
    p.x.abs() > 1.0 || p.y.abs() > 1.0
}

/// Removes the traveled part of a clip-space line, then its leading and
/// trailing vertices outside of the clip box.
///
/// The line is cut at `percent` of its length, measured in clip space. Only
/// the ends are clipped: a line leaving and re-entering the screen keeps its
/// off-screen vertices in between. Returns no vertex if the line is fully
/// traveled or fully off-screen.
pub fn vanish_and_clip(line: &[Point<f64>], percent: f64) -> Vec<[f32; 2]> {
    if line.len() < 2 || percent >= 1.0 {
        return Vec::new();
    }

    let mut distances = Vec::with_capacity(line.len());
    let mut total = 0.0;
    distances.push(0.0);
    for w in line.windows(2) {
        total += crate::geometry::planar_distance(&w[0], &w[1]);
        distances.push(total);
    }

    let mut vertices: Vec<Point<f64>> = line.to_vec();
    let vanish = total * percent;
    if vanish > 0.0 {
        let first_visible = distances.iter().position(|&d| d >= vanish);
        let Some(first_visible) = first_visible else {
            return Vec::new();
        };
        // Keep the vertex before the vanish point, moved onto it.
        let start = first_visible.saturating_sub(1);
        if first_visible > 0 {
            let (d0, d1) = (distances[start], distances[first_visible]);
            let t = if d1 > d0 { (vanish - d0) / (d1 - d0) } else { 0.0 };
            vertices[start] = vertices[start].lerp(&vertices[first_visible], t);
        }
        vertices.drain(..start);
    }

    let Some(first_inside) = vertices.iter().position(|p| !outside_clip(p)) else {
        return Vec::new();
    };
    let Some(last_inside) = vertices.iter().rposition(|p| !outside_clip(p)) else {
        return Vec::new();
    };
    // Keep one vertex beyond each end, so that the edge segments reach the
    // border of the screen.
    let start = first_inside.saturating_sub(1);
    let end = (last_inside + 1).min(vertices.len() - 1);

    vertices[start..=end]
        .iter()
        .map(|p| [p.x as f32, p.y as f32])
        .collect()
}
