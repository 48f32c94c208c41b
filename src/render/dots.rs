//! Dot overlay, drawing ringed markers at given points.

use super::backend::{BackendScope, BufferHandle, DotsDrawCall, RenderBackend};
use super::color::Color;
use super::transform::{Transform, ViewUniforms};
use super::RenderStats;
use crate::geometry::Point;
use anyhow::Context;
use log::trace;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};

/// Style of the dots.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DotOptions {
    /// Color of the center of the dots.
    pub inner_color: Color,
    /// Color of the ring of the dots.
    pub outer_color: Color,
    /// Radius of the center, in pixels. Non-positive values mean 1 pixel.
    pub inner_radius: f32,
    /// Radius of the ring, in pixels.
    pub outer_radius: f32,
}

impl Default for DotOptions {
    fn default() -> Self {
        DotOptions {
            inner_color: Color::BLACK,
            outer_color: Color::BLACK,
            inner_radius: 0.0,
            outer_radius: 0.0,
        }
    }
}

/// Change of the dot overlay requested to the render thread.
#[derive(Clone, Debug, PartialEq)]
pub enum DotsMessage {
    /// Replaces the points.
    SetPoints(Vec<Point<f64>>),
    /// Replaces the style.
    SetOptions(DotOptions),
    /// Shows or hides the dots.
    SetEnabled(bool),
}

/// Handle to update the dot overlay from another thread.
#[derive(Clone)]
pub struct DotsHandle {
    tx: Sender<DotsMessage>,
}

impl DotsHandle {
    /// Replaces the points.
    pub fn set_points(&self, points: Vec<Point<f64>>) -> anyhow::Result<()> {
        self.send(DotsMessage::SetPoints(points))
    }

    /// Replaces the style.
    pub fn set_options(&self, options: DotOptions) -> anyhow::Result<()> {
        self.send(DotsMessage::SetOptions(options))
    }

    /// Shows or hides the dots.
    pub fn set_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        self.send(DotsMessage::SetEnabled(enabled))
    }

    fn send(&self, msg: DotsMessage) -> anyhow::Result<()> {
        self.tx
            .send(msg)
            .context("Failed to send dots update to the render thread")
    }
}

/// State of the dot overlay, owned by the render thread.
pub struct Dots {
    rx: Receiver<DotsMessage>,
    points: Vec<Point<f64>>,
    options: DotOptions,
    enabled: bool,
    points_changed: bool,
    previous_view: Option<ViewUniforms>,
    buffer: Option<BufferHandle>,
    visible: usize,
}

/// Constructs a dot overlay, initially disabled, and the handle to update it.
pub fn dots() -> (DotsHandle, Dots) {
    let (tx, rx) = channel();
    (
        DotsHandle { tx },
        Dots {
            rx,
            points: Vec::new(),
            options: DotOptions::default(),
            enabled: false,
            points_changed: false,
            previous_view: None,
            buffer: None,
            visible: 0,
        },
    )
}

/// Returns the clip-space positions of the points visible on screen.
pub fn visible_dots(points: &[Point<f64>], transform: &Transform) -> Vec<[f32; 2]> {
    points
        .iter()
        .map(|p| transform.to_clip(p))
        .filter(|c| c.x.abs() <= 1.0 && c.y.abs() <= 1.0)
        .map(|c| [c.x as f32, c.y as f32])
        .collect()
}

impl Dots {
    fn drain(&mut self) {
        for msg in self.rx.try_iter() {
            match msg {
                DotsMessage::SetPoints(points) => {
                    self.points = points;
                    self.points_changed = true;
                }
                DotsMessage::SetOptions(options) => self.options = options,
                DotsMessage::SetEnabled(enabled) => self.enabled = enabled,
            }
        }
    }

    /// Applies pending changes, updates the vertex buffer if the points or
    /// the view changed, and draws the dots.
    pub fn draw<B: RenderBackend + ?Sized>(
        &mut self,
        scope: &mut BackendScope<'_, B>,
        transform: &Transform,
        stats: &mut RenderStats,
    ) {
        self.drain();
        if !self.enabled || self.points.is_empty() {
            return;
        }

        let view = transform.view_uniforms();
        if self.points_changed || self.previous_view != Some(view) {
            self.points_changed = false;
            self.previous_view = Some(view);
            let centers = visible_dots(&self.points, transform);
            trace!("Dots: {} / {} visible", centers.len(), self.points.len());
            self.visible = centers.len();
            if centers.is_empty() {
                if let Some(buffer) = self.buffer.take() {
                    scope.release_buffer(buffer);
                }
            } else {
                self.buffer = Some(scope.upload_vertices(self.buffer, &centers));
            }
        }

        let Some(buffer) = self.buffer else {
            return;
        };
        let inner_radius = if self.options.inner_radius <= 0.0 {
            1.0
        } else {
            self.options.inner_radius
        };
        let call = DotsDrawCall {
            buffer,
            size: [
                self.options.outer_radius / transform.width() as f32,
                self.options.outer_radius / transform.height() as f32,
            ],
            inner_factor: self.options.outer_radius / inner_radius,
            inner_color: self.options.inner_color,
            outer_color: self.options.outer_color,
        };
        scope.draw_dots(&call);
        stats.dots_drawn = self.visible;
    }

    /// Releases the GPU resources.
    pub fn release_all<B: RenderBackend + ?Sized>(&mut self, scope: &mut BackendScope<'_, B>) {
        if let Some(buffer) = self.buffer.take() {
            scope.release_buffer(buffer);
        }
        self.previous_view = None;
    }
}
