//! GPU resources of the routes: a mesh tessellated once per route, and the
//! gradients of its color ramps.

use super::backend::{BackendScope, MeshHandle, RenderBackend, RouteDrawCall, TextureHandle};
use super::tessellator::{Mesh, PolylineGeneratorOptions, Tessellator};
use super::transform::Transform;
use super::RenderStats;
use crate::geometry::Point;
use crate::route::geometry::RouteGeometry;
use crate::route::manager::{RouteFrame, RouteSnapshot};
use crate::route::{ProjectionMode, RouteId};
use log::{debug, trace};
use std::collections::BTreeMap;

/// Number of texels of the gradient textures.
pub const GRADIENT_WIDTH: usize = 256;

/// GPU resources of one route.
#[derive(Debug)]
struct RouteDrawable {
    /// Creation serial of the route the mesh was built for.
    serial: u64,
    mesh: MeshHandle,
    inner_gradient: TextureHandle,
    outer_gradient: TextureHandle,
    /// Snapshot generation of the uploaded gradients.
    ramp_generation: u64,
}

/// Layer drawing the routes of the finalized snapshots.
pub struct RouteLayer<T: Tessellator> {
    tessellator: T,
    options: PolylineGeneratorOptions,
    drawables: BTreeMap<RouteId, RouteDrawable>,
}

impl<T: Tessellator> RouteLayer<T> {
    /// Creates a layer tessellating routes with the given tessellator.
    pub fn new(tessellator: T) -> Self {
        RouteLayer {
            tessellator,
            options: PolylineGeneratorOptions::route(),
            drawables: BTreeMap::new(),
        }
    }

    /// Returns the number of routes with GPU resources.
    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    /// Checks whether no route has GPU resources.
    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Synchronizes the GPU resources with a snapshot.
    ///
    /// Meshes are built only for routes that don't have one yet. They are
    /// never rebuilt for an existing route: a new route object gets a new
    /// serial, and thus a new mesh. Gradients are uploaded again when the
    /// ramps of a route changed.
    pub fn update<B: RenderBackend + ?Sized>(
        &mut self,
        scope: &mut BackendScope<'_, B>,
        snapshot: &RouteSnapshot,
        stats: &mut RenderStats,
    ) {
        let stale: Vec<RouteId> = self
            .drawables
            .iter()
            .filter(|(id, drawable)| {
                snapshot
                    .route(**id)
                    .is_none_or(|frame| frame.serial != drawable.serial)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(drawable) = self.drawables.remove(&id) {
                debug!("Releasing drawable of route {id}");
                release(scope, drawable);
                stats.meshes_released += 1;
            }
        }

        for frame in &snapshot.routes {
            match self.drawables.get_mut(&frame.id) {
                None => {
                    let mesh = self.tessellate(&frame.geometry, frame.options.projection);
                    let drawable = RouteDrawable {
                        serial: frame.serial,
                        mesh: scope.upload_mesh(&mesh),
                        inner_gradient: scope
                            .upload_gradient(None, &frame.ramps.inner.to_texels(GRADIENT_WIDTH)),
                        outer_gradient: scope
                            .upload_gradient(None, &frame.ramps.outer.to_texels(GRADIENT_WIDTH)),
                        ramp_generation: frame.ramp_generation,
                    };
                    debug!(
                        "Built drawable of route {}: {} vertices",
                        frame.id,
                        mesh.vertices.len()
                    );
                    self.drawables.insert(frame.id, drawable);
                    stats.meshes_built += 1;
                    stats.ramps_uploaded += 1;
                }
                Some(drawable) if drawable.ramp_generation != frame.ramp_generation => {
                    trace!("Uploading ramps of route {}", frame.id);
                    scope.upload_gradient(
                        Some(drawable.inner_gradient),
                        &frame.ramps.inner.to_texels(GRADIENT_WIDTH),
                    );
                    scope.upload_gradient(
                        Some(drawable.outer_gradient),
                        &frame.ramps.outer.to_texels(GRADIENT_WIDTH),
                    );
                    drawable.ramp_generation = frame.ramp_generation;
                    stats.ramps_uploaded += 1;
                }
                Some(_) => (),
            }
        }
    }

    /// Builds the mesh of a route, in world coordinates, with vertex progress
    /// measured like the route's color ramps.
    fn tessellate(&self, geometry: &RouteGeometry, projection: ProjectionMode) -> Mesh {
        let world: Vec<Point<f64>> = geometry
            .points()
            .iter()
            .map(|p| Transform::project_point(projection, p))
            .collect();
        let mut mesh = self.tessellator.generate(&world, &self.options);
        if projection == ProjectionMode::Mercator {
            remap_progress(&mut mesh, &world, geometry);
        }
        mesh
    }

    /// Draws the visible routes, the vanishing route last, and the others by
    /// creation order.
    pub fn draw<B: RenderBackend + ?Sized>(
        &self,
        scope: &mut BackendScope<'_, B>,
        snapshot: &RouteSnapshot,
        transform: &Transform,
        stats: &mut RenderStats,
    ) {
        let view = transform.view_uniforms();
        let mut frames: Vec<&RouteFrame> = snapshot.routes.iter().collect();
        frames.sort_by_key(|frame| (snapshot.vanishing == Some(frame.id), frame.serial));

        for frame in frames {
            let Some(drawable) = self.drawables.get(&frame.id) else {
                continue;
            };
            if !is_visible(frame, transform) {
                trace!("Route {} is off screen", frame.id);
                continue;
            }
            scope.draw_route(&RouteDrawCall {
                id: frame.id,
                mesh: drawable.mesh,
                inner_gradient: drawable.inner_gradient,
                outer_gradient: drawable.outer_gradient,
                inner_width: frame.options.inner_width as f32,
                outer_width: frame.options.outer_width as f32,
                view,
            });
            stats.routes_drawn += 1;
        }
    }

    /// Releases all the GPU resources.
    pub fn release_all<B: RenderBackend + ?Sized>(&mut self, scope: &mut BackendScope<'_, B>) {
        for (_, drawable) in std::mem::take(&mut self.drawables) {
            release(scope, drawable);
        }
    }
}

/// Checks whether the screen bounding box of a route, widened by its casing,
/// intersects the window.
fn is_visible(frame: &RouteFrame, transform: &Transform) -> bool {
    let Some((min, max)) = frame.geometry.bounding_box() else {
        return false;
    };
    let projection = frame.options.projection;
    let a = transform.world_to_screen(&Transform::project_point(projection, &min));
    let b = transform.world_to_screen(&Transform::project_point(projection, &max));
    let margin = frame.options.outer_width.max(frame.options.inner_width) / 2.0;
    a.x.min(b.x) - margin <= transform.width()
        && a.x.max(b.x) + margin >= 0.0
        && a.y.min(b.y) - margin <= transform.height()
        && a.y.max(b.y) + margin >= 0.0
}

fn release<B: RenderBackend + ?Sized>(scope: &mut BackendScope<'_, B>, drawable: RouteDrawable) {
    scope.release_mesh(drawable.mesh);
    scope.release_texture(drawable.inner_gradient);
    scope.release_texture(drawable.outer_gradient);
}

/// Converts the vertex progress of a mesh, measured along the projected
/// polyline, into progress measured by the route's metric.
fn remap_progress(mesh: &mut Mesh, world: &[Point<f64>], geometry: &RouteGeometry) {
    let mut from = Vec::with_capacity(world.len());
    let mut length = 0.0;
    from.push(0.0);
    for w in world.windows(2) {
        length += crate::geometry::planar_distance(&w[0], &w[1]);
        from.push(length);
    }
    let total = geometry.total_distance();
    if length <= 0.0 || total <= 0.0 {
        return;
    }
    let to: Vec<f64> = (0..world.len())
        .map(|i| geometry.cumulative_distance(i) / total)
        .collect();
    for f in &mut from {
        *f /= length;
    }

    for vertex in &mut mesh.vertices {
        let p = vertex.progress as f64;
        let i = from.partition_point(|&f| f < p).min(from.len() - 1);
        let mapped = if i == 0 {
            to[0]
        } else {
            let span = from[i] - from[i - 1];
            let t = if span > 0.0 { (p - from[i - 1]) / span } else { 1.0 };
            to[i - 1] + (to[i] - to[i - 1]) * t
        };
        vertex.progress = mapped as f32;
    }
}
