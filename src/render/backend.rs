//! Interface to the GPU, as needed to draw routes.

use super::color::Color;
use super::tessellator::Mesh;
use super::transform::ViewUniforms;
use super::PuckState;
use crate::geometry::Point;
use crate::route::RouteId;
use log::trace;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Handle of a mesh uploaded to the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);

/// Handle of a gradient texture uploaded to the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Handle of a vertex buffer uploaded to the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Parameters to draw a route.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteDrawCall {
    /// Route being drawn.
    pub id: RouteId,
    /// Mesh of the route.
    pub mesh: MeshHandle,
    /// Gradient of the route line.
    pub inner_gradient: TextureHandle,
    /// Gradient of the route casing.
    pub outer_gradient: TextureHandle,
    /// Width of the route line, in pixels.
    pub inner_width: f32,
    /// Width of the route casing, in pixels.
    pub outer_width: f32,
    /// Mapping of the mesh positions to clip space.
    pub view: ViewUniforms,
}

/// Parameters to draw dots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DotsDrawCall {
    /// Clip-space centers of the dots.
    pub buffer: BufferHandle,
    /// Half-size of a dot, in clip space.
    pub size: [f32; 2],
    /// Ratio between the outer and inner radii.
    pub inner_factor: f32,
    /// Color of the center of the dots.
    pub inner_color: Color,
    /// Color of the ring of the dots.
    pub outer_color: Color,
}

/// Rendering backend, owning GPU resources.
///
/// Resources may only be created or released while the backend's context is
/// current, which [`BackendScope`] checks.
pub trait RenderBackend {
    /// Checks whether the GPU context of this backend is current on this
    /// thread.
    fn is_context_current(&self) -> bool;

    /// Uploads a mesh.
    fn upload_mesh(&mut self, mesh: &Mesh) -> MeshHandle;
    /// Releases a mesh.
    fn release_mesh(&mut self, mesh: MeshHandle);

    /// Uploads a gradient, into a new texture or replacing the contents of an
    /// existing one.
    fn upload_gradient(&mut self, texture: Option<TextureHandle>, texels: &[[u8; 4]])
        -> TextureHandle;
    /// Releases a gradient texture.
    fn release_texture(&mut self, texture: TextureHandle);

    /// Uploads clip-space vertices, into a new buffer or replacing the
    /// contents of an existing one.
    fn upload_vertices(&mut self, buffer: Option<BufferHandle>, vertices: &[[f32; 2]])
        -> BufferHandle;
    /// Releases a vertex buffer.
    fn release_buffer(&mut self, buffer: BufferHandle);

    /// Draws a route.
    fn draw_route(&mut self, call: &RouteDrawCall);
    /// Draws a line strip of clip-space vertices.
    fn draw_line(&mut self, buffer: BufferHandle, color: Color, width: f32);
    /// Draws dots.
    fn draw_dots(&mut self, call: &DotsDrawCall);
    /// Draws the puck at a screen position.
    fn draw_puck(&mut self, position: Point<f64>, puck: &PuckState);
}

/// Access to a [`RenderBackend`] whose context is current.
pub struct BackendScope<'a, B: RenderBackend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: RenderBackend + ?Sized> BackendScope<'a, B> {
    /// Enters a scope where GPU resources can be managed.
    pub fn enter(backend: &'a mut B) -> Self {
        debug_assert!(
            backend.is_context_current(),
            "GPU resources managed without a current context"
        );
        BackendScope { backend }
    }
}

impl<B: RenderBackend + ?Sized> Deref for BackendScope<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: RenderBackend + ?Sized> DerefMut for BackendScope<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.backend
    }
}

/// Draw command recorded by a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// A route was drawn.
    Route(RouteDrawCall),
    /// A line strip was drawn.
    Line {
        /// Clip-space vertices of the line.
        vertices: Vec<[f32; 2]>,
        /// Color of the line.
        color: Color,
        /// Width of the line, in pixels.
        width: f32,
    },
    /// Dots were drawn.
    Dots {
        /// Clip-space centers of the dots.
        centers: Vec<[f32; 2]>,
        /// Draw parameters.
        call: DotsDrawCall,
    },
    /// The puck was drawn.
    Puck {
        /// Screen position of the puck.
        position: Point<f64>,
        /// Bearing of the puck.
        bearing: f64,
    },
}

/// Headless backend keeping resources in memory and recording draw calls.
#[derive(Debug)]
pub struct RecordingBackend {
    context_current: bool,
    next_handle: u64,
    meshes: BTreeMap<MeshHandle, Mesh>,
    textures: BTreeMap<TextureHandle, Vec<[u8; 4]>>,
    buffers: BTreeMap<BufferHandle, Vec<[f32; 2]>>,
    commands: Vec<DrawCommand>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// Creates a backend with a current context.
    pub fn new() -> Self {
        RecordingBackend {
            context_current: true,
            next_handle: 0,
            meshes: BTreeMap::new(),
            textures: BTreeMap::new(),
            buffers: BTreeMap::new(),
            commands: Vec::new(),
        }
    }

    /// Makes the context current or not.
    pub fn set_context_current(&mut self, current: bool) {
        self.context_current = current;
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Returns the draw commands recorded since the last call.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Returns an uploaded mesh.
    pub fn mesh(&self, mesh: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(&mesh)
    }

    /// Returns the texels of an uploaded gradient.
    pub fn texture(&self, texture: TextureHandle) -> Option<&[[u8; 4]]> {
        self.textures.get(&texture).map(Vec::as_slice)
    }

    /// Returns the vertices of an uploaded buffer.
    pub fn buffer(&self, buffer: BufferHandle) -> Option<&[[f32; 2]]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Returns the number of live meshes, textures and buffers.
    pub fn live_resources(&self) -> (usize, usize, usize) {
        (self.meshes.len(), self.textures.len(), self.buffers.len())
    }
}

impl RenderBackend for RecordingBackend {
    fn is_context_current(&self) -> bool {
        self.context_current
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> MeshHandle {
        let handle = MeshHandle(self.next_handle());
        trace!("Upload mesh {:?}: {} vertices", handle, mesh.vertices.len());
        self.meshes.insert(handle, mesh.clone());
        handle
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }

    fn upload_gradient(
        &mut self,
        texture: Option<TextureHandle>,
        texels: &[[u8; 4]],
    ) -> TextureHandle {
        let handle = match texture {
            Some(handle) => handle,
            None => TextureHandle(self.next_handle()),
        };
        self.textures.insert(handle, texels.to_vec());
        handle
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn upload_vertices(
        &mut self,
        buffer: Option<BufferHandle>,
        vertices: &[[f32; 2]],
    ) -> BufferHandle {
        let handle = match buffer {
            Some(handle) => handle,
            None => BufferHandle(self.next_handle()),
        };
        self.buffers.insert(handle, vertices.to_vec());
        handle
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn draw_route(&mut self, call: &RouteDrawCall) {
        self.commands.push(DrawCommand::Route(*call));
    }

    fn draw_line(&mut self, buffer: BufferHandle, color: Color, width: f32) {
        let vertices = self.buffers.get(&buffer).cloned().unwrap_or_default();
        self.commands.push(DrawCommand::Line {
            vertices,
            color,
            width,
        });
    }

    fn draw_dots(&mut self, call: &DotsDrawCall) {
        let centers = self.buffers.get(&call.buffer).cloned().unwrap_or_default();
        self.commands.push(DrawCommand::Dots {
            centers,
            call: *call,
        });
    }

    fn draw_puck(&mut self, position: Point<f64>, puck: &PuckState) {
        self.commands.push(DrawCommand::Puck {
            position,
            bearing: puck.bearing,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resources_are_tracked() {
        let mut backend = RecordingBackend::new();
        let mut scope = BackendScope::enter(&mut backend);
        let texture = scope.upload_gradient(None, &[[255, 0, 0, 255]]);
        let same = scope.upload_gradient(Some(texture), &[[0, 255, 0, 255]]);
        assert_eq!(texture, same);
        let buffer = scope.upload_vertices(None, &[[0.0, 0.0], [0.5, 0.5]]);
        let mesh = scope.upload_mesh(&Mesh::default());
        assert_eq!(scope.live_resources(), (1, 1, 1));
        assert_eq!(scope.texture(texture), Some(&[[0, 255, 0, 255]][..]));

        scope.draw_line(buffer, Color::WHITE, 2.0);
        scope.release_buffer(buffer);
        scope.release_texture(texture);
        scope.release_mesh(mesh);
        assert_eq!(scope.live_resources(), (0, 0, 0));

        let commands = scope.take_commands();
        assert_eq!(
            commands,
            vec![DrawCommand::Line {
                vertices: vec![[0.0, 0.0], [0.5, 0.5]],
                color: Color::WHITE,
                width: 2.0
            }]
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without a current context")]
    fn scope_requires_current_context() {
        let mut backend = RecordingBackend::new();
        backend.set_context_current(false);
        let _scope = BackendScope::enter(&mut backend);
    }
}
