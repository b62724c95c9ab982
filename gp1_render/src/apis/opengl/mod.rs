//! OpenGL backend.
//!
//! Runs against a headless [`GlContext`]: every resource keeps the state it
//! last uploaded, so the frontend can be driven and inspected without a
//! window.

mod buffers;
mod context;
mod debug;
mod resources;

pub use buffers::{CAMERA_OFFSETS, GlReservedUniformBuffers, GlUniformBuffer};
pub use context::GlContext;
pub use debug::GlDebugRenderer;
pub use resources::{GlMaterial, GlMeshBuffers, GlShaderProgram, GlStaticMesh, GlTexture, GlUniform};

use crate::backend::{Backend, BackendError, ContextVersionErr};
use crate::camera::{Camera, Drawable};
use crate::data::HasRendererData;
use crate::renderer::Renderer;
use crate::resources::{
    CAMERA_BUFFER, DebugRenderer, Material, ReservedUniformBuffers, ShaderProgram, StaticMesh, Texture2D,
    Texture2DArray, Texture3D, TextureCubeMap, TextureDimension, Uniform, UniformBuffer, UniformType,
};
use gp1_pointers::SharedHandle;
use gp1_utils::EngineArgs;
use nalgebra::Matrix4;
use resources::GlUniformFactory;
use snafu::ensure;
use std::any::Any;
use std::cell::Cell;
use tracing::{debug, trace, warn};

pub const MIN_GL_VERSION: (u32, u32) = (4, 3);

/// Context version assumed when `--gl-version` is not given.
pub const DEFAULT_GL_VERSION: (u32, u32) = (4, 6);

/// Block and uniform the render hook writes each drawable's transform to.
pub const OBJECT_BUFFER: &str = "Object";
pub const TRANSFORM_UNIFORM: &str = "transformationMatrix";

/// What the last [`Renderer::render`] did.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub indices: usize,
    pub material_binds: usize,
    pub buffer_binds: usize,
    pub skipped: usize,
    pub debug_vertices: usize,
}

pub struct GlBackend {
    context: SharedHandle<GlContext>,
    last_frame: Cell<FrameStats>,
}

impl Default for GlBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GlBackend {
    pub fn new() -> Self {
        Self::with_version(EngineArgs::get().gl_version().unwrap_or(DEFAULT_GL_VERSION))
    }

    pub fn with_version(version: (u32, u32)) -> Self {
        Self {
            context: SharedHandle::new(GlContext::new(version)),
            last_frame: Cell::default(),
        }
    }

    pub fn context(&self) -> &GlContext {
        &self.context
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame.get()
    }

    fn texture(&self, dimension: TextureDimension) -> SharedHandle<GlTexture> {
        SharedHandle::new(GlTexture::new(&self.context, dimension))
    }
}

fn set_matrix(uniform: Option<SharedHandle<dyn Uniform>>, name: &str, value: Matrix4<f32>) {
    let Some(uniform) = uniform else {
        trace!("No {name} uniform to write");
        return;
    };
    match uniform.typed::<Matrix4<f32>>() {
        Some(cell) => cell.set(value),
        None => warn!("Uniform {name} is a {:?}, expected a matrix", uniform.uniform_type()),
    }
}

fn downcast<T: Any>(value: &dyn Any) -> Option<&T> {
    value.downcast_ref::<T>()
}

impl Backend for GlBackend {
    fn name(&self) -> &'static str {
        "opengl"
    }

    fn is_compatible(&self) -> bool {
        self.context.version() >= MIN_GL_VERSION
    }

    fn init(&self, _renderer: &Renderer) -> Result<(), BackendError> {
        let found = self.context.version();
        ensure!(
            found >= MIN_GL_VERSION,
            ContextVersionErr {
                found,
                required: MIN_GL_VERSION,
            }
        );
        debug!("Using OpenGL {}.{}", found.0, found.1);
        Ok(())
    }

    fn deinit(&self, _renderer: &Renderer) {
        debug!(
            "OpenGL context has {} live objects after {} uploads",
            self.context.live_objects(),
            self.context.uploads()
        );
    }

    fn render(&self, renderer: &Renderer, camera: &Camera, drawables: &[Drawable]) {
        let mut stats = FrameStats::default();
        let mut first_binding = 0;

        if let Some(reserved) = renderer.reserved_uniform_buffers() {
            set_matrix(
                reserved.uniform(CAMERA_BUFFER, "projectionViewMatrix"),
                "projectionViewMatrix",
                camera.projection_view(),
            );
            set_matrix(
                reserved.uniform(CAMERA_BUFFER, "projectionMatrix"),
                "projectionMatrix",
                camera.projection,
            );
            set_matrix(reserved.uniform(CAMERA_BUFFER, "viewMatrix"), "viewMatrix", camera.view);

            if let Some(reserved) = downcast::<GlReservedUniformBuffers>(&*reserved) {
                reserved.bind(&mut stats);
                first_binding = reserved.next_binding();
            }
        }

        for drawable in drawables {
            let Some(material) = downcast::<GlMaterial>(&*drawable.material) else {
                warn!("Material was not created by the OpenGL renderer");
                stats.skipped += 1;
                continue;
            };
            set_matrix(
                material.material().uniform(OBJECT_BUFFER, TRANSFORM_UNIFORM),
                TRANSFORM_UNIFORM,
                drawable.transform,
            );
            if !material.bind(first_binding, &mut stats) {
                stats.skipped += 1;
                continue;
            }

            let Some(buffers) = drawable.mesh.renderer_data().next::<GlMeshBuffers>() else {
                trace!("Mesh was never uploaded");
                stats.skipped += 1;
                continue;
            };
            stats.draw_calls += 1;
            stats.indices += buffers.index_count();
        }

        if let Some(debug_renderer) = renderer.debug_renderer()
            && let Some(debug_renderer) = downcast::<GlDebugRenderer>(&*debug_renderer)
        {
            stats.debug_vertices = debug_renderer.flush();
        }

        trace!(?stats, "Rendered frame {}", renderer.frame_index());
        self.last_frame.set(stats);
    }

    fn create_static_mesh(&self) -> Option<SharedHandle<dyn StaticMesh>> {
        let mesh = SharedHandle::new(GlStaticMesh::new(&self.context));
        Some(SharedHandle::map(&mesh, |mesh| mesh as &(dyn StaticMesh + 'static)))
    }

    fn create_material(&self) -> Option<SharedHandle<dyn Material>> {
        let material = SharedHandle::new(GlMaterial::new());
        Some(SharedHandle::map(&material, |material| material as &(dyn Material + 'static)))
    }

    fn create_uniform(&self, ty: UniformType) -> Option<SharedHandle<dyn Uniform>> {
        ty.dispatch(&GlUniformFactory)
    }

    fn create_uniform_buffer(&self) -> Option<SharedHandle<dyn UniformBuffer>> {
        let buffer = SharedHandle::new(GlUniformBuffer::new(&self.context));
        Some(SharedHandle::map(&buffer, |buffer| buffer as &(dyn UniformBuffer + 'static)))
    }

    fn create_shader_program(&self) -> Option<SharedHandle<dyn ShaderProgram>> {
        let program = SharedHandle::new(GlShaderProgram::new(&self.context));
        Some(SharedHandle::map(&program, |program| program as &(dyn ShaderProgram + 'static)))
    }

    fn create_texture_2d(&self) -> Option<SharedHandle<dyn Texture2D>> {
        let texture = self.texture(TextureDimension::D2);
        Some(SharedHandle::map(&texture, |texture| texture as &(dyn Texture2D + 'static)))
    }

    fn create_texture_2d_array(&self) -> Option<SharedHandle<dyn Texture2DArray>> {
        let texture = self.texture(TextureDimension::D2Array);
        Some(SharedHandle::map(&texture, |texture| texture as &(dyn Texture2DArray + 'static)))
    }

    fn create_texture_3d(&self) -> Option<SharedHandle<dyn Texture3D>> {
        let texture = self.texture(TextureDimension::D3);
        Some(SharedHandle::map(&texture, |texture| texture as &(dyn Texture3D + 'static)))
    }

    fn create_texture_cube_map(&self) -> Option<SharedHandle<dyn TextureCubeMap>> {
        let texture = self.texture(TextureDimension::CubeMap);
        Some(SharedHandle::map(&texture, |texture| texture as &(dyn TextureCubeMap + 'static)))
    }

    fn create_reserved_uniform_buffers(
        &self,
        renderer: &Renderer,
    ) -> Option<SharedHandle<dyn ReservedUniformBuffers>> {
        let reserved = SharedHandle::new(GlReservedUniformBuffers::new(renderer));
        Some(SharedHandle::map(&reserved, |reserved| {
            reserved as &(dyn ReservedUniformBuffers + 'static)
        }))
    }

    fn create_debug_renderer(&self, _renderer: &Renderer) -> Option<SharedHandle<dyn DebugRenderer>> {
        let debug_renderer = SharedHandle::new(GlDebugRenderer::new(&self.context));
        Some(SharedHandle::map(&debug_renderer, |debug_renderer| {
            debug_renderer as &(dyn DebugRenderer + 'static)
        }))
    }
}
