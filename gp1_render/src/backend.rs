//! The contract between the [`Renderer`] and a graphics API.
//!
//! A backend produces resources of every kind and reacts to the renderer's
//! lifecycle and frame hooks. Creation hooks return `None` when the backend
//! declines to produce a resource, for example for an unsupported uniform
//! type. Backends that do not support a kind at all keep the default hook.

use crate::camera::{Camera, Drawable};
use crate::renderer::Renderer;
use crate::resources::{
    DebugRenderer, Material, ReservedUniformBuffers, ShaderProgram, StaticMesh, Texture2D,
    Texture2DArray, Texture3D, TextureCubeMap, Uniform, UniformBuffer, UniformType,
};
use gp1_pointers::SharedHandle;
use snafu::Snafu;
use std::any::Any;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum BackendError {
    #[snafu(display(
        "Context version {}.{} is too old, at least {}.{} is required",
        found.0, found.1, required.0, required.1
    ))]
    ContextVersion {
        found: (u32, u32),
        required: (u32, u32),
    },

    #[snafu(display("{reason}"))]
    Unsupported { reason: String },
}

pub trait Backend: Any {
    /// Lowercase name the backend is known by.
    fn name(&self) -> &'static str;

    /// Whether the backend can run on this system.
    fn is_compatible(&self) -> bool;

    fn init(&self, _renderer: &Renderer) -> Result<(), BackendError> {
        Ok(())
    }

    fn deinit(&self, _renderer: &Renderer) {}

    fn begin_frame(&self, _renderer: &Renderer) {}

    fn end_frame(&self, _renderer: &Renderer) {}

    fn render(&self, renderer: &Renderer, camera: &Camera, drawables: &[Drawable]);

    fn create_static_mesh(&self) -> Option<SharedHandle<dyn StaticMesh>> {
        None
    }

    fn create_material(&self) -> Option<SharedHandle<dyn Material>> {
        None
    }

    fn create_uniform(&self, _ty: UniformType) -> Option<SharedHandle<dyn Uniform>> {
        None
    }

    fn create_uniform_buffer(&self) -> Option<SharedHandle<dyn UniformBuffer>> {
        None
    }

    fn create_shader_program(&self) -> Option<SharedHandle<dyn ShaderProgram>> {
        None
    }

    fn create_texture_2d(&self) -> Option<SharedHandle<dyn Texture2D>> {
        None
    }

    fn create_texture_2d_array(&self) -> Option<SharedHandle<dyn Texture2DArray>> {
        None
    }

    fn create_texture_3d(&self) -> Option<SharedHandle<dyn Texture3D>> {
        None
    }

    fn create_texture_cube_map(&self) -> Option<SharedHandle<dyn TextureCubeMap>> {
        None
    }

    /// Called once during [`Renderer::init`], after the debug renderer.
    fn create_reserved_uniform_buffers(
        &self,
        _renderer: &Renderer,
    ) -> Option<SharedHandle<dyn ReservedUniformBuffers>> {
        None
    }

    /// Called once during [`Renderer::init`].
    fn create_debug_renderer(&self, _renderer: &Renderer) -> Option<SharedHandle<dyn DebugRenderer>> {
        None
    }
}
