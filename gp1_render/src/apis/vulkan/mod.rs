//! Vulkan backend stub.
//!
//! Never compatible, so the catalog skips it, but it produces plain client
//! side resources when instantiated directly.

use crate::HasRendererData;
use crate::backend::Backend;
use crate::camera::{Camera, Drawable};
use crate::data::{RendererData, Resource};
use crate::renderer::Renderer;
use crate::resources::{
    Material, MaterialData, ShaderProgram, ShaderProgramData, StaticMesh, StaticMeshData, Texture2D,
    Texture2DArray, Texture3D, TextureCubeMap, TextureData, TextureDimension, Uniform, UniformBuffer,
    UniformBufferData, UniformCell, UniformFactory, UniformStorage, UniformType, UniformValue,
};
use gp1_pointers::SharedHandle;
use tracing::trace;

macro_rules! vulkan_resource {
    ($name:ident, $kind:ident, $accessor:ident, $data:ty) => {
        #[derive(HasRendererData, Default)]
        pub struct $name {
            data: RendererData,
            inner: $data,
        }

        impl Resource for $name {}

        impl $kind for $name {
            fn $accessor(&self) -> &$data {
                &self.inner
            }
        }
    };
}

vulkan_resource!(VkStaticMesh, StaticMesh, mesh, StaticMeshData);
vulkan_resource!(VkMaterial, Material, material, MaterialData);
vulkan_resource!(VkUniformBuffer, UniformBuffer, buffer, UniformBufferData);
vulkan_resource!(VkShaderProgram, ShaderProgram, program, ShaderProgramData);

#[derive(HasRendererData)]
pub struct VkTexture {
    data: RendererData,
    texture: TextureData,
}

impl VkTexture {
    fn new(dimension: TextureDimension) -> Self {
        Self {
            data: RendererData::new(),
            texture: TextureData::new(dimension),
        }
    }
}

impl Resource for VkTexture {}

macro_rules! vulkan_texture_kind {
    ($($kind:ident),* $(,)?) => {
        $(
            impl $kind for VkTexture {
                fn texture(&self) -> &TextureData {
                    &self.texture
                }
            }
        )*
    };
}

vulkan_texture_kind!(Texture2D, Texture2DArray, Texture3D, TextureCubeMap);

#[derive(HasRendererData)]
pub struct VkUniform<V: UniformValue> {
    data: RendererData,
    cell: UniformCell<V>,
}

impl<V: UniformValue> Resource for VkUniform<V> {}

impl<V: UniformValue> Uniform for VkUniform<V> {
    fn storage(&self) -> &dyn UniformStorage {
        &self.cell
    }
}

struct VkUniformFactory;

impl UniformFactory for VkUniformFactory {
    fn make<V: UniformValue>(&self) -> Option<SharedHandle<dyn Uniform>> {
        let uniform = SharedHandle::new(VkUniform::<V> {
            data: RendererData::new(),
            cell: UniformCell::default(),
        });
        Some(SharedHandle::map(&uniform, |uniform| uniform as &(dyn Uniform + 'static)))
    }
}

#[derive(Debug, Default)]
pub struct VulkanBackend;

impl VulkanBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for VulkanBackend {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn is_compatible(&self) -> bool {
        false
    }

    fn render(&self, _renderer: &Renderer, _camera: &Camera, drawables: &[Drawable]) {
        trace!("Vulkan renderer skipped {} drawables", drawables.len());
    }

    fn create_static_mesh(&self) -> Option<SharedHandle<dyn StaticMesh>> {
        let mesh = SharedHandle::new(VkStaticMesh::default());
        Some(SharedHandle::map(&mesh, |mesh| mesh as &(dyn StaticMesh + 'static)))
    }

    fn create_material(&self) -> Option<SharedHandle<dyn Material>> {
        let material = SharedHandle::new(VkMaterial::default());
        Some(SharedHandle::map(&material, |material| material as &(dyn Material + 'static)))
    }

    fn create_uniform(&self, ty: UniformType) -> Option<SharedHandle<dyn Uniform>> {
        ty.dispatch(&VkUniformFactory)
    }

    fn create_uniform_buffer(&self) -> Option<SharedHandle<dyn UniformBuffer>> {
        let buffer = SharedHandle::new(VkUniformBuffer::default());
        Some(SharedHandle::map(&buffer, |buffer| buffer as &(dyn UniformBuffer + 'static)))
    }

    fn create_shader_program(&self) -> Option<SharedHandle<dyn ShaderProgram>> {
        let program = SharedHandle::new(VkShaderProgram::default());
        Some(SharedHandle::map(&program, |program| program as &(dyn ShaderProgram + 'static)))
    }

    fn create_texture_2d(&self) -> Option<SharedHandle<dyn Texture2D>> {
        let texture = SharedHandle::new(VkTexture::new(TextureDimension::D2));
        Some(SharedHandle::map(&texture, |texture| texture as &(dyn Texture2D + 'static)))
    }

    fn create_texture_2d_array(&self) -> Option<SharedHandle<dyn Texture2DArray>> {
        let texture = SharedHandle::new(VkTexture::new(TextureDimension::D2Array));
        Some(SharedHandle::map(&texture, |texture| texture as &(dyn Texture2DArray + 'static)))
    }

    fn create_texture_3d(&self) -> Option<SharedHandle<dyn Texture3D>> {
        let texture = SharedHandle::new(VkTexture::new(TextureDimension::D3));
        Some(SharedHandle::map(&texture, |texture| texture as &(dyn Texture3D + 'static)))
    }

    fn create_texture_cube_map(&self) -> Option<SharedHandle<dyn TextureCubeMap>> {
        let texture = SharedHandle::new(VkTexture::new(TextureDimension::CubeMap));
        Some(SharedHandle::map(&texture, |texture| texture as &(dyn TextureCubeMap + 'static)))
    }
}
