//! The resource kinds a backend produces.
//!
//! Each kind is a trait a backend implements on top of a plain data struct
//! holding the client side state. Backends embed the data struct and hand
//! it out through the trait's accessor.

mod debug;
mod material;
mod mesh;
mod reserved;
mod shader;
mod texture;
mod uniform;
mod uniform_buffer;

pub use debug::{DebugBatch, DebugQueue, DebugRenderer, DebugVertex};
pub use material::{
    BlendFunc, CullMode, EBlendFunc, EPolygonMode, ETriangleFace, Material, MaterialData, PolygonMode,
    RenderState,
};
pub use mesh::{StaticMesh, StaticMeshData, Vertex};
pub use reserved::{
    CAMERA_BUFFER, MAX_RESERVED_UNIFORM_BUFFERS, ReservedBuffers, ReservedUniformBuffers, camera_layout,
};
pub use shader::{ShaderProgram, ShaderProgramData, ShaderStage, UniformBufferLayout};
pub use texture::{
    Texture2D, Texture2DArray, Texture3D, TextureCubeMap, TextureData, TextureDimension, TextureFormat,
};
pub use uniform::{
    Sampler, Uniform, UniformCell, UniformFactory, UniformStorage, UniformType, UniformValue,
};
pub use uniform_buffer::{UniformBuffer, UniformBufferData};
