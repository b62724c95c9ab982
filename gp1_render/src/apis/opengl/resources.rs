use super::FrameStats;
use super::buffers::as_gl_buffer;
use super::context::{GlContext, GlObject};
use crate::HasRendererData;
use crate::data::{RendererData, Resource};
use crate::resources::{
    Material, MaterialData, ShaderProgram, ShaderProgramData, ShaderStage, StaticMesh, StaticMeshData,
    Texture2D, Texture2DArray, Texture3D, TextureCubeMap, TextureData, TextureDimension, Uniform,
    UniformCell, UniformFactory, UniformStorage, UniformValue, Vertex,
};
use gp1_pointers::SharedHandle;
use std::any::Any;
use std::cell::Cell;
use tracing::{trace, warn};

/// Geometry as last uploaded, kept in the mesh's extension slot.
#[derive(Debug, Clone, PartialEq)]
pub struct GlMeshBuffers {
    pub vertex_bytes: Vec<u8>,
    pub indices: Vec<u32>,
}

impl GlMeshBuffers {
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

#[derive(HasRendererData)]
pub struct GlStaticMesh {
    data: RendererData,
    mesh: StaticMeshData,
    vao: GlObject,
}

impl GlStaticMesh {
    pub(crate) fn new(context: &SharedHandle<GlContext>) -> Self {
        Self {
            data: RendererData::new(),
            mesh: StaticMeshData::new(),
            vao: GlObject::new(context),
        }
    }

    pub fn vao(&self) -> u32 {
        self.vao.name()
    }

    pub fn uploaded_index_count(&self) -> Option<usize> {
        self.data.next::<GlMeshBuffers>().map(|buffers| buffers.index_count())
    }
}

impl Resource for GlStaticMesh {
    fn update(&self) {
        if !self.mesh.is_dirty() {
            return;
        }
        self.mesh.clear_dirty();

        if let Some(index) = self.mesh.invalid_index() {
            warn!(
                "Mesh {} has index {index} but only {} vertices, keeping the previous upload",
                self.vao(),
                self.mesh.vertex_count()
            );
            return;
        }

        let vertices = self.mesh.vertices();
        let buffers = GlMeshBuffers {
            vertex_bytes: bytemuck::cast_slice::<Vertex, u8>(&vertices).to_vec(),
            indices: self.mesh.indices().to_vec(),
        };
        drop(vertices);

        let bytes = buffers.vertex_bytes.len() + size_of_val(buffers.indices.as_slice());
        if self.vao.upload(bytes) {
            self.data.set_next(buffers);
        }
    }

    fn is_updatable(&self) -> bool {
        true
    }
}

impl StaticMesh for GlStaticMesh {
    fn mesh(&self) -> &StaticMeshData {
        &self.mesh
    }
}

/// Every texture kind, told apart by its [`TextureDimension`].
#[derive(HasRendererData)]
pub struct GlTexture {
    data: RendererData,
    texture: TextureData,
    object: GlObject,
    uploaded: Cell<Option<[u32; 3]>>,
}

impl GlTexture {
    pub(crate) fn new(context: &SharedHandle<GlContext>, dimension: TextureDimension) -> Self {
        Self {
            data: RendererData::new(),
            texture: TextureData::new(dimension),
            object: GlObject::new(context),
            uploaded: Cell::new(None),
        }
    }

    pub fn name(&self) -> u32 {
        self.object.name()
    }

    /// Extent of the image currently on the GPU.
    pub fn uploaded_extent(&self) -> Option<[u32; 3]> {
        self.uploaded.get()
    }
}

impl Resource for GlTexture {
    fn update(&self) {
        if !self.texture.is_dirty() {
            return;
        }
        self.texture.clear_dirty();

        let len = self.texture.pixels().len();
        if !self.texture.is_complete() {
            match self.texture.expected_len() {
                Some(expected) => warn!(
                    "Texture {} has {len} bytes of pixel data, {expected} expected",
                    self.name()
                ),
                None => warn!("Texture {} is too large to upload", self.name()),
            }
            return;
        }

        if self.object.upload(len) {
            self.uploaded.set(Some(self.texture.extent()));
        }
    }

    fn is_updatable(&self) -> bool {
        true
    }
}

macro_rules! gl_texture_kind {
    ($($kind:ident),* $(,)?) => {
        $(
            impl $kind for GlTexture {
                fn texture(&self) -> &TextureData {
                    &self.texture
                }
            }
        )*
    };
}

gl_texture_kind!(Texture2D, Texture2DArray, Texture3D, TextureCubeMap);

#[derive(HasRendererData)]
pub struct GlShaderProgram {
    data: RendererData,
    program: ShaderProgramData,
    object: GlObject,
    linked: Cell<bool>,
}

impl GlShaderProgram {
    pub(crate) fn new(context: &SharedHandle<GlContext>) -> Self {
        Self {
            data: RendererData::new(),
            program: ShaderProgramData::new(),
            object: GlObject::new(context),
            linked: Cell::new(false),
        }
    }

    pub fn name(&self) -> u32 {
        self.object.name()
    }

    pub fn is_linked(&self) -> bool {
        self.linked.get()
    }
}

impl Resource for GlShaderProgram {
    fn update(&self) {
        if !self.program.is_dirty() {
            return;
        }
        self.program.clear_dirty();

        let stages = self.program.stages();
        let graphics = stages.contains(&ShaderStage::Vertex) && stages.contains(&ShaderStage::Fragment);
        let compute = stages == [ShaderStage::Compute];
        if !graphics && !compute {
            warn!("Shader program {} cannot link stages {stages:?}", self.name());
            self.linked.set(false);
            return;
        }

        let bytes = stages
            .iter()
            .filter_map(|stage| self.program.source(*stage))
            .map(|source| source.len())
            .sum();
        self.linked.set(self.object.upload(bytes));
        trace!(program = self.name(), linked = self.is_linked(), "Linked shader program");
    }

    fn is_updatable(&self) -> bool {
        true
    }
}

impl ShaderProgram for GlShaderProgram {
    fn program(&self) -> &ShaderProgramData {
        &self.program
    }
}

#[derive(HasRendererData)]
pub struct GlUniform<V: UniformValue> {
    data: RendererData,
    cell: UniformCell<V>,
}

impl<V: UniformValue> Resource for GlUniform<V> {}

impl<V: UniformValue> Uniform for GlUniform<V> {
    fn storage(&self) -> &dyn UniformStorage {
        &self.cell
    }
}

pub(crate) struct GlUniformFactory;

impl UniformFactory for GlUniformFactory {
    fn make<V: UniformValue>(&self) -> Option<SharedHandle<dyn Uniform>> {
        let uniform = SharedHandle::new(GlUniform::<V> {
            data: RendererData::new(),
            cell: UniformCell::default(),
        });
        Some(SharedHandle::map(&uniform, |uniform| uniform as &(dyn Uniform + 'static)))
    }
}

#[derive(HasRendererData)]
pub struct GlMaterial {
    data: RendererData,
    material: MaterialData,
}

impl GlMaterial {
    pub(crate) fn new() -> Self {
        Self {
            data: RendererData::new(),
            material: MaterialData::new(),
        }
    }

    /// Binds the program and the uniform buffers, starting at binding
    /// point `first_binding`. Returns `false` if there is nothing to draw
    /// with.
    pub(crate) fn bind(&self, first_binding: u32, stats: &mut FrameStats) -> bool {
        let Some(program) = self.material.shader_program() else {
            trace!("Material has no shader program");
            return false;
        };
        let program: &dyn Any = &*program;
        if !program.downcast_ref::<GlShaderProgram>().is_some_and(GlShaderProgram::is_linked) {
            trace!("Material's shader program is not linked");
            return false;
        }

        for (binding, (name, buffer)) in (first_binding..).zip(self.material.uniform_buffers().iter()) {
            let Some(buffer) = as_gl_buffer(&**buffer) else {
                warn!("Uniform buffer {name:?} was not created by the OpenGL renderer");
                continue;
            };
            buffer.set_binding(binding);
            buffer.bind(stats);
        }

        stats.material_binds += 1;
        true
    }
}

impl Resource for GlMaterial {}

impl Material for GlMaterial {
    fn material(&self) -> &MaterialData {
        &self.material
    }
}
