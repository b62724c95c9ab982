use crate::data::{HasRendererData, Resource};
use crate::renderer::Renderer;
use crate::resources::{ShaderProgram, Uniform, UniformBuffer, UniformBufferLayout};
use gp1_pointers::SharedHandle;
use num_enum::TryFromPrimitive;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use tracing::warn;

#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive)]
pub enum ETriangleFace {
    Front,
    Back,
    FrontAndBack,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive)]
pub enum EBlendFunc {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
    Src1Color,
    OneMinusSrc1Color,
    Src1Alpha,
    OneMinusSrc1Alpha,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive)]
pub enum EPolygonMode {
    Point,
    Line,
    Fill,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CullMode {
    pub enabled: bool,
    pub face: ETriangleFace,
}

impl Default for CullMode {
    fn default() -> Self {
        Self {
            enabled: true,
            face: ETriangleFace::Back,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BlendFunc {
    pub enabled: bool,
    pub src: EBlendFunc,
    pub dst: EBlendFunc,
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self {
            enabled: true,
            src: EBlendFunc::SrcAlpha,
            dst: EBlendFunc::OneMinusSrcAlpha,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PolygonMode {
    pub enabled: bool,
    pub face: ETriangleFace,
    pub mode: EPolygonMode,
}

impl Default for PolygonMode {
    fn default() -> Self {
        Self {
            enabled: true,
            face: ETriangleFace::FrontAndBack,
            mode: EPolygonMode::Fill,
        }
    }
}

/// Fixed function state applied while a material is bound.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RenderState {
    pub depth_test: bool,
    pub cull_mode: CullMode,
    pub blend_func: BlendFunc,
    pub polygon_mode: PolygonMode,
}

#[derive(Default)]
pub struct MaterialData {
    render_state: Cell<RenderState>,
    program: RefCell<Option<SharedHandle<dyn ShaderProgram>>>,
    uniform_buffers: RefCell<Vec<(String, SharedHandle<dyn UniformBuffer>)>>,
}

impl MaterialData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_state(&self) -> RenderState {
        self.render_state.get()
    }

    pub fn set_render_state(&self, state: RenderState) {
        self.render_state.set(state);
    }

    pub fn modify_render_state(&self, f: impl FnOnce(&mut RenderState)) {
        let mut state = self.render_state.get();
        f(&mut state);
        self.render_state.set(state);
    }

    pub fn shader_program(&self) -> Option<SharedHandle<dyn ShaderProgram>> {
        self.program.borrow().clone()
    }

    pub fn uniform_buffer(&self, name: &str) -> Option<SharedHandle<dyn UniformBuffer>> {
        self.uniform_buffers
            .borrow()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, buffer)| buffer.clone())
    }

    pub fn uniform(&self, buffer: &str, name: &str) -> Option<SharedHandle<dyn Uniform>> {
        self.uniform_buffer(buffer)?.uniform(name)
    }

    pub fn uniform_buffers(&self) -> Ref<'_, [(String, SharedHandle<dyn UniformBuffer>)]> {
        Ref::map(self.uniform_buffers.borrow(), Vec::as_slice)
    }

    /// Reshapes the uniform buffers to the blocks in `layouts`.
    ///
    /// Buffers whose name is still declared are updated in place, buffers
    /// that are no longer declared are dropped and new blocks get a fresh
    /// buffer appended. Only the first layout of a name counts.
    pub(crate) fn sync_uniform_buffers(&self, renderer: &Renderer, layouts: &[UniformBufferLayout]) {
        let mut pending: Vec<&UniformBufferLayout> = Vec::with_capacity(layouts.len());
        for layout in layouts {
            if !pending.iter().any(|seen| seen.name == layout.name) {
                pending.push(layout);
            }
        }

        let mut buffers = self.uniform_buffers.take();
        buffers.retain(|(name, buffer)| {
            let Some(index) = pending.iter().position(|layout| layout.name == *name) else {
                return false;
            };
            buffer.update_uniforms(renderer, pending.remove(index).uniforms.as_slice());
            true
        });

        for layout in pending {
            let Some(buffer) = renderer.create_uniform_buffer() else {
                warn!(
                    "Backend {} could not create uniform buffer {:?}",
                    renderer.name(),
                    layout.name
                );
                continue;
            };
            buffer.update_uniforms(renderer, layout.uniforms.as_slice());
            buffers.push((layout.name.clone(), buffer));
        }

        *self.uniform_buffers.borrow_mut() = buffers;
    }

    fn clear_uniform_buffers(&self) -> Vec<(String, SharedHandle<dyn UniformBuffer>)> {
        self.uniform_buffers.take()
    }
}

impl fmt::Debug for MaterialData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .uniform_buffers
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        f.debug_struct("MaterialData")
            .field("render_state", &self.render_state.get())
            .field("has_program", &self.program.borrow().is_some())
            .field("uniform_buffers", &names)
            .finish()
    }
}

pub trait Material: Resource {
    fn material(&self) -> &MaterialData;
}

impl dyn Material {
    /// Uses `program` from now on and rebuilds the uniform buffers from its
    /// declared blocks. The material follows later changes to those blocks.
    pub fn set_shader_program(&self, renderer: &Renderer, program: SharedHandle<dyn ShaderProgram>) {
        let data = self.material();
        let id = self.renderer_data().id();

        if let Some(previous) = data.program.borrow_mut().take()
            && let Some(id) = id
        {
            previous.program().remove_material(id);
        }
        drop(data.clear_uniform_buffers());

        match id {
            Some(id) => program.program().add_material(id),
            None => warn!("Unregistered material will not follow shader program changes"),
        }

        let layouts = program.program().uniform_buffers().to_vec();
        *data.program.borrow_mut() = Some(program);
        data.sync_uniform_buffers(renderer, &layouts);
    }

    pub fn shader_program(&self) -> Option<SharedHandle<dyn ShaderProgram>> {
        self.material().shader_program()
    }

    pub fn uniform_buffer(&self, name: &str) -> Option<SharedHandle<dyn UniformBuffer>> {
        self.material().uniform_buffer(name)
    }

    pub fn uniform(&self, buffer: &str, name: &str) -> Option<SharedHandle<dyn Uniform>> {
        self.material().uniform(buffer, name)
    }

    pub fn render_state(&self) -> RenderState {
        self.material().render_state()
    }
}
