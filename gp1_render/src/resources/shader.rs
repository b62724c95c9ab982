use crate::data::Resource;
use crate::registry::ResourceId;
use crate::renderer::Renderer;
use crate::resources::{Material, UniformType};
use bon::Builder;
use num_enum::TryFromPrimitive;
use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, TryFromPrimitive)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

/// A uniform block a shader program declares, and the uniforms in it.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct UniformBufferLayout {
    #[builder(into)]
    pub name: String,
    #[builder(default)]
    pub uniforms: Vec<(String, UniformType)>,
}

impl UniformBufferLayout {
    pub fn new<S: Into<String>>(name: impl Into<String>, uniforms: impl IntoIterator<Item = (S, UniformType)>) -> Self {
        Self {
            name: name.into(),
            uniforms: uniforms
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        }
    }
}

#[derive(Default)]
pub struct ShaderProgramData {
    sources: RefCell<BTreeMap<ShaderStage, String>>,
    uniform_buffers: RefCell<Vec<UniformBufferLayout>>,
    materials: RefCell<Vec<ResourceId>>,
    dirty: Cell<bool>,
}

impl ShaderProgramData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_source(&self, stage: ShaderStage, source: impl Into<String>) {
        self.sources.borrow_mut().insert(stage, source.into());
        self.dirty.set(true);
    }

    pub fn remove_source(&self, stage: ShaderStage) -> Option<String> {
        let removed = self.sources.borrow_mut().remove(&stage);
        if removed.is_some() {
            self.dirty.set(true);
        }
        removed
    }

    pub fn source(&self, stage: ShaderStage) -> Option<Ref<'_, str>> {
        Ref::filter_map(self.sources.borrow(), |sources| sources.get(&stage).map(String::as_str)).ok()
    }

    pub fn has_stage(&self, stage: ShaderStage) -> bool {
        self.sources.borrow().contains_key(&stage)
    }

    pub fn stages(&self) -> Vec<ShaderStage> {
        self.sources.borrow().keys().copied().collect()
    }

    /// Declares the uniform blocks of this program and reshapes the uniform
    /// buffers of every material using it.
    pub fn set_uniform_buffers(&self, renderer: &Renderer, layouts: Vec<UniformBufferLayout>) {
        *self.uniform_buffers.borrow_mut() = layouts;
        self.dirty.set(true);

        let layouts = self.uniform_buffers.borrow().clone();
        let ids = self.materials.borrow().clone();
        let mut live = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(material) = renderer.find::<dyn Material>(id) else {
                trace!(?id, "Dropping stale material from shader program");
                continue;
            };
            material.material().sync_uniform_buffers(renderer, &layouts);
            live.push(id);
        }
        *self.materials.borrow_mut() = live;
    }

    pub fn uniform_buffers(&self) -> Ref<'_, [UniformBufferLayout]> {
        Ref::map(self.uniform_buffers.borrow(), Vec::as_slice)
    }

    /// Registry ids of the materials using this program.
    pub fn material_ids(&self) -> Vec<ResourceId> {
        self.materials.borrow().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn clear_dirty(&self) {
        self.dirty.set(false);
    }

    pub(crate) fn add_material(&self, id: ResourceId) {
        let mut materials = self.materials.borrow_mut();
        if !materials.contains(&id) {
            materials.push(id);
        }
    }

    pub(crate) fn remove_material(&self, id: ResourceId) {
        self.materials.borrow_mut().retain(|entry| *entry != id);
    }
}

impl fmt::Debug for ShaderProgramData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgramData")
            .field("stages", &self.stages())
            .field("uniform_buffers", &*self.uniform_buffers.borrow())
            .field("materials", &self.materials.borrow().len())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}

pub trait ShaderProgram: Resource {
    fn program(&self) -> &ShaderProgramData;
}

impl dyn ShaderProgram {
    pub fn set_source(&self, stage: ShaderStage, source: impl Into<String>) {
        self.program().set_source(stage, source);
    }

    pub fn set_uniform_buffers(&self, renderer: &Renderer, layouts: Vec<UniformBufferLayout>) {
        self.program().set_uniform_buffers(renderer, layouts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_are_tracked_per_stage() {
        let program = ShaderProgramData::new();
        assert!(!program.is_dirty());

        program.set_source(ShaderStage::Fragment, "void main() {}");
        program.set_source(ShaderStage::Vertex, "void main() {}");
        assert!(program.is_dirty());
        assert_eq!(program.stages(), vec![ShaderStage::Vertex, ShaderStage::Fragment]);
        assert_eq!(program.source(ShaderStage::Vertex).as_deref(), Some("void main() {}"));

        program.clear_dirty();
        assert_eq!(program.remove_source(ShaderStage::Geometry), None);
        assert!(!program.is_dirty());
        assert!(program.remove_source(ShaderStage::Fragment).is_some());
        assert!(program.is_dirty());
    }

    #[test]
    fn layouts_build_from_pairs() {
        let built = UniformBufferLayout::builder()
            .name("Object")
            .uniforms(vec![("transformationMatrix".to_owned(), UniformType::FMat4)])
            .build();
        let direct = UniformBufferLayout::new("Object", [("transformationMatrix", UniformType::FMat4)]);
        assert_eq!(built, direct);
    }
}
