use crate::data::Resource;
use crate::renderer::Renderer;
use crate::resources::{Uniform, UniformType};
use gp1_pointers::SharedHandle;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use tracing::warn;

/// Ordered, named uniforms making up one uniform block.
#[derive(Default)]
pub struct UniformBufferData {
    uniforms: RefCell<Vec<(String, SharedHandle<dyn Uniform>)>>,
    layout_changed: Cell<bool>,
}

impl UniformBufferData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reshapes the buffer to `layout`.
    ///
    /// A uniform with the same name and type keeps its value, every other
    /// entry is created through `renderer`. Later duplicates of a name are
    /// ignored. Entries the backend refuses to create are left out.
    pub fn update_uniforms<S: AsRef<str>>(&self, renderer: &Renderer, layout: &[(S, UniformType)]) {
        let mut previous = self.uniforms.take();
        let mut next: Vec<(String, SharedHandle<dyn Uniform>)> = Vec::with_capacity(layout.len());

        for (name, ty) in layout {
            let name = name.as_ref();
            if next.iter().any(|(existing, _)| existing == name) {
                continue;
            }

            let reused = previous
                .iter()
                .position(|(existing, uniform)| existing == name && uniform.uniform_type() == *ty)
                .map(|index| previous.swap_remove(index).1);

            let uniform = match reused {
                Some(uniform) => uniform,
                None => match renderer.create_uniform(*ty) {
                    Some(uniform) => uniform,
                    None => {
                        warn!("Backend {} could not create a {ty:?} uniform for {name:?}", renderer.name());
                        continue;
                    }
                },
            };
            next.push((name.to_owned(), uniform));
        }

        *self.uniforms.borrow_mut() = next;
        self.layout_changed.set(true);
    }

    pub fn uniform(&self, name: &str) -> Option<SharedHandle<dyn Uniform>> {
        self.uniforms
            .borrow()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, uniform)| uniform.clone())
    }

    pub fn entries(&self) -> Ref<'_, [(String, SharedHandle<dyn Uniform>)]> {
        Ref::map(self.uniforms.borrow(), Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.uniforms.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.uniforms.borrow().is_empty()
    }

    /// Forces the next update to upload the whole block.
    pub fn mark_dirty(&self) {
        self.layout_changed.set(true);
    }

    /// Whether the layout or any uniform changed since the last
    /// [`clear_dirty`](Self::clear_dirty).
    pub fn is_dirty(&self) -> bool {
        self.layout_changed.get()
            || self
                .uniforms
                .borrow()
                .iter()
                .any(|(_, uniform)| uniform.is_dirty())
    }

    pub fn clear_dirty(&self) {
        self.layout_changed.set(false);
        for (_, uniform) in self.uniforms.borrow().iter() {
            uniform.clear_dirty();
        }
    }
}

impl fmt::Debug for UniformBufferData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.uniforms
                    .borrow()
                    .iter()
                    .map(|(name, uniform)| (name.clone(), uniform.uniform_type())),
            )
            .finish()
    }
}

pub trait UniformBuffer: Resource {
    fn buffer(&self) -> &UniformBufferData;
}

impl dyn UniformBuffer {
    pub fn uniform(&self, name: &str) -> Option<SharedHandle<dyn Uniform>> {
        self.buffer().uniform(name)
    }

    pub fn update_uniforms<S: AsRef<str>>(&self, renderer: &Renderer, layout: &[(S, UniformType)]) {
        self.buffer().update_uniforms(renderer, layout);
    }

    pub fn is_dirty(&self) -> bool {
        self.buffer().is_dirty()
    }

    pub fn clear_dirty(&self) {
        self.buffer().clear_dirty();
    }
}
