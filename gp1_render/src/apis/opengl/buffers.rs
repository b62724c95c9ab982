use super::FrameStats;
use super::context::{GlContext, GlObject};
use crate::HasRendererData;
use crate::data::{RendererData, Resource};
use crate::renderer::Renderer;
use crate::resources::{
    CAMERA_BUFFER, ReservedBuffers, ReservedUniformBuffers, UniformBuffer, UniformBufferData, camera_layout,
};
use gp1_pointers::SharedHandle;
use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use tracing::{trace, warn};

/// std140 offsets of the camera block.
pub const CAMERA_OFFSETS: [(&str, usize); 3] = [
    ("projectionViewMatrix", 0),
    ("projectionMatrix", 64),
    ("viewMatrix", 128),
];

#[derive(HasRendererData)]
pub struct GlUniformBuffer {
    data: RendererData,
    buffer: UniformBufferData,
    object: GlObject,
    binding: Cell<Option<u32>>,
    offsets: RefCell<Option<Vec<(String, usize)>>>,
    mirror: RefCell<Vec<u8>>,
}

impl GlUniformBuffer {
    pub(crate) fn new(context: &SharedHandle<GlContext>) -> Self {
        Self {
            data: RendererData::new(),
            buffer: UniformBufferData::new(),
            object: GlObject::new(context),
            binding: Cell::new(None),
            offsets: RefCell::new(None),
            mirror: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> u32 {
        self.object.name()
    }

    pub fn binding(&self) -> Option<u32> {
        self.binding.get()
    }

    pub fn set_binding(&self, binding: u32) {
        self.binding.set(Some(binding));
    }

    /// Places uniforms at fixed byte offsets instead of the std140 packing.
    /// Uniforms missing from `offsets` are not uploaded.
    pub fn set_offsets<S: Into<String>>(&self, offsets: impl IntoIterator<Item = (S, usize)>) {
        let offsets = offsets
            .into_iter()
            .map(|(name, offset)| (name.into(), offset))
            .collect();
        *self.offsets.borrow_mut() = Some(offsets);
        self.buffer.mark_dirty();
    }

    /// The bytes as last uploaded.
    pub fn mirror(&self) -> Ref<'_, [u8]> {
        Ref::map(self.mirror.borrow(), Vec::as_slice)
    }

    /// Byte offset of every uniform that lives in the block.
    pub fn layout(&self) -> Vec<(String, usize)> {
        let offsets = self.offsets.borrow();
        let mut layout = Vec::new();
        let mut cursor = 0usize;

        for (name, uniform) in self.buffer.entries().iter() {
            let Some((align, size)) = uniform.uniform_type().std140() else {
                continue;
            };
            let offset = match offsets.as_ref() {
                Some(offsets) => match offsets.iter().find(|(entry, _)| entry == name) {
                    Some((_, offset)) => *offset,
                    None => continue,
                },
                None => cursor.next_multiple_of(align),
            };
            cursor = offset + size;
            layout.push((name.clone(), offset));
        }
        layout
    }

    /// Rebuilds the mirror from the current layout and uploads it.
    pub fn flush(&self) {
        let blocks: Vec<_> = self
            .layout()
            .into_iter()
            .filter_map(|(name, offset)| {
                let bytes = self.buffer.uniform(&name)?.std140_bytes()?;
                Some((offset, bytes))
            })
            .collect();
        let end = blocks
            .iter()
            .map(|(offset, bytes)| offset + bytes.len())
            .max()
            .unwrap_or(0);

        let mut mirror = self.mirror.borrow_mut();
        mirror.clear();
        mirror.resize(end, 0);
        for (offset, bytes) in &blocks {
            mirror[*offset..offset + bytes.len()].copy_from_slice(bytes);
        }

        self.buffer.clear_dirty();
        self.object.upload(mirror.len());
        trace!(buffer = self.name(), bytes = mirror.len(), "Flushed uniform buffer");
    }

    /// Flushes pending changes and binds the buffer to its binding point.
    pub(crate) fn bind(&self, stats: &mut FrameStats) {
        if self.buffer.is_dirty() {
            self.flush();
        }
        if self.binding.get().is_none() {
            warn!("Uniform buffer {} has no binding point", self.name());
            return;
        }
        stats.buffer_binds += 1;
    }
}

impl Resource for GlUniformBuffer {
    fn update(&self) {
        if self.buffer.is_dirty() {
            self.flush();
        }
    }

    fn is_updatable(&self) -> bool {
        true
    }
}

impl UniformBuffer for GlUniformBuffer {
    fn buffer(&self) -> &UniformBufferData {
        &self.buffer
    }
}

pub(crate) fn as_gl_buffer(buffer: &dyn UniformBuffer) -> Option<&GlUniformBuffer> {
    let buffer: &dyn Any = buffer;
    buffer.downcast_ref::<GlUniformBuffer>()
}

pub struct GlReservedUniformBuffers {
    reserved: ReservedBuffers,
}

impl GlReservedUniformBuffers {
    /// Creates the camera block at binding point 0.
    pub(crate) fn new(renderer: &Renderer) -> Self {
        let reserved = ReservedBuffers::new();

        match renderer.create_uniform_buffer() {
            Some(camera) => {
                camera.update_uniforms(renderer, camera_layout().as_slice());
                if let Some(gl) = as_gl_buffer(&*camera) {
                    gl.set_offsets(CAMERA_OFFSETS);
                }
                if let Err(e) = reserved.insert(CAMERA_BUFFER, camera) {
                    warn!("{e}");
                }
            }
            None => warn!("Couldn't create the {CAMERA_BUFFER} uniform buffer"),
        }

        let reserved = Self { reserved };
        reserved.assign_bindings();
        reserved
    }

    /// Reserved blocks take the binding points from 0 in slot order.
    pub fn assign_bindings(&self) {
        for (binding, (_, buffer)) in (0u32..).zip(self.reserved.entries().iter()) {
            if let Some(buffer) = as_gl_buffer(&**buffer) {
                buffer.set_binding(binding);
            }
        }
    }

    /// First binding point free for material blocks.
    pub fn next_binding(&self) -> u32 {
        self.reserved.len() as u32
    }

    pub(crate) fn bind(&self, stats: &mut FrameStats) {
        for (name, buffer) in self.reserved.entries().iter() {
            match as_gl_buffer(&**buffer) {
                Some(buffer) => buffer.bind(stats),
                None => warn!("Reserved uniform buffer {name:?} was not created by the OpenGL renderer"),
            }
        }
    }
}

impl ReservedUniformBuffers for GlReservedUniformBuffers {
    fn reserved(&self) -> &ReservedBuffers {
        &self.reserved
    }
}
