use crate::error::{ReservedSlotsFullErr, Result};
use crate::resources::{Uniform, UniformBuffer, UniformType};
use gp1_pointers::SharedHandle;
use snafu::ensure;
use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;

pub const MAX_RESERVED_UNIFORM_BUFFERS: usize = 8;

/// Name of the reserved block holding the camera matrices.
pub const CAMERA_BUFFER: &str = "Camera";

/// Uniforms of the [`CAMERA_BUFFER`] block, in std140 order.
pub fn camera_layout() -> [(&'static str, UniformType); 3] {
    [
        ("projectionViewMatrix", UniformType::FMat4),
        ("projectionMatrix", UniformType::FMat4),
        ("viewMatrix", UniformType::FMat4),
    ]
}

/// Engine owned uniform blocks shared by every shader program.
#[derive(Default)]
pub struct ReservedBuffers {
    entries: RefCell<Vec<(String, SharedHandle<dyn UniformBuffer>)>>,
}

impl ReservedBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `buffer` under `name`, replacing a buffer with the same name.
    /// Returns the slot index, which backends use as binding point.
    pub fn insert(&self, name: impl Into<String>, buffer: SharedHandle<dyn UniformBuffer>) -> Result<usize> {
        let name = name.into();
        let mut entries = self.entries.borrow_mut();

        if let Some(index) = entries.iter().position(|(existing, _)| *existing == name) {
            entries[index].1 = buffer;
            return Ok(index);
        }

        ensure!(
            entries.len() < MAX_RESERVED_UNIFORM_BUFFERS,
            ReservedSlotsFullErr {
                name,
                max: MAX_RESERVED_UNIFORM_BUFFERS,
            }
        );
        entries.push((name, buffer));
        Ok(entries.len() - 1)
    }

    pub fn uniform_buffer(&self, name: &str) -> Option<SharedHandle<dyn UniformBuffer>> {
        self.entries
            .borrow()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, buffer)| buffer.clone())
    }

    pub fn uniform(&self, buffer: &str, name: &str) -> Option<SharedHandle<dyn Uniform>> {
        self.uniform_buffer(buffer)?.uniform(name)
    }

    pub fn entries(&self) -> Ref<'_, [(String, SharedHandle<dyn UniformBuffer>)]> {
        Ref::map(self.entries.borrow(), Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) -> Vec<(String, SharedHandle<dyn UniformBuffer>)> {
        self.entries.take()
    }
}

impl fmt::Debug for ReservedBuffers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.borrow().iter().map(|(name, _)| name.clone()))
            .finish()
    }
}

pub trait ReservedUniformBuffers: Any {
    fn reserved(&self) -> &ReservedBuffers;
}

impl dyn ReservedUniformBuffers {
    pub fn uniform_buffer(&self, name: &str) -> Option<SharedHandle<dyn UniformBuffer>> {
        self.reserved().uniform_buffer(name)
    }

    pub fn uniform(&self, buffer: &str, name: &str) -> Option<SharedHandle<dyn Uniform>> {
        self.reserved().uniform(buffer, name)
    }
}
