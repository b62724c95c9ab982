use gp1_pointers::{SharedHandle, WeakHandle};
use std::cell::Cell;
use tracing::trace;

/// Headless stand in for an OpenGL context.
///
/// Hands out object names and accounts for everything uploaded through it.
/// Resources only keep a weak handle, so they outliving the backend is fine.
#[derive(Debug)]
pub struct GlContext {
    version: (u32, u32),
    next_name: Cell<u32>,
    live_objects: Cell<usize>,
    uploads: Cell<u64>,
    uploaded_bytes: Cell<u64>,
}

impl GlContext {
    pub fn new(version: (u32, u32)) -> Self {
        Self {
            version,
            next_name: Cell::new(0),
            live_objects: Cell::new(0),
            uploads: Cell::new(0),
            uploaded_bytes: Cell::new(0),
        }
    }

    pub fn version(&self) -> (u32, u32) {
        self.version
    }

    /// Object names still in use.
    pub fn live_objects(&self) -> usize {
        self.live_objects.get()
    }

    pub fn uploads(&self) -> u64 {
        self.uploads.get()
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes.get()
    }

    fn gen_name(&self) -> u32 {
        let name = self.next_name.get() + 1;
        self.next_name.set(name);
        self.live_objects.set(self.live_objects.get() + 1);
        name
    }

    fn delete_name(&self, name: u32) {
        trace!(name, "Deleting GL object");
        self.live_objects.set(self.live_objects.get().saturating_sub(1));
    }

    fn record_upload(&self, bytes: usize) {
        self.uploads.set(self.uploads.get() + 1);
        self.uploaded_bytes.set(self.uploaded_bytes.get() + bytes as u64);
    }
}

/// A GL object name tied to the context it came from.
#[derive(Debug)]
pub(crate) struct GlObject {
    context: WeakHandle<GlContext>,
    name: u32,
}

impl GlObject {
    pub(crate) fn new(context: &SharedHandle<GlContext>) -> Self {
        Self {
            context: SharedHandle::downgrade(context),
            name: context.gen_name(),
        }
    }

    pub(crate) fn name(&self) -> u32 {
        self.name
    }

    /// Accounts for `bytes` sent to the object. Returns `false` once the
    /// context is gone.
    pub(crate) fn upload(&self, bytes: usize) -> bool {
        let Some(context) = self.context.lock() else {
            trace!(name = self.name, "GL context is gone, skipping upload");
            return false;
        };
        context.record_upload(bytes);
        true
    }
}

impl Drop for GlObject {
    fn drop(&mut self) {
        if let Some(context) = self.context.lock() {
            context.delete_name(self.name);
        }
    }
}
