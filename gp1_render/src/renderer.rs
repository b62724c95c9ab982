//! The frontend every backend is driven through.
//!
//! A [`Renderer`] owns one [`Backend`] and the [`Registry`] of everything
//! that backend created. It never owns the resources themselves: they live
//! as long as the user holds strong handles, and deregister themselves when
//! dropped.

use crate::backend::Backend;
use crate::camera::{Camera, Drawable};
use crate::data::{HasRendererData, Resource};
use crate::error::{AlreadyInitializedErr, BackendInitErr, Result};
use crate::registry::{Registry, ResourceId, ResourceKind};
use crate::resources::{
    DebugRenderer, Material, ReservedUniformBuffers, ShaderProgram, StaticMesh, Texture2D, Texture2DArray,
    Texture3D, TextureCubeMap, Uniform, UniformBuffer, UniformType,
};
use bon::Builder;
use gp1_pointers::SharedHandle;
use gp1_utils::{EngineArgs, debug_panic};
use snafu::{ResultExt, ensure};
use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use tracing::{debug, info, instrument, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct RendererSettings {
    /// Whether [`Renderer::init`] asks the backend for a debug renderer.
    #[builder(default = true)]
    pub debug_renderer: bool,
    /// Frames a debug line stays queued unless given explicitly.
    #[builder(default = 1)]
    pub debug_line_frames: u32,
}

impl RendererSettings {
    pub fn from_args(args: &EngineArgs) -> Self {
        RendererSettings::builder()
            .debug_renderer(!args.no_debug_renderer)
            .debug_line_frames(args.debug_line_frames())
            .build()
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self::from_args(EngineArgs::get())
    }
}

/// Where the renderer is within the current frame.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum FramePhase {
    #[default]
    Idle,
    Updated,
    Rendered,
}

pub struct Renderer {
    backend: Box<dyn Backend>,
    registry: SharedHandle<RefCell<Registry>>,
    reserved_uniform_buffers: RefCell<Option<SharedHandle<dyn ReservedUniformBuffers>>>,
    debug_renderer: RefCell<Option<SharedHandle<dyn DebugRenderer>>>,
    phase: Cell<FramePhase>,
    frame_index: Cell<u64>,
    initialized: Cell<bool>,
    settings: RendererSettings,
}

impl Renderer {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self::with_settings(backend, RendererSettings::default())
    }

    pub fn with_settings(backend: Box<dyn Backend>, settings: RendererSettings) -> Self {
        Self {
            backend,
            registry: SharedHandle::default(),
            reserved_uniform_buffers: RefCell::default(),
            debug_renderer: RefCell::default(),
            phase: Cell::default(),
            frame_index: Cell::new(0),
            initialized: Cell::new(false),
            settings,
        }
    }

    /// Asks the backend for a resource of kind `K` and registers it.
    ///
    /// Returns `None` if the backend declined, in which case nothing is
    /// registered.
    pub fn create<K: ResourceKind + ?Sized>(&self, args: K::Args) -> Option<SharedHandle<K>> {
        let Some(resource) = K::produce(&*self.backend, args) else {
            trace!("The {} renderer produced no {}", self.name(), K::TYPE);
            return None;
        };

        let as_resource = SharedHandle::map(&resource, K::as_resource);
        let id = self.registry.borrow_mut().insert(&resource, &as_resource);
        as_resource.renderer_data().attach(
            id,
            SharedHandle::downgrade(&self.registry),
            SharedHandle::downgrade(&as_resource),
        );

        trace!(?id, "Registered {}", K::TYPE);
        Some(resource)
    }

    pub fn create_static_mesh(&self) -> Option<SharedHandle<dyn StaticMesh>> {
        self.create::<dyn StaticMesh>(())
    }

    pub fn create_material(&self) -> Option<SharedHandle<dyn Material>> {
        self.create::<dyn Material>(())
    }

    pub fn create_uniform(&self, ty: UniformType) -> Option<SharedHandle<dyn Uniform>> {
        self.create::<dyn Uniform>(ty)
    }

    pub fn create_uniform_buffer(&self) -> Option<SharedHandle<dyn UniformBuffer>> {
        self.create::<dyn UniformBuffer>(())
    }

    pub fn create_shader_program(&self) -> Option<SharedHandle<dyn ShaderProgram>> {
        self.create::<dyn ShaderProgram>(())
    }

    pub fn create_texture_2d(&self) -> Option<SharedHandle<dyn Texture2D>> {
        self.create::<dyn Texture2D>(())
    }

    pub fn create_texture_2d_array(&self) -> Option<SharedHandle<dyn Texture2DArray>> {
        self.create::<dyn Texture2DArray>(())
    }

    pub fn create_texture_3d(&self) -> Option<SharedHandle<dyn Texture3D>> {
        self.create::<dyn Texture3D>(())
    }

    pub fn create_texture_cube_map(&self) -> Option<SharedHandle<dyn TextureCubeMap>> {
        self.create::<dyn TextureCubeMap>(())
    }

    /// Deregisters `resource` ahead of its drop. Returns whether it was
    /// deregistered, `false` if it wasn't registered or the registry is
    /// borrowed. Removing twice is harmless.
    pub fn remove_renderer_data(&self, resource: &dyn Resource) -> bool {
        let Some(registration) = resource.renderer_data().detach() else {
            return false;
        };
        trace!(id = ?registration.id, "Deregistering resource");
        match registration.release() {
            Ok(()) => true,
            Err(registration) => {
                warn!(id = ?registration.id, "Registry is in use, the resource stays registered");
                resource.renderer_data().restore(registration);
                false
            }
        }
    }

    /// Initializes the backend, then creates the debug renderer and the
    /// reserved uniform buffers.
    #[instrument(skip_all)]
    pub fn init(&self) -> Result<()> {
        ensure!(
            !self.initialized.get(),
            AlreadyInitializedErr {
                backend: self.name()
            }
        );

        self.backend
            .init(self)
            .context(BackendInitErr { backend: self.name() })?;
        self.initialized.set(true);

        if self.settings.debug_renderer {
            let debug_renderer = self.backend.create_debug_renderer(self);
            match &debug_renderer {
                Some(debug_renderer) => debug_renderer
                    .queue()
                    .set_default_frames(self.settings.debug_line_frames),
                None => debug!("The {} renderer has no debug renderer", self.name()),
            }
            *self.debug_renderer.borrow_mut() = debug_renderer;
        }

        let reserved = self.backend.create_reserved_uniform_buffers(self);
        if reserved.is_none() {
            warn!("The {} renderer created no reserved uniform buffers", self.name());
        }
        *self.reserved_uniform_buffers.borrow_mut() = reserved;

        info!("Initialized the {} renderer", self.name());
        Ok(())
    }

    /// Drops the debug renderer and the reserved uniform buffers, then
    /// deinitializes the backend. Does nothing if not initialized.
    #[instrument(skip_all)]
    pub fn deinit(&self) {
        if !self.initialized.replace(false) {
            return;
        }

        let debug_renderer = self.debug_renderer.take();
        let reserved = self.reserved_uniform_buffers.take();
        drop(debug_renderer);
        drop(reserved);

        self.backend.deinit(self);
        info!("Deinitialized the {} renderer", self.name());
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Updates every updatable resource in registration order, then runs
    /// the backend's frame start.
    pub fn begin_frame(&self) {
        if self.phase.get() != FramePhase::Idle {
            debug_panic!("begin_frame was called before the previous frame ended");
        }
        self.phase.set(FramePhase::Updated);

        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            registry.prune();
        }
        let updatable = self.registry.borrow().updatable();
        for resource in &updatable {
            resource.update();
        }
        drop(updatable);

        self.backend.begin_frame(self);
    }

    pub fn render(&self, camera: &Camera, drawables: &[Drawable]) {
        if self.phase.get() != FramePhase::Updated {
            debug_panic!("render was called outside of begin_frame and end_frame");
        }
        self.phase.set(FramePhase::Rendered);

        self.backend.render(self, camera, drawables);
    }

    pub fn end_frame(&self) {
        if self.phase.get() == FramePhase::Idle {
            debug_panic!("end_frame was called without begin_frame");
        }

        self.backend.end_frame(self);
        self.phase.set(FramePhase::Idle);
        self.frame_index.set(self.frame_index.get() + 1);
    }

    pub fn phase(&self) -> FramePhase {
        self.phase.get()
    }

    /// Number of completed frames.
    pub fn frame_index(&self) -> u64 {
        self.frame_index.get()
    }

    /// Number of registered resources of kind `K`.
    pub fn len<K: ResourceKind + ?Sized>(&self) -> usize {
        K::collection(&self.registry.borrow()).len()
    }

    /// Strong handles to every live resource of kind `K`, in registration
    /// order.
    pub fn resources<K: ResourceKind + ?Sized>(&self) -> Vec<SharedHandle<K>> {
        K::collection(&self.registry.borrow()).live()
    }

    pub fn find<K: ResourceKind + ?Sized>(&self, id: ResourceId) -> Option<SharedHandle<K>> {
        K::collection(&self.registry.borrow()).get(id)
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.registry.borrow().contains(id)
    }

    pub fn updatable_len(&self) -> usize {
        self.registry.borrow().updatable_len()
    }

    /// Read access to the registry. Resources dropped while the guard is held
    /// stay listed until the next registration, removal or frame.
    pub fn registry(&self) -> Ref<'_, Registry> {
        self.registry.borrow()
    }

    pub fn reserved_uniform_buffers(&self) -> Option<SharedHandle<dyn ReservedUniformBuffers>> {
        self.reserved_uniform_buffers.borrow().clone()
    }

    pub fn debug_renderer(&self) -> Option<SharedHandle<dyn DebugRenderer>> {
        self.debug_renderer.borrow().clone()
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// The backend as its concrete type.
    pub fn backend_as<B: Backend>(&self) -> Option<&B> {
        let backend: &dyn Any = &*self.backend;
        backend.downcast_ref::<B>()
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn backend_name(&self) -> &'static str {
        self.name()
    }

    pub fn is_compatible(&self) -> bool {
        self.backend.is_compatible()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.deinit();

        let remaining = self.registry.borrow().len();
        if remaining > 0 {
            debug!("The {} renderer was dropped with {remaining} live resources", self.name());
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("backend", &self.name())
            .field("initialized", &self.initialized.get())
            .field("phase", &self.phase.get())
            .field("frame_index", &self.frame_index.get())
            .field("resources", &self.registry.borrow().len())
            .finish()
    }
}
