//! State shared by every GPU resource.
//!
//! A resource is registered with exactly one [`Renderer`](crate::Renderer) at
//! creation. The registration is an id plus a weak route to the renderer's
//! registry, never an ownership edge: dropping a resource removes it from a
//! live registry, dropping the renderer first leaves nothing to remove.

use crate::registry::{Registry, ResourceId};
use gp1_pointers::{SharedHandle, WeakHandle};
use gp1_utils::debug_panic;
use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use tracing::{trace, warn};

/// Access to the [`RendererData`] embedded in a resource.
///
/// Usually derived with `#[derive(HasRendererData)]`.
pub trait HasRendererData {
    fn renderer_data(&self) -> &RendererData;
}

/// A GPU resource that can take part in the per frame update sweep.
pub trait Resource: HasRendererData + Any {
    /// Reconciles client side state with the GPU. Only called for updatable
    /// resources, once per frame in [`Renderer::begin_frame`](crate::Renderer::begin_frame).
    fn update(&self) {}

    /// Whether [`Resource::update`] should be called every frame. Read once
    /// at registration.
    fn is_updatable(&self) -> bool {
        false
    }
}

pub(crate) struct Registration {
    pub(crate) id: ResourceId,
    pub(crate) registry: WeakHandle<RefCell<Registry>>,
}

impl Registration {
    /// Removes the resource from its registry, if the registry still exists.
    /// Gives the registration back if the registry is borrowed.
    pub(crate) fn release(self) -> Result<(), Self> {
        let Some(registry) = self.registry.lock() else {
            trace!(id = ?self.id, "Registry is gone, nothing to deregister");
            return Ok(());
        };
        let Ok(mut registry) = registry.try_borrow_mut() else {
            return Err(self);
        };
        registry.remove(self.id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RendererData {
    registration: RefCell<Option<Registration>>,
    this: RefCell<WeakHandle<dyn Resource>>,
    next: RefCell<Option<Box<dyn Any>>>,
}

impl RendererData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry id, `None` if the resource was never registered or was
    /// detached.
    pub fn id(&self) -> Option<ResourceId> {
        self.registration.borrow().as_ref().map(|r| r.id)
    }

    /// Whether the resource is registered with a renderer that still exists.
    pub fn is_registered(&self) -> bool {
        self.registration
            .borrow()
            .as_ref()
            .is_some_and(|r| !r.registry.expired())
    }

    /// A strong handle to the resource owning this data, while it is alive.
    pub fn this(&self) -> Option<SharedHandle<dyn Resource>> {
        self.this.borrow().lock()
    }

    /// Backend or user data stored in the extension slot, if it is a `T`.
    pub fn next<T: Any>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.next.borrow(), |next| next.as_ref()?.downcast_ref::<T>()).ok()
    }

    /// Replaces the extension slot, returning the previous value.
    pub fn set_next<T: Any>(&self, value: T) -> Option<Box<dyn Any>> {
        self.next.replace(Some(Box::new(value)))
    }

    pub fn take_next(&self) -> Option<Box<dyn Any>> {
        self.next.take()
    }

    pub(crate) fn attach(
        &self,
        id: ResourceId,
        registry: WeakHandle<RefCell<Registry>>,
        this: WeakHandle<dyn Resource>,
    ) {
        let previous = self
            .registration
            .replace(Some(Registration { id, registry }));
        if let Some(previous) = previous {
            debug_panic!("Resource {:?} was registered twice", previous.id);
            if let Err(previous) = previous.release() {
                warn!(id = ?previous.id, "Couldn't deregister the previous registration");
            }
        }
        *self.this.borrow_mut() = this;
    }

    pub(crate) fn detach(&self) -> Option<Registration> {
        self.registration.borrow_mut().take()
    }

    pub(crate) fn restore(&self, registration: Registration) {
        *self.registration.borrow_mut() = Some(registration);
    }
}

impl Drop for RendererData {
    fn drop(&mut self) {
        let Some(registration) = self.registration.get_mut().take() else {
            return;
        };
        // the registry prunes expired entries on its next mutation
        if let Err(registration) = registration.release() {
            trace!(id = ?registration.id, "Registry is borrowed, deferring deregistration");
        }
    }
}

impl fmt::Debug for RendererData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererData")
            .field("id", &self.id())
            .field("registered", &self.is_registered())
            .finish_non_exhaustive()
    }
}
