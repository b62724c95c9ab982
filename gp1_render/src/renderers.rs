//! The catalog of backends a renderer can be created with.
//!
//! Entries are tried by descending priority. A catalog keeps at most one
//! live renderer per entry, cached weakly: the caller owns the renderer and
//! the next lookup after it was dropped creates a fresh one.

use crate::backend::Backend;
use crate::error::{IncompatibleRendererErr, NoCompatibleRendererErr, Result, UnknownRendererErr};
use crate::renderer::Renderer;
use bon::Builder;
use gp1_pointers::{SharedHandle, WeakHandle};
use gp1_utils::EngineArgs;
use itertools::Itertools;
use snafu::{OptionExt, ensure};
use std::cell::RefCell;
use std::cmp::Reverse;
use std::fmt;
use tracing::{debug, info, trace};

pub type BackendFactory = Box<dyn Fn() -> Box<dyn Backend>>;

#[derive(Builder)]
pub struct RendererEntry {
    #[builder(into)]
    name: String,
    #[builder(default)]
    priority: u32,
    factory: BackendFactory,
    #[builder(skip)]
    cached: RefCell<WeakHandle<Renderer>>,
}

impl RendererEntry {
    pub fn new<B: Backend>(name: impl Into<String>, priority: u32, factory: impl Fn() -> B + 'static) -> Self {
        RendererEntry::builder()
            .name(name)
            .priority(priority)
            .factory(Box::new(move || Box::new(factory()) as Box<dyn Backend>))
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// The cached renderer while it is alive.
    pub fn cached(&self) -> Option<SharedHandle<Renderer>> {
        self.cached.borrow().lock()
    }

    /// The cached renderer, or a new one if the backend is compatible.
    fn instantiate(&self) -> Option<SharedHandle<Renderer>> {
        if let Some(renderer) = self.cached() {
            return Some(renderer);
        }

        let renderer = Renderer::new((self.factory)());
        if !renderer.is_compatible() {
            debug!("The {} renderer is not compatible with this system", self.name);
            return None;
        }

        let renderer = SharedHandle::new(renderer);
        *self.cached.borrow_mut() = SharedHandle::downgrade(&renderer);
        trace!("Created the {} renderer", self.name);
        Some(renderer)
    }
}

impl fmt::Debug for RendererEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("alive", &!self.cached.borrow().expired())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct Renderers {
    entries: Vec<RendererEntry>,
}

thread_local! {
    static INSTALLED: RefCell<Option<SharedHandle<Renderers>>> = const { RefCell::new(None) };
}

impl Renderers {
    pub fn new(entries: impl IntoIterator<Item = RendererEntry>) -> Self {
        let mut renderers = Self::default();
        for entry in entries {
            renderers.register(entry);
        }
        renderers
    }

    /// Every backend compiled into this build.
    pub fn builtin() -> Self {
        #[allow(unused_mut)]
        let mut renderers = Self::default();

        #[cfg(feature = "opengl")]
        renderers.register(RendererEntry::new("opengl", 0, crate::apis::opengl::GlBackend::new));
        #[cfg(feature = "vulkan")]
        renderers.register(RendererEntry::new("vulkan", 1, crate::apis::vulkan::VulkanBackend::new));

        renderers
    }

    /// Adds `entry`, replacing an entry with the same name.
    pub fn register(&mut self, entry: RendererEntry) {
        match self.entries.iter_mut().find(|existing| existing.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(RendererEntry::name).collect()
    }

    pub fn entries(&self) -> &[RendererEntry] {
        &self.entries
    }

    /// The renderer registered as `name`, if its backend is compatible.
    pub fn get_renderer(&self, name: &str) -> Option<SharedHandle<Renderer>> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)?
            .instantiate()
    }

    /// The highest priority compatible renderer. Ties go to the entry
    /// registered first.
    pub fn get_best_renderer(&self) -> Option<SharedHandle<Renderer>> {
        self.entries
            .iter()
            .sorted_by_key(|entry| Reverse(entry.priority))
            .find_map(RendererEntry::instantiate)
    }

    /// The entry name `renderer` is cached under.
    pub fn get_name(&self, renderer: &SharedHandle<Renderer>) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .cached()
                    .is_some_and(|cached| SharedHandle::ptr_eq(&cached, renderer))
            })
            .map(RendererEntry::name)
    }

    /// Forgets the cached instance of `renderer`. It stays alive as long as
    /// handles to it exist, but lookups create a new one.
    pub fn destroy_renderer(&self, renderer: &SharedHandle<Renderer>) -> bool {
        let Some(entry) = self.entries.iter().find(|entry| {
            entry
                .cached()
                .is_some_and(|cached| SharedHandle::ptr_eq(&cached, renderer))
        }) else {
            return false;
        };
        entry.cached.borrow_mut().reset();
        true
    }

    /// Picks the renderer requested with `--renderer`, or the best one.
    pub fn select(&self, args: &EngineArgs) -> Result<SharedHandle<Renderer>> {
        let Some(name) = args.forced_renderer() else {
            let renderer = self.get_best_renderer().context(NoCompatibleRendererErr)?;
            info!("Selected the {} renderer", renderer.name());
            return Ok(renderer);
        };

        ensure!(
            self.entries.iter().any(|entry| entry.name == name),
            UnknownRendererErr {
                name,
                available: self.names().into_iter().map(str::to_owned).collect::<Vec<_>>(),
            }
        );
        let renderer = self
            .get_renderer(name)
            .context(IncompatibleRendererErr { name })?;
        info!("Selected the {name} renderer as requested");
        Ok(renderer)
    }

    /// Makes this catalog the one [`Renderers::installed`] returns on this
    /// thread. Returns the previously installed catalog.
    pub fn install(self) -> Option<SharedHandle<Renderers>> {
        INSTALLED.with(|installed| installed.replace(Some(SharedHandle::new(self))))
    }

    pub fn installed() -> Option<SharedHandle<Renderers>> {
        INSTALLED.with(|installed| installed.borrow().clone())
    }

    pub fn uninstall() -> Option<SharedHandle<Renderers>> {
        INSTALLED.with(RefCell::take)
    }

    /// Runs `f` with the installed catalog, if there is one.
    pub fn with_installed<R>(f: impl FnOnce(&Renderers) -> R) -> Option<R> {
        let renderers = Self::installed()?;
        Some(f(&renderers))
    }
}
