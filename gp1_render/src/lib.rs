//! Rendering frontend of the gp1 engine.
//!
//! A [`Renderer`] drives one graphics [`Backend`] and keeps a registry of
//! every resource that backend produced. Resources are owned through
//! [`SharedHandle`]s by whoever uses them; the registry only tracks them so
//! the renderer can update them once per frame and find them again by id.
//!
//! Backends are picked from a [`Renderers`] catalog:
//!
//! ```no_run
//! use gp1_render::{Camera, Renderers};
//! use gp1_utils::EngineArgs;
//!
//! let renderers = Renderers::builtin();
//! let renderer = renderers.select(EngineArgs::get())?;
//! renderer.init()?;
//!
//! let mesh = renderer.create_static_mesh();
//!
//! renderer.begin_frame();
//! renderer.render(&Camera::default(), &[]);
//! renderer.end_frame();
//! # drop(mesh);
//! # Ok::<(), gp1_render::RendererError>(())
//! ```

extern crate self as gp1_render;

mod backend;
mod camera;
mod data;
mod error;
mod registry;
mod renderer;
mod renderers;

pub mod apis;
pub mod resources;

pub use backend::{Backend, BackendError};
pub use camera::{Camera, Drawable};
pub use data::{HasRendererData, RendererData, Resource};
pub use error::{RendererError, Result};
pub use registry::{Collection, Registry, ResourceId, ResourceKind, ResourceType};
pub use renderer::{FramePhase, Renderer, RendererSettings};
pub use renderers::{BackendFactory, RendererEntry, Renderers};

pub use gp1_macros::HasRendererData;
pub use gp1_pointers::{SharedHandle, WeakHandle};

use static_assertions::assert_not_impl_any;

assert_not_impl_any!(Renderer: Send, Sync);
assert_not_impl_any!(RendererData: Send, Sync);
