//! Graphics API backends, each behind its cargo feature.

#[cfg(feature = "opengl")]
pub mod opengl;
#[cfg(feature = "vulkan")]
pub mod vulkan;
