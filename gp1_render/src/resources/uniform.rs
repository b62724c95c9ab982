//! Typed shader uniforms.
//!
//! A uniform carries a runtime [`UniformType`] tag and a [`UniformCell`]
//! holding the matching Rust value. Typed access goes through
//! `<dyn Uniform>::typed`, which checks the tag instead of trusting the
//! caller.

use crate::data::Resource;
use crate::resources::{Texture2D, Texture2DArray, Texture3D, TextureCubeMap};
use delegate::delegate;
use gp1_pointers::SharedHandle;
use nalgebra::{Matrix2, Matrix3, Matrix4, SMatrix, Vector2, Vector3, Vector4};
use num_enum::TryFromPrimitive;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;

#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive)]
pub enum UniformType {
    Float,
    FVec2,
    FVec3,
    FVec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    UVec2,
    UVec3,
    UVec4,
    FMat2,
    FMat3,
    FMat4,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCubeMap,
}

impl UniformType {
    pub const ALL: [UniformType; 19] = [
        UniformType::Float,
        UniformType::FVec2,
        UniformType::FVec3,
        UniformType::FVec4,
        UniformType::Int,
        UniformType::IVec2,
        UniformType::IVec3,
        UniformType::IVec4,
        UniformType::UInt,
        UniformType::UVec2,
        UniformType::UVec3,
        UniformType::UVec4,
        UniformType::FMat2,
        UniformType::FMat3,
        UniformType::FMat4,
        UniformType::Texture2D,
        UniformType::Texture2DArray,
        UniformType::Texture3D,
        UniformType::TextureCubeMap,
    ];

    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            UniformType::Texture2D
                | UniformType::Texture2DArray
                | UniformType::Texture3D
                | UniformType::TextureCubeMap
        )
    }

    /// `(alignment, size)` in bytes inside a std140 block. Samplers do not
    /// live in blocks.
    pub fn std140(self) -> Option<(usize, usize)> {
        use UniformType::*;
        Some(match self {
            Float | Int | UInt => (4, 4),
            FVec2 | IVec2 | UVec2 => (8, 8),
            FVec3 | IVec3 | UVec3 => (16, 12),
            FVec4 | IVec4 | UVec4 => (16, 16),
            FMat2 => (16, 32),
            FMat3 => (16, 48),
            FMat4 => (16, 64),
            Texture2D | Texture2DArray | Texture3D | TextureCubeMap => return None,
        })
    }

    /// Calls `factory` with the Rust value type matching this tag.
    pub fn dispatch<F: UniformFactory>(self, factory: &F) -> Option<SharedHandle<dyn Uniform>> {
        match self {
            UniformType::Float => factory.make::<f32>(),
            UniformType::FVec2 => factory.make::<Vector2<f32>>(),
            UniformType::FVec3 => factory.make::<Vector3<f32>>(),
            UniformType::FVec4 => factory.make::<Vector4<f32>>(),
            UniformType::Int => factory.make::<i32>(),
            UniformType::IVec2 => factory.make::<Vector2<i32>>(),
            UniformType::IVec3 => factory.make::<Vector3<i32>>(),
            UniformType::IVec4 => factory.make::<Vector4<i32>>(),
            UniformType::UInt => factory.make::<u32>(),
            UniformType::UVec2 => factory.make::<Vector2<u32>>(),
            UniformType::UVec3 => factory.make::<Vector3<u32>>(),
            UniformType::UVec4 => factory.make::<Vector4<u32>>(),
            UniformType::FMat2 => factory.make::<Matrix2<f32>>(),
            UniformType::FMat3 => factory.make::<Matrix3<f32>>(),
            UniformType::FMat4 => factory.make::<Matrix4<f32>>(),
            UniformType::Texture2D => factory.make::<Sampler<dyn Texture2D>>(),
            UniformType::Texture2DArray => factory.make::<Sampler<dyn Texture2DArray>>(),
            UniformType::Texture3D => factory.make::<Sampler<dyn Texture3D>>(),
            UniformType::TextureCubeMap => factory.make::<Sampler<dyn TextureCubeMap>>(),
        }
    }
}

/// Builds a backend uniform for a statically known value type.
pub trait UniformFactory {
    fn make<V: UniformValue>(&self) -> Option<SharedHandle<dyn Uniform>>;
}

/// A Rust type a uniform can hold.
pub trait UniformValue: Default + Clone + 'static {
    const TYPE: UniformType;

    /// The value as laid out in a std140 block, `None` for samplers.
    fn std140_bytes(&self) -> Option<Vec<u8>>;
}

macro_rules! plain_uniform_value {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl UniformValue for $ty {
                const TYPE: UniformType = UniformType::$tag;

                fn std140_bytes(&self) -> Option<Vec<u8>> {
                    Some(bytemuck::cast_slice(self.as_slice()).to_vec())
                }
            }
        )*
    };
}

macro_rules! scalar_uniform_value {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl UniformValue for $ty {
                const TYPE: UniformType = UniformType::$tag;

                fn std140_bytes(&self) -> Option<Vec<u8>> {
                    Some(bytemuck::bytes_of(self).to_vec())
                }
            }
        )*
    };
}

scalar_uniform_value!(f32 => Float, i32 => Int, u32 => UInt);

plain_uniform_value!(
    Vector2<f32> => FVec2,
    Vector3<f32> => FVec3,
    Vector4<f32> => FVec4,
    Vector2<i32> => IVec2,
    Vector3<i32> => IVec3,
    Vector4<i32> => IVec4,
    Vector2<u32> => UVec2,
    Vector3<u32> => UVec3,
    Vector4<u32> => UVec4,
    Matrix4<f32> => FMat4,
);

/// Columns padded to four floats each.
fn padded_columns<const R: usize, const C: usize>(matrix: &SMatrix<f32, R, C>) -> Vec<u8> {
    let mut out = Vec::with_capacity(C * 16);
    for column in matrix.column_iter() {
        let mut padded = [0.0f32; 4];
        for (slot, value) in padded.iter_mut().zip(column.iter()) {
            *slot = *value;
        }
        out.extend_from_slice(bytemuck::cast_slice(&padded));
    }
    out
}

impl UniformValue for Matrix2<f32> {
    const TYPE: UniformType = UniformType::FMat2;

    fn std140_bytes(&self) -> Option<Vec<u8>> {
        Some(padded_columns(self))
    }
}

impl UniformValue for Matrix3<f32> {
    const TYPE: UniformType = UniformType::FMat3;

    fn std140_bytes(&self) -> Option<Vec<u8>> {
        Some(padded_columns(self))
    }
}

/// The texture bound to a sampler uniform.
pub struct Sampler<T: ?Sized>(pub Option<SharedHandle<T>>);

impl<T: ?Sized> Default for Sampler<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: ?Sized> Clone for Sampler<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> fmt::Debug for Sampler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(texture) => write!(f, "Sampler({:p})", SharedHandle::as_ptr(texture)),
            None => f.write_str("Sampler(None)"),
        }
    }
}

macro_rules! sampler_uniform_value {
    ($($kind:ident),* $(,)?) => {
        $(
            impl UniformValue for Sampler<dyn $kind> {
                const TYPE: UniformType = UniformType::$kind;

                fn std140_bytes(&self) -> Option<Vec<u8>> {
                    None
                }
            }
        )*
    };
}

sampler_uniform_value!(Texture2D, Texture2DArray, Texture3D, TextureCubeMap);

/// Type erased view of a [`UniformCell`].
pub trait UniformStorage: Any {
    fn uniform_type(&self) -> UniformType;

    fn is_dirty(&self) -> bool;

    fn clear_dirty(&self);

    fn std140_bytes(&self) -> Option<Vec<u8>>;
}

/// The value of a uniform plus whether it changed since the last upload.
pub struct UniformCell<V> {
    value: RefCell<V>,
    dirty: Cell<bool>,
}

impl<V: UniformValue> Default for UniformCell<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V: UniformValue> UniformCell<V> {
    /// New cells start dirty so the first update uploads them.
    pub fn new(value: V) -> Self {
        Self {
            value: RefCell::new(value),
            dirty: Cell::new(true),
        }
    }

    pub fn get(&self) -> V {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: V) {
        *self.value.borrow_mut() = value;
        self.dirty.set(true);
    }

    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.value.borrow())
    }
}

impl<V: UniformValue> UniformStorage for UniformCell<V> {
    fn uniform_type(&self) -> UniformType {
        V::TYPE
    }

    fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn clear_dirty(&self) {
        self.dirty.set(false);
    }

    fn std140_bytes(&self) -> Option<Vec<u8>> {
        self.value.borrow().std140_bytes()
    }
}

impl<V: UniformValue + fmt::Debug> fmt::Debug for UniformCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformCell")
            .field("value", &*self.value.borrow())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}

pub trait Uniform: Resource {
    fn storage(&self) -> &dyn UniformStorage;
}

impl dyn Uniform {
    delegate! {
        to self.storage() {
            pub fn uniform_type(&self) -> UniformType;
            pub fn is_dirty(&self) -> bool;
            pub fn clear_dirty(&self);
            pub fn std140_bytes(&self) -> Option<Vec<u8>>;
        }
    }

    /// The typed value cell, `None` if this uniform holds another type.
    pub fn typed<V: UniformValue>(&self) -> Option<&UniformCell<V>> {
        let storage: &dyn Any = self.storage();
        storage.downcast_ref::<UniformCell<V>>()
    }
}
