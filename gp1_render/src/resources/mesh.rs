use crate::data::Resource;
use bytemuck::{Pod, Zeroable};
use delegate::delegate;
use static_assertions::const_assert_eq;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

const_assert_eq!(size_of::<Vertex>(), 32);

impl Vertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Client side geometry of a static mesh.
#[derive(Default)]
pub struct StaticMeshData {
    vertices: RefCell<Vec<Vertex>>,
    indices: RefCell<Vec<u32>>,
    dirty: Cell<bool>,
}

impl StaticMeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_vertices(&self, vertices: Vec<Vertex>) {
        *self.vertices.borrow_mut() = vertices;
        self.dirty.set(true);
    }

    pub fn set_indices(&self, indices: Vec<u32>) {
        *self.indices.borrow_mut() = indices;
        self.dirty.set(true);
    }

    pub fn set(&self, vertices: Vec<Vertex>, indices: Vec<u32>) {
        self.set_vertices(vertices);
        self.set_indices(indices);
    }

    pub fn vertices(&self) -> Ref<'_, [Vertex]> {
        Ref::map(self.vertices.borrow(), Vec::as_slice)
    }

    pub fn indices(&self) -> Ref<'_, [u32]> {
        Ref::map(self.indices.borrow(), Vec::as_slice)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.borrow().len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.borrow().len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn clear_dirty(&self) {
        self.dirty.set(false);
    }

    /// The first index pointing past the vertex list, if any.
    pub fn invalid_index(&self) -> Option<u32> {
        let count = self.vertex_count();
        self.indices
            .borrow()
            .iter()
            .copied()
            .find(|&index| index as usize >= count)
    }
}

impl fmt::Debug for StaticMeshData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticMeshData")
            .field("vertices", &self.vertex_count())
            .field("indices", &self.index_count())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}

pub trait StaticMesh: Resource {
    fn mesh(&self) -> &StaticMeshData;
}

impl dyn StaticMesh {
    delegate! {
        to self.mesh() {
            pub fn set(&self, vertices: Vec<Vertex>, indices: Vec<u32>);
            pub fn set_vertices(&self, vertices: Vec<Vertex>);
            pub fn set_indices(&self, indices: Vec<u32>);
            pub fn vertex_count(&self) -> usize;
            pub fn index_count(&self) -> usize;
            pub fn is_dirty(&self) -> bool;
        }
    }
}
