//! Bookkeeping of every resource a renderer created.
//!
//! The registry only ever holds weak references. Ownership of a resource
//! belongs to whoever holds a strong handle to it.

use crate::backend::Backend;
use crate::data::Resource;
use crate::resources::{
    Material, ShaderProgram, StaticMesh, Texture2D, Texture2DArray, Texture3D, TextureCubeMap,
    Uniform, UniformBuffer, UniformType,
};
use gp1_pointers::{SharedHandle, WeakHandle};
use slotmap::{SlotMap, new_key_type};
use std::fmt;
use tracing::trace;

new_key_type! {
    /// Identity of a registered resource, stable for its whole registration.
    pub struct ResourceId;
}

/// A kind of resource tracked in its own collection.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceType {
    StaticMesh,
    Material,
    Uniform,
    UniformBuffer,
    ShaderProgram,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCubeMap,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::StaticMesh => "static mesh",
            ResourceType::Material => "material",
            ResourceType::Uniform => "uniform",
            ResourceType::UniformBuffer => "uniform buffer",
            ResourceType::ShaderProgram => "shader program",
            ResourceType::Texture2D => "2d texture",
            ResourceType::Texture2DArray => "2d texture array",
            ResourceType::Texture3D => "3d texture",
            ResourceType::TextureCubeMap => "cube map",
        };
        f.write_str(name)
    }
}

/// Ties a resource trait object to its backend hook and its collection.
pub trait ResourceKind: 'static {
    /// What the backend hook needs besides the backend itself.
    type Args;

    const TYPE: ResourceType;

    fn produce(backend: &dyn Backend, args: Self::Args) -> Option<SharedHandle<Self>>;

    fn as_resource(&self) -> &(dyn Resource + 'static);

    fn collection(registry: &Registry) -> &Collection<Self>;

    fn collection_mut(registry: &mut Registry) -> &mut Collection<Self>;
}

/// Registered resources of one kind, in registration order.
pub struct Collection<K: ?Sized> {
    entries: Vec<(ResourceId, WeakHandle<K>)>,
}

impl<K: ?Sized> Default for Collection<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: ?Sized> Collection<K> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Strong handles to every entry that is still alive.
    pub fn live(&self) -> Vec<SharedHandle<K>> {
        self.entries.iter().filter_map(|(_, weak)| weak.lock()).collect()
    }

    pub fn get(&self, id: ResourceId) -> Option<SharedHandle<K>> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .and_then(|(_, weak)| weak.lock())
    }

    fn push(&mut self, id: ResourceId, resource: WeakHandle<K>) {
        self.entries.push((id, resource));
    }

    fn remove(&mut self, id: ResourceId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        before != self.entries.len()
    }

    /// Drops entries whose resource is gone and returns their ids.
    fn take_expired(&mut self) -> Vec<ResourceId> {
        let mut expired = Vec::new();
        self.entries.retain(|(id, weak)| {
            let alive = !weak.expired();
            if !alive {
                expired.push(*id);
            }
            alive
        });
        expired
    }
}

#[derive(Default)]
pub struct Registry {
    ids: SlotMap<ResourceId, ResourceType>,

    pub static_meshes: Collection<dyn StaticMesh>,
    pub materials: Collection<dyn Material>,
    pub uniforms: Collection<dyn Uniform>,
    pub uniform_buffers: Collection<dyn UniformBuffer>,
    pub shader_programs: Collection<dyn ShaderProgram>,
    pub texture_2ds: Collection<dyn Texture2D>,
    pub texture_2d_arrays: Collection<dyn Texture2DArray>,
    pub texture_3ds: Collection<dyn Texture3D>,
    pub texture_cube_maps: Collection<dyn TextureCubeMap>,

    updatable: Vec<(ResourceId, WeakHandle<dyn Resource>)>,
}

impl Registry {
    /// Number of registered resources over all kinds.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn resource_type(&self, id: ResourceId) -> Option<ResourceType> {
        self.ids.get(id).copied()
    }

    pub fn updatable_len(&self) -> usize {
        self.updatable.len()
    }

    /// Live updatable resources in registration order.
    pub fn updatable(&self) -> Vec<SharedHandle<dyn Resource>> {
        self.updatable
            .iter()
            .filter_map(|(_, weak)| weak.lock())
            .collect()
    }

    pub(crate) fn insert<K: ResourceKind + ?Sized>(
        &mut self,
        resource: &SharedHandle<K>,
        as_resource: &SharedHandle<dyn Resource>,
    ) -> ResourceId {
        self.prune();
        let id = self.ids.insert(K::TYPE);
        K::collection_mut(self).push(id, SharedHandle::downgrade(resource));
        if as_resource.is_updatable() {
            self.updatable
                .push((id, SharedHandle::downgrade(as_resource)));
        }
        id
    }

    /// Forgets a resource. Removing an unknown id does nothing.
    pub(crate) fn remove(&mut self, id: ResourceId) -> bool {
        self.prune();
        let Some(ty) = self.ids.remove(id) else {
            return false;
        };

        let removed = match ty {
            ResourceType::StaticMesh => self.static_meshes.remove(id),
            ResourceType::Material => self.materials.remove(id),
            ResourceType::Uniform => self.uniforms.remove(id),
            ResourceType::UniformBuffer => self.uniform_buffers.remove(id),
            ResourceType::ShaderProgram => self.shader_programs.remove(id),
            ResourceType::Texture2D => self.texture_2ds.remove(id),
            ResourceType::Texture2DArray => self.texture_2d_arrays.remove(id),
            ResourceType::Texture3D => self.texture_3ds.remove(id),
            ResourceType::TextureCubeMap => self.texture_cube_maps.remove(id),
        };
        debug_assert!(removed, "{ty} {id:?} was missing from its collection");

        self.updatable.retain(|(entry, _)| *entry != id);
        true
    }

    /// Forgets resources that were dropped while the registry was borrowed.
    /// Returns how many were pruned.
    pub(crate) fn prune(&mut self) -> usize {
        let expired: Vec<ResourceId> = [
            self.static_meshes.take_expired(),
            self.materials.take_expired(),
            self.uniforms.take_expired(),
            self.uniform_buffers.take_expired(),
            self.shader_programs.take_expired(),
            self.texture_2ds.take_expired(),
            self.texture_2d_arrays.take_expired(),
            self.texture_3ds.take_expired(),
            self.texture_cube_maps.take_expired(),
        ]
        .concat();
        if expired.is_empty() {
            return 0;
        }

        for id in &expired {
            self.ids.remove(*id);
        }
        self.updatable.retain(|(id, _)| !expired.contains(id));
        trace!(count = expired.len(), "Pruned resources released during a borrow");
        expired.len()
    }
}

macro_rules! resource_kind {
    ($kind:ident, $field:ident, $args:ty, |$backend:ident, $arg:pat_param| $produce:expr) => {
        impl ResourceKind for dyn $kind {
            type Args = $args;

            const TYPE: ResourceType = ResourceType::$kind;

            fn produce($backend: &dyn Backend, $arg: Self::Args) -> Option<SharedHandle<Self>> {
                $produce
            }

            fn as_resource(&self) -> &(dyn Resource + 'static) {
                self
            }

            fn collection(registry: &Registry) -> &Collection<Self> {
                &registry.$field
            }

            fn collection_mut(registry: &mut Registry) -> &mut Collection<Self> {
                &mut registry.$field
            }
        }
    };
}

resource_kind!(StaticMesh, static_meshes, (), |backend, ()| backend.create_static_mesh());
resource_kind!(Material, materials, (), |backend, ()| backend.create_material());
resource_kind!(Uniform, uniforms, UniformType, |backend, ty| backend.create_uniform(ty));
resource_kind!(UniformBuffer, uniform_buffers, (), |backend, ()| backend.create_uniform_buffer());
resource_kind!(ShaderProgram, shader_programs, (), |backend, ()| backend.create_shader_program());
resource_kind!(Texture2D, texture_2ds, (), |backend, ()| backend.create_texture_2d());
resource_kind!(Texture2DArray, texture_2d_arrays, (), |backend, ()| backend.create_texture_2d_array());
resource_kind!(Texture3D, texture_3ds, (), |backend, ()| backend.create_texture_3d());
resource_kind!(TextureCubeMap, texture_cube_maps, (), |backend, ()| backend.create_texture_cube_map());
