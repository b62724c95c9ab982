use crate::shared::SharedHandle;
use crate::weak::WeakHandle;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Handles that can be ordered by the control block they share.
pub trait OwnerIdentity {
    /// Address of the control block, `0` for an empty handle.
    fn owner_addr(&self) -> usize;
}

impl<T: ?Sized> OwnerIdentity for SharedHandle<T> {
    fn owner_addr(&self) -> usize {
        self.raw.owner_addr()
    }
}

impl<T: ?Sized> OwnerIdentity for WeakHandle<T> {
    fn owner_addr(&self) -> usize {
        WeakHandle::owner_addr(self)
    }
}

/// Compares, orders and hashes a handle by owner rather than by payload.
///
/// Aliases of one owner collapse into a single key, so this can index sets
/// and maps where every owner should appear once.
#[derive(Debug, Clone, Default)]
pub struct ByOwner<H>(pub H);

impl<H: OwnerIdentity> PartialEq for ByOwner<H> {
    fn eq(&self, other: &Self) -> bool {
        self.0.owner_addr() == other.0.owner_addr()
    }
}

impl<H: OwnerIdentity> Eq for ByOwner<H> {}

impl<H: OwnerIdentity> PartialOrd for ByOwner<H> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<H: OwnerIdentity> Ord for ByOwner<H> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.owner_addr().cmp(&other.0.owner_addr())
    }
}

impl<H: OwnerIdentity> Hash for ByOwner<H> {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.0.owner_addr().hash(state)
    }
}
