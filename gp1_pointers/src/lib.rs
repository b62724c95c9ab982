//! Shared ownership for the gp1 engine.
//!
//! [`SharedHandle`] and [`WeakHandle`] split the lifetime of a payload from
//! the lifetime of its bookkeeping, the [`ControlBlock`]. On top of what
//! [`std::rc::Rc`] offers, handles can alias a part of their owner, carry a
//! custom [`Deleter`], allocate their block from a [`BlockAllocator`] and be
//! ordered by owner through [`ByOwner`].
//!
//! Reference counts are plain cells. Handles are neither `Send` nor `Sync`.

mod alloc;
mod blocks;
mod control;
mod owner;
mod shared;
mod weak;

pub use alloc::{BlockAllocator, SystemAllocator};
pub use blocks::Deleter;
pub use control::ControlBlock;
pub use owner::{ByOwner, OwnerIdentity};
pub use shared::SharedHandle;
pub use weak::WeakHandle;

use static_assertions::{assert_eq_size, assert_not_impl_any};

assert_eq_size!(SharedHandle<u64>, [usize; 2]);
assert_eq_size!(Option<SharedHandle<u64>>, SharedHandle<u64>);
assert_eq_size!(WeakHandle<u64>, [usize; 2]);
assert_not_impl_any!(SharedHandle<u64>: Send, Sync);
assert_not_impl_any!(WeakHandle<u64>: Send, Sync);
