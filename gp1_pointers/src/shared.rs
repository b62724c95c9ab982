use crate::alloc::{BlockAllocator, SystemAllocator};
use crate::blocks::{BoxBlock, Deleter, DeleterBlock, InlineArrayBlock, InlineBlock};
use crate::control::ControlBlock;
use crate::weak::WeakHandle;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

/// Payload pointer plus the block governing its lifetime.
pub(crate) struct Raw<T: ?Sized> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) block: NonNull<ControlBlock>,
}

impl<T: ?Sized> Clone for Raw<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Raw<T> {}

impl<T: ?Sized> Raw<T> {
    /// Only valid while the owning handle keeps the block alive.
    pub(crate) fn header(&self) -> &ControlBlock {
        unsafe { self.block.as_ref() }
    }

    pub(crate) fn owner_addr(&self) -> usize {
        self.block.as_ptr().addr()
    }

    pub(crate) fn payload_addr(&self) -> usize {
        self.ptr.as_ptr().cast::<()>().addr()
    }
}

/// A strong, single-threaded reference to a shared payload.
///
/// Cloning a handle adds a strong reference, dropping one releases it. The
/// payload is destroyed when the last strong reference goes away, the control
/// block once the last weak reference is gone as well.
///
/// A handle may point at a different object than the one its control block
/// owns (see [`SharedHandle::map`]), which keeps the owning object alive
/// while exposing only a part or a different view of it.
///
/// Equality, ordering and hashing are based on the payload address. Use
/// [`SharedHandle::owner_eq`], [`SharedHandle::owner_before`] or
/// [`ByOwner`](crate::ByOwner) to compare by owner instead.
///
/// Like [`std::rc::Rc`], all functions besides trait impls are associated
/// functions, so they never shadow methods of the payload.
pub struct SharedHandle<T: ?Sized> {
    pub(crate) raw: Raw<T>,
    _owns: PhantomData<T>,
}

impl<T> SharedHandle<T> {
    /// Places `value` next to the reference counts in a single allocation.
    pub fn new(value: T) -> Self {
        Self::new_in(value, SystemAllocator)
    }

    /// Like [`SharedHandle::new`], with the block taken from `alloc`.
    pub fn new_in<A: BlockAllocator>(value: T, alloc: A) -> Self {
        let (block, ptr) = InlineBlock::create(value, alloc);
        unsafe { Self::from_parts(ptr, block) }
    }
}

impl<T, const N: usize> SharedHandle<[T; N]> {
    /// Builds an inline array by calling `init` with every index in order.
    ///
    /// If `init` panics, the elements built so far are dropped and the block
    /// is freed. Elements are destroyed in reverse order.
    pub fn new_array(init: impl FnMut(usize) -> T) -> Self {
        Self::new_array_in(SystemAllocator, init)
    }

    pub fn new_array_in<A: BlockAllocator>(alloc: A, init: impl FnMut(usize) -> T) -> Self {
        let (block, ptr) = InlineArrayBlock::<T, N, A>::create(alloc, init);
        unsafe { Self::from_parts(ptr, block) }
    }

    /// The same array as an unsized slice handle.
    pub fn into_slice(this: Self) -> SharedHandle<[T]> {
        let raw = this.raw;
        mem::forget(this);
        let ptr = NonNull::slice_from_raw_parts(raw.ptr.cast::<T>(), N);
        unsafe { SharedHandle::from_parts(ptr, raw.block) }
    }
}

impl<T: ?Sized> SharedHandle<T> {
    /// Takes ownership of a boxed payload, which is dropped normally.
    pub fn from_box(payload: Box<T>) -> Self {
        let (block, ptr) = BoxBlock::create(payload);
        unsafe { Self::from_parts(ptr, block) }
    }

    /// Takes ownership of a boxed payload, which is handed to `deleter`
    /// instead of being dropped.
    pub fn from_box_with_deleter<D>(payload: Box<T>, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        Self::from_box_with_deleter_in(payload, deleter, SystemAllocator)
    }

    /// Like [`SharedHandle::from_box_with_deleter`], with the control block
    /// taken from `alloc`.
    pub fn from_box_with_deleter_in<D, A>(payload: Box<T>, deleter: D, alloc: A) -> Self
    where
        D: Deleter<T> + 'static,
        A: BlockAllocator,
    {
        let (block, ptr) = DeleterBlock::create(payload, deleter, alloc);
        unsafe { Self::from_parts(ptr, block) }
    }

    /// Adopts an already counted strong reference.
    unsafe fn from_parts(ptr: NonNull<T>, block: NonNull<ControlBlock>) -> Self {
        unsafe { Self::from_raw(Raw { ptr, block }) }
    }

    pub(crate) unsafe fn from_raw(raw: Raw<T>) -> Self {
        Self {
            raw,
            _owns: PhantomData,
        }
    }

    pub fn strong_count(this: &Self) -> usize {
        this.raw.header().strong_count()
    }

    /// Number of [`WeakHandle`]s pointing at the same block.
    pub fn weak_count(this: &Self) -> usize {
        this.raw.header().weak_count() - 1
    }

    /// Whether this is the only strong reference.
    pub fn is_unique(this: &Self) -> bool {
        Self::strong_count(this) == 1
    }

    /// Mutable access if no other strong or weak reference exists.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let header = this.raw.header();
        if header.strong_count() == 1 && header.weak_count() == 1 {
            Some(unsafe { this.raw.ptr.as_mut() })
        } else {
            None
        }
    }

    pub fn downgrade(this: &Self) -> WeakHandle<T> {
        WeakHandle::from_raw(this.raw)
    }

    pub fn as_ptr(this: &Self) -> *const T {
        this.raw.ptr.as_ptr()
    }

    /// The counts shared by every handle of this owner.
    pub fn control_block(this: &Self) -> &ControlBlock {
        this.raw.header()
    }

    /// Whether both handles point at the same payload address.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.payload_addr() == other.raw.payload_addr()
    }

    /// Whether both handles share a control block, regardless of what they
    /// point at.
    pub fn owner_eq<U: ?Sized>(this: &Self, other: &SharedHandle<U>) -> bool {
        this.raw.owner_addr() == other.raw.owner_addr()
    }

    /// Total order over owners, aliases of one owner are equivalent.
    pub fn owner_before<U: ?Sized>(this: &Self, other: &SharedHandle<U>) -> bool {
        this.raw.owner_addr() < other.raw.owner_addr()
    }

    /// A new strong reference to this owner that points at `ptr`.
    ///
    /// # Safety
    /// `ptr` must stay valid for as long as the payload of this owner is
    /// alive, usually because it points into that payload.
    pub unsafe fn alias<U: ?Sized>(this: &Self, ptr: NonNull<U>) -> SharedHandle<U> {
        this.raw.header().increment_strong();
        unsafe { SharedHandle::from_parts(ptr, this.raw.block) }
    }

    /// Projects to a part or a different view of the payload, sharing the
    /// owner. Upcasting to a trait object is written as
    /// `SharedHandle::map(&h, |v| v as &(dyn Trait + 'static))`.
    ///
    /// The payload must not borrow anything, otherwise the projection could
    /// hand out data that dies before the owner:
    ///
    /// ```compile_fail
    /// use gp1_pointers::SharedHandle;
    ///
    /// fn escape() -> SharedHandle<str> {
    ///     let text = String::from("local");
    ///     let owner = SharedHandle::new(text.as_str());
    ///     SharedHandle::map(&owner, |s| *s)
    /// }
    /// ```
    pub fn map<U: ?Sized>(this: &Self, f: impl FnOnce(&T) -> &U) -> SharedHandle<U>
    where
        T: 'static,
    {
        let target = NonNull::from(f(&**this));
        unsafe { Self::alias(this, target) }
    }

    /// Like [`SharedHandle::map`], `None` if the projection fails.
    ///
    /// ```compile_fail
    /// use gp1_pointers::SharedHandle;
    ///
    /// fn escape() -> Option<SharedHandle<str>> {
    ///     let text = String::from("local");
    ///     let owner = SharedHandle::new(text.as_str());
    ///     SharedHandle::try_map(&owner, |s| Some(*s))
    /// }
    /// ```
    pub fn try_map<U: ?Sized>(
        this: &Self,
        f: impl FnOnce(&T) -> Option<&U>,
    ) -> Option<SharedHandle<U>>
    where
        T: 'static,
    {
        let target = NonNull::from(f(&**this)?);
        Some(unsafe { Self::alias(this, target) })
    }

    /// Reinterprets the payload as a `U`.
    ///
    /// # Safety
    /// The payload must be a valid `U` at the same address.
    pub unsafe fn cast_unchecked<U>(this: &Self) -> SharedHandle<U> {
        unsafe { Self::alias(this, this.raw.ptr.cast::<U>()) }
    }

    /// The deleter given at construction, if it is a `D`.
    pub fn get_deleter<D: Any>(this: &Self) -> Option<&D> {
        unsafe { ControlBlock::deleter(this.raw.block) }?.downcast_ref::<D>()
    }
}

impl SharedHandle<dyn Any> {
    /// Recovers the concrete type, giving the handle back on a mismatch.
    pub fn downcast<U: Any>(self) -> Result<SharedHandle<U>, Self> {
        if !(*self).is::<U>() {
            return Err(self);
        }
        let raw = self.raw;
        mem::forget(self);
        Ok(unsafe { SharedHandle::from_parts(raw.ptr.cast::<U>(), raw.block) })
    }
}

impl<T> FromIterator<T> for SharedHandle<[T]> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_box(iter.into_iter().collect())
    }
}

impl<T: ?Sized> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        let block = self.raw.block;
        unsafe {
            if block.as_ref().decrement_strong() {
                ControlBlock::destroy_payload(block);
                if block.as_ref().decrement_weak() {
                    ControlBlock::destroy_self(block);
                }
            }
        }
    }
}

impl<T: ?Sized> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        self.raw.header().increment_strong();
        unsafe { Self::from_raw(self.raw) }
    }
}

impl<T: ?Sized> Deref for SharedHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.raw.ptr.as_ref() }
    }
}

impl<T: ?Sized> AsRef<T> for SharedHandle<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T> From<T> for SharedHandle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized> From<Box<T>> for SharedHandle<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: Default> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> PartialEq for SharedHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Eq for SharedHandle<T> {}

impl<T: ?Sized> PartialOrd for SharedHandle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for SharedHandle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.payload_addr().cmp(&other.raw.payload_addr())
    }
}

impl<T: ?Sized> Hash for SharedHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.payload_addr().hash(state)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: ?Sized> fmt::Pointer for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&ptr::from_ref::<T>(&**self), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Tracked(Rc<Cell<u32>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn counts_follow_clones() {
        let a = SharedHandle::new(5u32);
        assert_eq!(SharedHandle::strong_count(&a), 1);
        assert_eq!(SharedHandle::weak_count(&a), 0);

        let b = a.clone();
        let w = SharedHandle::downgrade(&a);
        assert_eq!(SharedHandle::strong_count(&b), 2);
        assert_eq!(SharedHandle::weak_count(&b), 1);
        assert!(!SharedHandle::is_unique(&a));

        drop(b);
        assert!(SharedHandle::is_unique(&a));
        drop(w);
        assert_eq!(SharedHandle::weak_count(&a), 0);
    }

    #[test]
    fn get_mut_requires_sole_ownership() {
        let mut a = SharedHandle::new(String::from("gp1"));
        SharedHandle::get_mut(&mut a).unwrap().push('!');
        assert_eq!(&*a, "gp1!");

        let w = SharedHandle::downgrade(&a);
        assert!(SharedHandle::get_mut(&mut a).is_none());
        drop(w);
        assert!(SharedHandle::get_mut(&mut a).is_some());
    }

    #[test]
    fn assignment_releases_previous_payload() {
        let drops = Rc::new(Cell::new(0));
        let mut a = SharedHandle::new(Tracked(drops.clone()));
        let b = SharedHandle::new(Tracked(drops.clone()));

        a = b.clone();
        assert_eq!(drops.get(), 1);
        assert!(SharedHandle::ptr_eq(&a, &b));

        drop(a);
        drop(b);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn pointer_formatting_matches_payload() {
        let a = SharedHandle::new(1u8);
        assert_eq!(format!("{a:p}"), format!("{:p}", SharedHandle::as_ptr(&a)));
        assert_eq!(format!("{a:?}"), "1");
    }
}
