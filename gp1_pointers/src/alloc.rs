use std::alloc::Layout;
use std::ptr::NonNull;

/// Memory source for control blocks.
///
/// The allocator is moved into the block it allocated and is used again to
/// free that block once the last weak reference is gone.
///
/// # Safety
/// `allocate` must return memory that is valid for `layout`, and
/// `deallocate` must accept every pointer previously returned by `allocate`
/// on the same allocator (or a clone of it) with the same layout.
pub unsafe trait BlockAllocator: 'static {
    /// Returns `None` if the request cannot be satisfied.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must have been returned by [`BlockAllocator::allocate`] with the
    /// same `layout` and not been freed yet.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global allocator.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemAllocator;

unsafe impl BlockAllocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert_ne!(layout.size(), 0);
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// Allocates room for a `B` or aborts through [`std::alloc::handle_alloc_error`].
pub(crate) fn allocate_for<B, A: BlockAllocator>(alloc: &A) -> NonNull<B> {
    let layout = Layout::new::<B>();
    match alloc.allocate(layout) {
        Some(ptr) => ptr.cast(),
        None => std::alloc::handle_alloc_error(layout),
    }
}
