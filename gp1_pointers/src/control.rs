//! The reference counting header shared by every handle pointing at one payload.
//!
//! A control block starts with one strong and one weak reference. The weak
//! reference is the implicit one held by the strong family as a whole, it is
//! only released after the payload was destroyed. This guarantees that the
//! block outlives its payload and is freed exactly once.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

/// Type erased destruction strategy of one concrete block layout.
pub(crate) struct BlockVTable {
    pub(crate) destroy_payload: unsafe fn(NonNull<ControlBlock>),
    pub(crate) destroy_self: unsafe fn(NonNull<ControlBlock>),
    pub(crate) deleter: unsafe fn(NonNull<ControlBlock>) -> Option<NonNull<dyn Any>>,
}

/// Strong and weak counts of a shared payload.
///
/// Every concrete block layout embeds this as its first field, so a pointer
/// to the concrete block is a valid pointer to its header.
#[repr(C)]
pub struct ControlBlock {
    strong: Cell<usize>,
    weak: Cell<usize>,
    payload_alive: Cell<bool>,
    vtable: &'static BlockVTable,
}

impl ControlBlock {
    pub(crate) const fn new(vtable: &'static BlockVTable) -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(1),
            payload_alive: Cell::new(true),
            vtable,
        }
    }

    /// Number of live strong references.
    pub fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// Raw weak count, including the implicit reference of the strong family
    /// while any strong reference is alive.
    pub fn weak_count(&self) -> usize {
        self.weak.get()
    }

    /// Whether the payload has not been destroyed yet.
    pub fn is_payload_alive(&self) -> bool {
        self.payload_alive.get()
    }

    pub(crate) fn increment_strong(&self) {
        let strong = self.strong.get();
        debug_assert!(strong > 0, "resurrecting a destroyed payload");
        self.strong.set(strong + 1);
    }

    /// Returns `true` if this released the last strong reference.
    pub(crate) fn decrement_strong(&self) -> bool {
        let strong = self.strong.get();
        debug_assert!(strong > 0, "strong count underflow");
        self.strong.set(strong - 1);
        strong == 1
    }

    pub(crate) fn increment_weak(&self) {
        self.weak.set(self.weak.get() + 1);
    }

    /// Returns `true` if this released the last weak reference.
    pub(crate) fn decrement_weak(&self) -> bool {
        let weak = self.weak.get();
        debug_assert!(weak > 0, "weak count underflow");
        self.weak.set(weak - 1);
        weak == 1
    }

    /// Runs the configured destruction strategy on the payload. Calling this
    /// again after the payload is gone does nothing.
    ///
    /// # Safety
    /// `this` must point at a live block, derived from the allocation that
    /// created it.
    pub(crate) unsafe fn destroy_payload(this: NonNull<Self>) {
        let header = unsafe { this.as_ref() };
        if !header.payload_alive.replace(false) {
            return;
        }
        let destroy = header.vtable.destroy_payload;
        unsafe { destroy(this) }
    }

    /// Frees the block through the allocator it was created with.
    ///
    /// # Safety
    /// `this` must point at a live block whose payload was already destroyed
    /// and whose weak count reached zero. The block must not be used
    /// afterwards.
    pub(crate) unsafe fn destroy_self(this: NonNull<Self>) {
        let header = unsafe { this.as_ref() };
        debug_assert!(!header.payload_alive.get(), "freeing a block with a live payload");
        debug_assert_eq!(header.weak.get(), 0);
        let destroy = header.vtable.destroy_self;
        unsafe { destroy(this) }
    }

    /// The type erased deleter the block was configured with, if any.
    ///
    /// # Safety
    /// `this` must point at a live block. The returned reference must not
    /// outlive it.
    pub(crate) unsafe fn deleter<'a>(this: NonNull<Self>) -> Option<&'a dyn Any> {
        let header = unsafe { this.as_ref() };
        let deleter = header.vtable.deleter;
        unsafe { deleter(this).map(|d| &*d.as_ptr()) }
    }
}

impl fmt::Debug for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("strong", &self.strong.get())
            .field("weak", &self.weak.get())
            .field("payload_alive", &self.payload_alive.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn nothing(_: NonNull<ControlBlock>) {}

    unsafe fn no_deleter(_: NonNull<ControlBlock>) -> Option<NonNull<dyn Any>> {
        None
    }

    static INERT: BlockVTable = BlockVTable {
        destroy_payload: nothing,
        destroy_self: nothing,
        deleter: no_deleter,
    };

    #[test]
    fn counts_start_at_one() {
        let block = ControlBlock::new(&INERT);
        assert_eq!(block.strong_count(), 1);
        assert_eq!(block.weak_count(), 1);
        assert!(block.is_payload_alive());
    }

    #[test]
    fn decrement_reports_reaching_zero() {
        let block = ControlBlock::new(&INERT);
        block.increment_strong();
        assert!(!block.decrement_strong());
        assert!(block.decrement_strong());

        block.increment_weak();
        assert!(!block.decrement_weak());
        assert!(block.decrement_weak());
    }

    #[test]
    fn payload_destruction_is_idempotent() {
        let mut block = ControlBlock::new(&INERT);
        let ptr = NonNull::from(&mut block);
        unsafe {
            ControlBlock::destroy_payload(ptr);
            ControlBlock::destroy_payload(ptr);
            assert!(ControlBlock::deleter(ptr).is_none());
        }
        assert!(!block.is_payload_alive());
    }
}
