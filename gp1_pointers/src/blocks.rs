//! Concrete control block layouts.
//!
//! Each layout starts with a [`ControlBlock`] header and carries its own
//! destruction strategy in a static vtable.

use crate::alloc::{BlockAllocator, allocate_for};
use crate::control::{BlockVTable, ControlBlock};
use std::alloc::Layout;
use std::any::Any;
use std::cell::{Cell, UnsafeCell};
use std::mem::{self, ManuallyDrop, MaybeUninit};
use std::ptr::{self, NonNull};

/// Custom destruction of a boxed payload.
///
/// The deleter stays alive inside the control block until the last weak
/// reference is released, so it can still be inspected after the payload is
/// gone.
pub trait Deleter<T: ?Sized> {
    fn delete(&mut self, payload: Box<T>);
}

impl<T: ?Sized, F: FnMut(Box<T>)> Deleter<T> for F {
    fn delete(&mut self, payload: Box<T>) {
        self(payload)
    }
}

unsafe fn no_deleter(_: NonNull<ControlBlock>) -> Option<NonNull<dyn Any>> {
    None
}

/// Boxed payload, dropped normally.
#[repr(C)]
pub(crate) struct BoxBlock<T: ?Sized> {
    header: ControlBlock,
    payload: Cell<Option<NonNull<T>>>,
}

impl<T: ?Sized> BoxBlock<T> {
    const VTABLE: BlockVTable = BlockVTable {
        destroy_payload: Self::destroy_payload,
        destroy_self: Self::destroy_self,
        deleter: no_deleter,
    };

    pub(crate) fn create(payload: Box<T>) -> (NonNull<ControlBlock>, NonNull<T>) {
        let payload = NonNull::from(Box::leak(payload));
        let block = Box::new(Self {
            header: ControlBlock::new(&Self::VTABLE),
            payload: Cell::new(Some(payload)),
        });
        (NonNull::from(Box::leak(block)).cast(), payload)
    }

    unsafe fn destroy_payload(this: NonNull<ControlBlock>) {
        let block = unsafe { this.cast::<Self>().as_ref() };
        if let Some(payload) = block.payload.take() {
            drop(unsafe { Box::from_raw(payload.as_ptr()) });
        }
    }

    unsafe fn destroy_self(this: NonNull<ControlBlock>) {
        drop(unsafe { Box::from_raw(this.cast::<Self>().as_ptr()) });
    }
}

/// Boxed payload handed to a [`Deleter`], block memory from `A`.
#[repr(C)]
pub(crate) struct DeleterBlock<T: ?Sized, D, A> {
    header: ControlBlock,
    payload: Cell<Option<NonNull<T>>>,
    deleter: UnsafeCell<D>,
    alloc: A,
}

impl<T: ?Sized, D: Deleter<T> + 'static, A: BlockAllocator> DeleterBlock<T, D, A> {
    const VTABLE: BlockVTable = BlockVTable {
        destroy_payload: Self::destroy_payload,
        destroy_self: Self::destroy_self,
        deleter: Self::deleter,
    };

    pub(crate) fn create(
        payload: Box<T>,
        deleter: D,
        alloc: A,
    ) -> (NonNull<ControlBlock>, NonNull<T>) {
        let payload = NonNull::from(Box::leak(payload));
        let block = allocate_for::<Self, A>(&alloc);
        unsafe {
            block.as_ptr().write(Self {
                header: ControlBlock::new(&Self::VTABLE),
                payload: Cell::new(Some(payload)),
                deleter: UnsafeCell::new(deleter),
                alloc,
            });
        }
        (block.cast(), payload)
    }

    unsafe fn destroy_payload(this: NonNull<ControlBlock>) {
        let block = this.cast::<Self>();
        let Some(payload) = unsafe { block.as_ref() }.payload.take() else {
            return;
        };
        let deleter = unsafe { &mut *UnsafeCell::raw_get(&raw const (*block.as_ptr()).deleter) };
        deleter.delete(unsafe { Box::from_raw(payload.as_ptr()) });
    }

    unsafe fn destroy_self(this: NonNull<ControlBlock>) {
        // moves the deleter and allocator out, both drop at the end of scope
        let block = unsafe { ptr::read(this.cast::<Self>().as_ptr()) };
        unsafe { block.alloc.deallocate(this.cast(), Layout::new::<Self>()) };
    }

    unsafe fn deleter(this: NonNull<ControlBlock>) -> Option<NonNull<dyn Any>> {
        let block = this.cast::<Self>().as_ptr();
        let deleter: *mut D = unsafe { UnsafeCell::raw_get(&raw const (*block).deleter) };
        NonNull::new(deleter as *mut dyn Any)
    }
}

/// Payload stored next to the counts in a single allocation.
#[repr(C)]
pub(crate) struct InlineBlock<T, A: BlockAllocator> {
    header: ControlBlock,
    value: UnsafeCell<ManuallyDrop<T>>,
    alloc: A,
}

impl<T, A: BlockAllocator> InlineBlock<T, A> {
    const VTABLE: BlockVTable = BlockVTable {
        destroy_payload: Self::destroy_payload,
        destroy_self: Self::destroy_self,
        deleter: no_deleter,
    };

    pub(crate) fn create(value: T, alloc: A) -> (NonNull<ControlBlock>, NonNull<T>) {
        let block = allocate_for::<Self, A>(&alloc);
        unsafe {
            block.as_ptr().write(Self {
                header: ControlBlock::new(&Self::VTABLE),
                value: UnsafeCell::new(ManuallyDrop::new(value)),
                alloc,
            });
            (block.cast(), NonNull::new_unchecked(Self::value(block.as_ptr())))
        }
    }

    unsafe fn value(block: *mut Self) -> *mut T {
        unsafe { UnsafeCell::raw_get(&raw const (*block).value) }.cast::<T>()
    }

    unsafe fn destroy_payload(this: NonNull<ControlBlock>) {
        unsafe { ptr::drop_in_place(Self::value(this.cast::<Self>().as_ptr())) }
    }

    unsafe fn destroy_self(this: NonNull<ControlBlock>) {
        let block = this.cast::<Self>().as_ptr();
        unsafe {
            let alloc = ptr::read(&raw const (*block).alloc);
            alloc.deallocate(this.cast(), Layout::new::<Self>());
        }
    }
}

/// Fixed size array stored next to the counts, built element by element.
#[repr(C)]
pub(crate) struct InlineArrayBlock<T, const N: usize, A: BlockAllocator> {
    header: ControlBlock,
    items: UnsafeCell<MaybeUninit<[T; N]>>,
    alloc: A,
}

impl<T, const N: usize, A: BlockAllocator> InlineArrayBlock<T, N, A> {
    const VTABLE: BlockVTable = BlockVTable {
        destroy_payload: Self::destroy_payload,
        destroy_self: Self::destroy_self,
        deleter: no_deleter,
    };

    pub(crate) fn create(
        alloc: A,
        mut init: impl FnMut(usize) -> T,
    ) -> (NonNull<ControlBlock>, NonNull<[T; N]>) {
        let block = allocate_for::<Self, A>(&alloc);
        let raw = block.as_ptr();
        unsafe {
            (&raw mut (*raw).header).write(ControlBlock::new(&Self::VTABLE));
            (&raw mut (*raw).alloc).write(alloc);
        }

        let items = unsafe { Self::items(raw) };
        let mut partial = PartialArray { block, built: 0 };
        while partial.built < N {
            let item = init(partial.built);
            unsafe { items.add(partial.built).write(item) };
            partial.built += 1;
        }
        mem::forget(partial);

        (block.cast(), unsafe { NonNull::new_unchecked(items.cast::<[T; N]>()) })
    }

    unsafe fn items(block: *mut Self) -> *mut T {
        unsafe { UnsafeCell::raw_get(&raw const (*block).items) }.cast::<T>()
    }

    unsafe fn drop_items(block: *mut Self, count: usize) {
        let items = unsafe { Self::items(block) };
        for i in (0..count).rev() {
            unsafe { ptr::drop_in_place(items.add(i)) };
        }
    }

    unsafe fn free(block: NonNull<Self>) {
        unsafe {
            let alloc = ptr::read(&raw const (*block.as_ptr()).alloc);
            alloc.deallocate(block.cast(), Layout::new::<Self>());
        }
    }

    unsafe fn destroy_payload(this: NonNull<ControlBlock>) {
        unsafe { Self::drop_items(this.cast::<Self>().as_ptr(), N) }
    }

    unsafe fn destroy_self(this: NonNull<ControlBlock>) {
        unsafe { Self::free(this.cast::<Self>()) }
    }
}

/// Unwinds a half built array: drops what was built and frees the block.
struct PartialArray<T, const N: usize, A: BlockAllocator> {
    block: NonNull<InlineArrayBlock<T, N, A>>,
    built: usize,
}

impl<T, const N: usize, A: BlockAllocator> Drop for PartialArray<T, N, A> {
    fn drop(&mut self) {
        unsafe {
            InlineArrayBlock::drop_items(self.block.as_ptr(), self.built);
            InlineArrayBlock::free(self.block);
        }
    }
}
