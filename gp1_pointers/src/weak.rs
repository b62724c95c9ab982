use crate::control::ControlBlock;
use crate::shared::{Raw, SharedHandle};
use std::fmt;

/// A non-owning reference to a shared payload.
///
/// Never keeps the payload alive, only the control block. A default
/// constructed handle points at nothing and is always expired.
pub struct WeakHandle<T: ?Sized> {
    raw: Option<Raw<T>>,
}

impl<T: ?Sized> WeakHandle<T> {
    pub const fn new() -> Self {
        Self { raw: None }
    }

    pub(crate) fn from_raw(raw: Raw<T>) -> Self {
        raw.header().increment_weak();
        Self { raw: Some(raw) }
    }

    /// Whether the payload is gone, or was never there.
    pub fn expired(&self) -> bool {
        self.strong_count() == 0
    }

    /// A strong reference if the payload is still alive.
    pub fn lock(&self) -> Option<SharedHandle<T>> {
        let raw = self.raw?;
        let header = raw.header();
        if header.strong_count() == 0 {
            return None;
        }
        header.increment_strong();
        Some(unsafe { SharedHandle::from_raw(raw) })
    }

    pub fn strong_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.header().strong_count())
    }

    /// Number of weak handles to this owner, this one included.
    pub fn weak_count(&self) -> usize {
        self.raw.map_or(0, |raw| {
            let header = raw.header();
            header.weak_count() - usize::from(header.strong_count() > 0)
        })
    }

    /// Projects to a part of the payload. Empty if the payload is gone.
    ///
    /// ```compile_fail
    /// use gp1_pointers::{SharedHandle, WeakHandle};
    ///
    /// fn escape(owner: &SharedHandle<&str>) -> WeakHandle<str> {
    ///     SharedHandle::downgrade(owner).map(|s| *s)
    /// }
    /// ```
    pub fn map<U: ?Sized>(&self, f: impl FnOnce(&T) -> &U) -> WeakHandle<U>
    where
        T: 'static,
    {
        match self.lock() {
            Some(strong) => SharedHandle::downgrade(&SharedHandle::map(&strong, f)),
            None => WeakHandle::new(),
        }
    }

    /// Drops the reference, leaving an empty handle.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Whether both point at the same payload address. Two empty handles
    /// are equal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.raw.map(|raw| raw.payload_addr()) == other.raw.map(|raw| raw.payload_addr())
    }

    pub fn owner_eq<U: ?Sized>(&self, other: &WeakHandle<U>) -> bool {
        self.owner_addr() == other.owner_addr()
    }

    /// Total order over owners. Empty handles order first.
    pub fn owner_before<U: ?Sized>(&self, other: &WeakHandle<U>) -> bool {
        self.owner_addr() < other.owner_addr()
    }

    pub(crate) fn owner_addr(&self) -> usize {
        self.raw.map_or(0, |raw| raw.owner_addr())
    }
}

impl<T: ?Sized> Drop for WeakHandle<T> {
    fn drop(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };
        let block = raw.block;
        unsafe {
            if block.as_ref().decrement_weak() {
                ControlBlock::destroy_self(block);
            }
        }
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        match self.raw {
            Some(raw) => Self::from_raw(raw),
            None => Self::new(),
        }
    }
}

impl<T: ?Sized> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> From<&SharedHandle<T>> for WeakHandle<T> {
    fn from(value: &SharedHandle<T>) -> Self {
        SharedHandle::downgrade(value)
    }
}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(WeakHandle)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_handle_is_expired() {
        let w = WeakHandle::<u32>::new();
        assert!(w.expired());
        assert!(w.lock().is_none());
        assert_eq!(w.strong_count(), 0);
        assert_eq!(w.weak_count(), 0);
        assert!(w.ptr_eq(&WeakHandle::default()));
    }

    #[test]
    fn weak_counts_exclude_the_strong_family() {
        let s = SharedHandle::new(3);
        let a = SharedHandle::downgrade(&s);
        let b = a.clone();
        assert_eq!(a.weak_count(), 2);
        assert_eq!(b.strong_count(), 1);

        drop(s);
        assert_eq!(a.weak_count(), 2);
        assert!(b.expired());
    }

    #[test]
    fn reset_releases_the_block_reference() {
        let s = SharedHandle::new(1);
        let mut w = WeakHandle::from(&s);
        assert_eq!(SharedHandle::weak_count(&s), 1);
        w.reset();
        assert_eq!(SharedHandle::weak_count(&s), 0);
        assert!(w.expired());
    }
}
