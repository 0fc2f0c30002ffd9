//! Small atomics used to back the session caches (§4.1.1): last-writer-wins
//! storage for an optional, clonable value, plus a convenience trait for the
//! plain scalar flags that guard session lifecycles elsewhere in the tree.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Last-writer-wins slot for an optional value, read by cloning a snapshot.
///
/// Writers replace the whole value under a short-held lock; readers never
/// observe a torn value and never block a writer for longer than a clone.
pub struct AtomicOption<T> {
    inner: Mutex<Option<T>>,
}

impl<T> AtomicOption<T> {
    pub const fn none() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub fn new(value: Option<T>) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }
}

impl<T: Clone> AtomicOption<T> {
    /// Returns a clone of the current value, if any.
    pub fn get(&self) -> Option<T> {
        self.inner.lock().clone()
    }
}

impl<T> AtomicOption<T> {
    /// Replaces the current value, returning the previous one.
    pub fn swap(&self, value: Option<T>) -> Option<T> {
        std::mem::replace(&mut *self.inner.lock(), value)
    }

    /// Stores a new value, discarding whatever was there before.
    pub fn set(&self, value: T) {
        *self.inner.lock() = Some(value);
    }

    /// Clears the slot, returning the previous value if any.
    pub fn take(&self) -> Option<T> {
        self.inner.lock().take()
    }

    /// True if a value is currently stored.
    pub fn is_some(&self) -> bool {
        self.inner.lock().is_some()
    }
}

impl<T> Default for AtomicOption<T> {
    fn default() -> Self {
        Self::none()
    }
}

/// Uniform get/set access over the standard library's scalar atomics, so call
/// sites read the same way regardless of the backing width.
pub trait EasyAtomic {
    type Item;

    fn get(&self) -> Self::Item;
    fn set(&self, value: Self::Item);
    fn swap(&self, value: Self::Item) -> Self::Item;
}

impl EasyAtomic for AtomicBool {
    type Item = bool;

    fn get(&self) -> bool {
        self.load(Ordering::SeqCst)
    }

    fn set(&self, value: bool) {
        self.store(value, Ordering::SeqCst);
    }

    fn swap(&self, value: bool) -> bool {
        AtomicBool::swap(self, value, Ordering::SeqCst)
    }
}

impl EasyAtomic for AtomicU32 {
    type Item = u32;

    fn get(&self) -> u32 {
        self.load(Ordering::SeqCst)
    }

    fn set(&self, value: u32) {
        self.store(value, Ordering::SeqCst);
    }

    fn swap(&self, value: u32) -> u32 {
        AtomicU32::swap(self, value, Ordering::SeqCst)
    }
}

impl EasyAtomic for AtomicU64 {
    type Item = u64;

    fn get(&self) -> u64 {
        self.load(Ordering::SeqCst)
    }

    fn set(&self, value: u64) {
        self.store(value, Ordering::SeqCst);
    }

    fn swap(&self, value: u64) -> u64 {
        AtomicU64::swap(self, value, Ordering::SeqCst)
    }
}

impl EasyAtomic for AtomicUsize {
    type Item = usize;

    fn get(&self) -> usize {
        self.load(Ordering::SeqCst)
    }

    fn set(&self, value: usize) {
        self.store(value, Ordering::SeqCst);
    }

    fn swap(&self, value: usize) -> usize {
        AtomicUsize::swap(self, value, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_returns_previous_value() {
        let cache: AtomicOption<Vec<u8>> = AtomicOption::none();
        assert_eq!(cache.swap(Some(vec![1, 2, 3])), None);
        assert_eq!(cache.swap(Some(vec![4, 5])), Some(vec![1, 2, 3]));
        assert_eq!(cache.get(), Some(vec![4, 5]));
    }

    #[test]
    fn easy_atomic_bool_round_trips() {
        let flag = AtomicBool::new(false);
        assert!(!flag.get());
        flag.set(true);
        assert!(flag.get());
    }

    #[test]
    fn easy_atomic_swap_returns_previous_value() {
        let flag = AtomicBool::new(false);
        assert!(!EasyAtomic::swap(&flag, true));
        assert!(flag.get());
    }
}
