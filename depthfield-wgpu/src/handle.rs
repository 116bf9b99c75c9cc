//! Opaque `u64` handles for objects owned across the C boundary.

use std::collections::HashMap;

/// Maps handles (> 0) to owned values. Handle 0 is never issued.
pub struct HandleStore<T> {
    items: HashMap<u64, T>,
    next: u64,
}

impl<T> HandleStore<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            next: 1,
        }
    }

    pub fn insert(&mut self, item: T) -> u64 {
        let handle = self.next;
        self.next += 1;
        self.items.insert(handle, item);
        handle
    }

    pub fn get(&self, handle: u64) -> Option<&T> {
        self.items.get(&handle)
    }

    pub fn get_mut(&mut self, handle: u64) -> Option<&mut T> {
        self.items.get_mut(&handle)
    }

    pub fn remove(&mut self, handle: u64) -> Option<T> {
        self.items.remove(&handle)
    }
}

impl<T> Default for HandleStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_nonzero_and_unique() {
        let mut store = HandleStore::new();
        let a = store.insert("a");
        let b = store.insert("b");
        assert!(a > 0 && b > 0);
        assert_ne!(a, b);
        assert_eq!(store.get(a), Some(&"a"));
        assert_eq!(store.get(b), Some(&"b"));
    }

    #[test]
    fn test_removed_handle_is_not_reused() {
        let mut store = HandleStore::new();
        let a = store.insert(1);
        assert_eq!(store.remove(a), Some(1));
        assert!(store.get(a).is_none());
        let b = store.insert(2);
        assert_ne!(a, b);
        assert!(store.get(0).is_none());
    }
}
