//! Fixed-capacity list used for per-slot grant lists
//!
//! Storage is reserved once at construction. Clearing keeps the storage, so a
//! list that is reused slot after slot never reallocates.

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// List holding at most `N` items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundedList<T, const N: usize> {
    items: Vec<T>,
}

impl<T, const N: usize> BoundedList<T, N> {
    /// Create an empty list with room for `N` items
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(N),
        }
    }

    /// Maximum number of items
    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of free positions
    pub fn remaining(&self) -> usize {
        N.saturating_sub(self.items.len())
    }

    /// Whether no more items fit
    pub fn is_full(&self) -> bool {
        self.items.len() >= N
    }

    /// Append an item, handing it back if the list is full
    pub fn push(&mut self, item: T) -> Result<&mut T, T> {
        if self.is_full() {
            return Err(item);
        }
        self.items.push(item);
        let last = self.items.len() - 1;
        Ok(&mut self.items[last])
    }

    /// Remove the first `count` items, keeping the order of the rest
    pub fn remove_front(&mut self, count: usize) {
        let count = count.min(self.items.len());
        self.items.drain(..count);
    }

    /// Remove all items, keeping the storage
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T, const N: usize> Default for BoundedList<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Deref for BoundedList<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T, const N: usize> DerefMut for BoundedList<T, N> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a BoundedList<T, N> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut list: BoundedList<u32, 2> = BoundedList::new();
        assert!(list.push(1).is_ok());
        assert!(list.push(2).is_ok());
        assert!(list.is_full());
        assert_eq!(list.push(3), Err(3));
        assert_eq!(list.remaining(), 0);
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.remaining(), 2);
    }

    #[test]
    fn test_remove_front_keeps_order() {
        let mut list: BoundedList<u32, 8> = BoundedList::new();
        for i in 0..5 {
            list.push(i).unwrap();
        }
        list.remove_front(2);
        assert_eq!(&list[..], &[2, 3, 4]);
        list.remove_front(10);
        assert!(list.is_empty());
    }
}
