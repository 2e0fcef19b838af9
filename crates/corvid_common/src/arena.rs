//! Dense, index-addressed storage for compiler entities.
//!
//! Objects, code blocks, states, scopes and frames all live in per-session
//! [`Arena`]s and refer to each other through typed indices created with
//! [`define_id!`](crate::define_id). Parent links become index pairs instead
//! of reference cycles.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Trait for opaque index types used as arena keys.
pub trait ArenaId: Copy {
    /// Creates an ID from a raw `u32` index.
    fn from_raw(index: u32) -> Self;

    /// Returns the raw `u32` index.
    fn as_raw(self) -> u32;
}

/// Defines a `u32` newtype implementing [`ArenaId`].
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl $crate::arena::ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

/// Append-only storage addressed by `I`.
///
/// Items are never removed or reordered, so IDs stay valid for the life of
/// the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arena<I: ArenaId, T> {
    items: Vec<T>,
    #[serde(skip)]
    _marker: PhantomData<I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Stores `item` and returns its ID.
    pub fn alloc(&mut self, item: T) -> I {
        let id = I::from_raw(self.items.len() as u32);
        self.items.push(item);
        id
    }

    /// Returns the item with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is out of bounds.
    pub fn get(&self, id: I) -> &T {
        &self.items[id.as_raw() as usize]
    }

    /// Returns the item with the given ID mutably.
    ///
    /// # Panics
    ///
    /// Panics if the ID is out of bounds.
    pub fn get_mut(&mut self, id: I) -> &mut T {
        &mut self.items[id.as_raw() as usize]
    }

    /// Returns the item with the given ID, or `None` if out of bounds.
    pub fn try_get(&self, id: I) -> Option<&T> {
        self.items.get(id.as_raw() as usize)
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the arena holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over `(ID, &T)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (I::from_raw(i as u32), item))
    }

    /// Iterates over IDs in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = I> {
        (0..self.items.len()).map(|i| I::from_raw(i as u32))
    }

    /// Iterates over items in allocation order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<I: ArenaId, T> Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        self.get(id)
    }
}

impl<I: ArenaId, T> IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        self.get_mut(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::define_id!(
        /// Test id.
        TestId
    );

    #[test]
    fn alloc_and_index() {
        let mut arena: Arena<TestId, &str> = Arena::new();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_eq!(arena[a], "a");
        assert_eq!(arena[b], "b");
        assert_eq!(arena.len(), 2);
        assert_eq!(b.as_raw(), 1);
    }

    #[test]
    fn mutate_in_place() {
        let mut arena: Arena<TestId, u32> = Arena::new();
        let id = arena.alloc(1);
        arena[id] += 41;
        assert_eq!(arena[id], 42);
    }

    #[test]
    fn try_get_out_of_bounds() {
        let arena: Arena<TestId, u32> = Arena::new();
        assert!(arena.is_empty());
        assert!(arena.try_get(TestId::from_raw(0)).is_none());
    }

    #[test]
    fn iteration_order() {
        let mut arena: Arena<TestId, char> = Arena::new();
        arena.alloc('x');
        arena.alloc('y');
        let ids: Vec<u32> = arena.ids().map(|i| i.as_raw()).collect();
        assert_eq!(ids, vec![0, 1]);
        let items: Vec<char> = arena.values().copied().collect();
        assert_eq!(items, vec!['x', 'y']);
    }

    #[test]
    fn serde_roundtrip() {
        let mut arena: Arena<TestId, String> = Arena::new();
        arena.alloc("first".to_string());
        let json = serde_json::to_string(&arena).unwrap();
        let back: Arena<TestId, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[TestId::from_raw(0)], "first");
    }
}
