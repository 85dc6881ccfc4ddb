//! Generation-checked arena with stable handles.
//!
//! Nodes and physical ports reference each other by handle rather than by
//! pointer. A handle carries the slot generation it was issued for, so a
//! handle to a removed object never resolves to whatever reuses its slot.
//!
//! Like `SyncMap`, lookups never create entries: [`Arena::get`] and
//! [`Arena::get_mut`] return `Option`, and insertion is always explicit.

use std::fmt;
use std::marker::PhantomData;

/// A typed arena handle.
pub trait ArenaId: Copy + Eq + fmt::Debug {
    /// Builds a handle from its raw parts.
    fn from_raw(index: u32, generation: u32) -> Self;

    /// Slot index.
    fn index(&self) -> u32;

    /// Slot generation the handle was issued for.
    fn generation(&self) -> u32;
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl ArenaId for $name {
            fn from_raw(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            fn index(&self) -> u32 {
                self.index
            }

            fn generation(&self) -> u32 {
                self.generation
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}.{}", $prefix, self.index, self.generation)
            }
        }
    };
}

arena_id!(
    /// Handle to a [`Node`](crate::node::Node) owned by a subnet.
    NodeId,
    "node"
);

arena_id!(
    /// Handle to a [`PhysicalPort`](crate::physp::PhysicalPort) owned by a subnet.
    PhysPortId,
    "physp"
);

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage addressed by generation-checked handles.
#[derive(Debug, Clone)]
pub struct Arena<I, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _id: PhantomData<fn() -> I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _id: PhantomData,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the arena holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value` and returns its handle.
    pub fn insert(&mut self, value: T) -> I {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return I::from_raw(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        I::from_raw(index, 0)
    }

    /// Returns true if `id` resolves to a live entry.
    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Returns the entry for `id`. **This never creates entries.**
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    /// Returns the entry for `id` mutably. **This never creates entries.**
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    /// Borrows two distinct entries mutably.
    ///
    /// Returns `None` if either handle is stale or both name the same slot.
    pub fn get_pair_mut(&mut self, a: I, b: I) -> Option<(&mut T, &mut T)> {
        if a.index() == b.index() || !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            Some((lo[ia].value.as_mut()?, hi[0].value.as_mut()?))
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            Some((hi[0].value.as_mut()?, lo[ib].value.as_mut()?))
        }
    }

    /// Removes the entry for `id`, invalidating every copy of the handle.
    pub fn remove(&mut self, id: I) -> Option<T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        Some(value)
    }

    /// Iterates live entries with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (I::from_raw(index as u32, slot.generation), value))
        })
    }

    /// Handles of all live entries, for loops that mutate the arena.
    pub fn ids(&self) -> Vec<I> {
        self.iter().map(|(id, _)| id).collect()
    }
}
