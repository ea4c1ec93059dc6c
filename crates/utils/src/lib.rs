#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

use alloc::vec::Vec;

// TEAM_211: Re-export spin crate types as our lock API
// Note: spin::Mutex is re-exported as Mutex for API compatibility
pub use spin::{Barrier, Lazy, Once};
pub use spin::{Mutex, MutexGuard};
pub use spin::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// TEAM_212: Re-export hashbrown collections
pub use hashbrown::{HashMap, HashSet};

/// TEAM_431: Stable handle into an [`Arena`].
///
/// The generation makes a handle to a removed slot fail lookups instead of
/// aliasing whatever gets allocated into that slot next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId {
    slot: u32,
    generation: u32,
}

impl ArenaId {
    /// Slot index, for diagnostics.
    pub const fn slot(&self) -> u32 {
        self.slot
    }
}

enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// TEAM_431: Generational arena.
///
/// Tree structures keep [`ArenaId`]s for parent/child links so no node owns
/// another and nothing forms a reference cycle. Removed slots go on a free
/// list and are reused with a bumped generation.
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// [A1] New arena is empty
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// [A2] Insert returns a handle that resolves to the value
    pub fn insert(&mut self, value: T) -> ArenaId {
        self.len += 1;
        if let Some(slot) = self.free_head {
            let entry = &mut self.entries[slot as usize];
            if let Entry::Vacant {
                generation,
                next_free,
            } = *entry
            {
                *entry = Entry::Occupied { generation, value };
                self.free_head = next_free;
                return ArenaId { slot, generation };
            }
        }

        let slot = self.entries.len() as u32;
        self.entries.push(Entry::Occupied {
            generation: 0,
            value,
        });
        ArenaId {
            slot,
            generation: 0,
        }
    }

    /// [A3] Stale or foreign handles resolve to None
    pub fn get(&self, id: ArenaId) -> Option<&T> {
        match self.entries.get(id.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == id.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ArenaId) -> Option<&mut T> {
        match self.entries.get_mut(id.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == id.generation => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, id: ArenaId) -> bool {
        self.get(id).is_some()
    }

    /// [A4] Remove frees the slot and invalidates the handle
    pub fn remove(&mut self, id: ArenaId) -> Option<T> {
        let entry = self.entries.get_mut(id.slot as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == id.generation => {}
            _ => return None,
        }
        let vacant = Entry::Vacant {
            generation: id.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let Entry::Occupied { value, .. } = core::mem::replace(entry, vacant) else {
            return None;
        };
        self.free_head = Some(id.slot);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaId, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    ArenaId {
                        slot: slot as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Entry::Vacant { .. } => None,
            })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests: [S1] exclusive access, [S3] release on drop, [S4] read, [S5] write, [S6] cycles
    #[test]
    fn test_spinlock_basic() {
        let lock = Mutex::new(42);
        {
            let mut guard = lock.lock(); // [S1] acquire
            assert_eq!(*guard, 42); // [S4] read access
            *guard = 43; // [S5] write access
        } // [S3] release on drop
        assert_eq!(*lock.lock(), 43); // [S6] multiple cycles
    }

    /// Tests: readers share, writer excludes
    #[test]
    fn test_rwlock_readers_then_writer() {
        let lock = RwLock::new(1);
        {
            let a = lock.read();
            let b = lock.read();
            assert_eq!(*a + *b, 2);
            assert!(lock.try_write().is_none());
        }
        *lock.write() = 5;
        assert_eq!(*lock.read(), 5);
    }

    /// Tests: [A1] empty, [A2] insert/get
    #[test]
    fn test_arena_insert_get() {
        let mut arena = Arena::new();
        assert!(arena.is_empty()); // [A1]

        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.get(a), Some(&"a")); // [A2]
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    /// Tests: [A3] stale handle after reuse, [A4] remove
    #[test]
    fn test_arena_reuse_bumps_generation() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        assert_eq!(arena.remove(a), Some(1)); // [A4]
        assert!(!arena.contains(a));

        let b = arena.insert(2);
        assert_eq!(a.slot(), b.slot()); // slot reused
        assert_ne!(a, b);
        assert_eq!(arena.get(a), None); // [A3] stale handle
        assert_eq!(arena.get(b), Some(&2));
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_arena_iter_skips_vacant() {
        let mut arena = Arena::new();
        let a = arena.insert('a');
        let _b = arena.insert('b');
        let _c = arena.insert('c');
        arena.remove(a);
        let live: Vec<char> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(live, vec!['b', 'c']);
    }

    /// Tests: HashMap insert/get
    #[test]
    fn test_hashmap_basic() {
        let mut map = HashMap::new();
        map.insert(1, "one");
        map.insert(2, "two");
        assert_eq!(map.get(&1), Some(&"one"));
        assert_eq!(map.get(&3), None);
    }
}
