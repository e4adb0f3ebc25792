// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Dense per-system component index
//!
//! Systems keep their accepted components in a [`ComponentIndex`] so that
//! `update` walks a packed array instead of the global entity graph:
//!
//! ```text
//! handles: [h0, h2, h7, ...]   // contiguous, iteration order
//! owners:  [e0, e1, e5, ...]   // owning entity per slot
//! lookup:  h -> slot           // sparse map for O(1) removal
//! ```
//!
//! Removal swaps the last slot into the hole, so iteration order is not
//! stable across removals. Entries are non-owning: the component itself lives
//! in the world's registry and is resolved through the handle.

use crate::ecs::{ComponentHandle, Entity};
use crate::error::{WorldError, WorldResult};
use std::collections::HashMap;

/// One indexed component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Handle into the component registry
    pub handle: ComponentHandle,
    /// Entity that owns the component
    pub owner: Entity,
}

/// Dense, swap-remove index of component handles
#[derive(Debug, Default, Clone)]
pub struct ComponentIndex {
    lookup: HashMap<ComponentHandle, usize>,
    entries: Vec<IndexEntry>,
}

impl ComponentIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        ComponentIndex {
            lookup: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Add a component to the index
    ///
    /// Returns `Ok(false)` if the handle was already present. Growth failure
    /// is reported rather than aborting.
    pub fn insert(&mut self, handle: ComponentHandle, owner: Entity) -> WorldResult<bool> {
        if self.lookup.contains_key(&handle) {
            return Ok(false);
        }

        if self.entries.len() == self.entries.capacity() {
            let additional = self.entries.capacity().max(8);
            self.entries
                .try_reserve(additional)
                .map_err(|_| WorldError::Allocation {
                    what: "component index",
                    requested: additional,
                })?;
        }
        // The map grows on its own schedule
        if self.lookup.len() == self.lookup.capacity() {
            let additional = self.lookup.capacity().max(8);
            self.lookup
                .try_reserve(additional)
                .map_err(|_| WorldError::Allocation {
                    what: "component index lookup",
                    requested: additional,
                })?;
        }

        self.lookup.insert(handle, self.entries.len());
        self.entries.push(IndexEntry { handle, owner });

        debug_assert_eq!(self.lookup.len(), self.entries.len());
        Ok(true)
    }

    /// Remove a component from the index
    pub fn remove(&mut self, handle: ComponentHandle) -> Option<IndexEntry> {
        let slot = self.lookup.remove(&handle)?;
        let removed = self.entries.swap_remove(slot);

        // The former last entry now sits in `slot`
        if let Some(moved) = self.entries.get(slot) {
            self.lookup.insert(moved.handle, slot);
        }

        debug_assert_eq!(self.lookup.len(), self.entries.len());
        Some(removed)
    }

    /// Check whether a handle is indexed
    pub fn contains(&self, handle: ComponentHandle) -> bool {
        self.lookup.contains_key(&handle)
    }

    /// Number of times `owner` appears in the index
    pub fn count_owned_by(&self, owner: Entity) -> usize {
        self.entries.iter().filter(|entry| entry.owner == owner).count()
    }

    /// Packed entries in iteration order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Iterate over the indexed entries
    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    /// Number of indexed components
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.lookup.clear();
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a ComponentIndex {
    type Item = &'a IndexEntry;
    type IntoIter = std::slice::Iter<'a, IndexEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn handles(count: usize) -> Vec<ComponentHandle> {
        let mut map: SlotMap<ComponentHandle, ()> = SlotMap::with_key();
        (0..count).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_index_insert_and_contains() {
        let h = handles(2);
        let mut index = ComponentIndex::new();

        assert!(index.insert(h[0], Entity::new(1, 0)).unwrap());
        assert!(!index.insert(h[0], Entity::new(1, 0)).unwrap());
        assert!(index.contains(h[0]));
        assert!(!index.contains(h[1]));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_index_swap_remove_keeps_lookup_consistent() {
        let h = handles(3);
        let mut index = ComponentIndex::new();
        for (i, handle) in h.iter().enumerate() {
            index.insert(*handle, Entity::new(i as u64, 0)).unwrap();
        }

        let removed = index.remove(h[0]).unwrap();
        assert_eq!(removed.owner, Entity::new(0, 0));
        assert_eq!(index.len(), 2);

        // The last entry was moved into slot 0 and must still be removable
        assert!(index.remove(h[2]).is_some());
        assert!(index.remove(h[1]).is_some());
        assert!(index.is_empty());
        assert!(index.remove(h[1]).is_none());
    }

    #[test]
    fn test_index_rapid_insert_remove() {
        let h = handles(100);
        let mut index = ComponentIndex::with_capacity(4);
        for (i, handle) in h.iter().enumerate() {
            index.insert(*handle, Entity::new(i as u64, 0)).unwrap();
        }
        for handle in h.iter().skip(1).step_by(2) {
            index.remove(*handle);
        }

        assert_eq!(index.len(), 50);
        for handle in h.iter().step_by(2) {
            assert!(index.contains(*handle));
        }
        assert_eq!(index.iter().count(), 50);
    }

    #[test]
    fn test_lookup_reserves_independently_of_entries() {
        // Entries have slack while the map starts empty
        let mut index = ComponentIndex {
            lookup: HashMap::new(),
            entries: Vec::with_capacity(64),
        };
        let h = handles(20);
        for (i, handle) in h.iter().enumerate() {
            index.insert(*handle, Entity::new(i as u64, 0)).unwrap();
            assert!(index.lookup.capacity() >= index.lookup.len());
        }

        assert_eq!(index.entries.capacity(), 64);
        assert!(h.iter().all(|handle| index.contains(*handle)));
    }

    #[test]
    fn test_count_owned_by() {
        let h = handles(3);
        let owner = Entity::new(9, 0);
        let mut index = ComponentIndex::new();
        index.insert(h[0], owner).unwrap();
        index.insert(h[1], owner).unwrap();
        index.insert(h[2], Entity::new(1, 0)).unwrap();

        assert_eq!(index.count_owned_by(owner), 2);
        index.clear();
        assert_eq!(index.count_owned_by(owner), 0);
    }
}
