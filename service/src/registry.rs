//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Session registry
//!
//! The registry is a table of slots, each either occupied by a live session
//! or empty. A new session always takes the lowest empty slot; when every
//! slot is occupied the table grows by one, up to its slot limit. All access
//! goes through a single mutex so no two allocations can observe the same
//! free slot.

use crate::{MAX_SLOTS, SessionHandle, SlotIndex};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Registry of live terminal sessions
pub type SessionRegistry = SlotTable<Arc<SessionHandle>>;

/// Lowest-free-slot table guarded by one lock
#[derive(Debug)]
pub struct SlotTable<T> {
    slots: Mutex<Vec<Option<T>>>,
    limit: usize,
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotTable<T> {
    /// Create an empty table holding up to [`MAX_SLOTS`] entries
    pub fn new() -> Self {
        Self::with_limit(MAX_SLOTS)
    }

    /// Create an empty table holding up to `limit` entries
    ///
    /// The limit is clamped to [`MAX_SLOTS`].
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            limit: limit.min(MAX_SLOTS),
        }
    }

    // Every mutation leaves the table consistent, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<Option<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `entry` to the lowest free slot
    ///
    /// Returns `None`, dropping `entry`, when every slot is occupied.
    pub fn allocate(&self, entry: T) -> Option<SlotIndex> {
        self.allocate_with(|_| (entry, ())).map(|(slot, ())| slot)
    }

    /// Bind the entry built by `build` to the lowest free slot
    ///
    /// `build` runs under the registry lock and receives the chosen slot, so
    /// entries that need to know their own index can be constructed without
    /// racing a concurrent allocation. It must not touch the registry. When
    /// the table is full `build` is not called and `None` is returned.
    pub fn allocate_with<F, R>(&self, build: F) -> Option<(SlotIndex, R)>
    where
        F: FnOnce(SlotIndex) -> (T, R),
    {
        let mut slots = self.lock();
        let index = match slots.iter().position(Option::is_none) {
            Some(index) => index,
            None if slots.len() < self.limit => {
                slots.push(None);
                slots.len() - 1
            }
            None => return None,
        };
        let slot = SlotIndex::new(index)?;
        let (entry, extra) = build(slot);
        slots[index] = Some(entry);
        Some((slot, extra))
    }

    /// Mark a slot empty
    ///
    /// Releasing an empty slot does nothing.
    ///
    /// # Panics
    ///
    /// Panics if `slot` lies beyond the end of the table; such an index was
    /// never handed out.
    pub fn release(&self, slot: SlotIndex) -> Option<T> {
        let mut slots = self.lock();
        let len = slots.len();
        match slots.get_mut(slot.as_usize()) {
            Some(entry) => entry.take(),
            None => panic!("release of slot {slot} outside registry of {len} slots"),
        }
    }

    /// Copy of every slot, empty ones included
    ///
    /// The lock is released before this returns, so callers may do slow work
    /// on the entries without blocking allocation.
    pub fn snapshot(&self) -> Vec<(SlotIndex, Option<T>)>
    where
        T: Clone,
    {
        self.lock()
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| Some((SlotIndex::new(index)?, entry.clone())))
            .collect()
    }

    /// Copy of the occupied slots only
    pub fn live(&self) -> Vec<(SlotIndex, T)>
    where
        T: Clone,
    {
        self.snapshot()
            .into_iter()
            .filter_map(|(slot, entry)| entry.map(|entry| (slot, entry)))
            .collect()
    }

    /// Number of occupied slots
    pub fn live_count(&self) -> usize {
        self.lock().iter().filter(|entry| entry.is_some()).count()
    }

    /// Current table length, empty slots included
    pub fn capacity(&self) -> usize {
        self.lock().len()
    }

    /// Most slots the table will ever hold
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(index: usize) -> SlotIndex {
        SlotIndex::new(index).unwrap()
    }

    #[test]
    fn test_allocate_grows_sequentially() {
        let table = SlotTable::new();
        assert_eq!(table.allocate("a"), Some(slot(0)));
        assert_eq!(table.allocate("b"), Some(slot(1)));
        assert_eq!(table.allocate("c"), Some(slot(2)));
        assert_eq!(table.live_count(), 3);
        assert_eq!(table.capacity(), 3);
    }

    #[test]
    fn test_release_reuses_lowest_slot() {
        let table = SlotTable::new();
        for name in ["a", "b", "c", "d"] {
            table.allocate(name);
        }

        assert_eq!(table.release(slot(2)), Some("c"));
        assert_eq!(table.release(slot(1)), Some("b"));
        assert_eq!(table.live_count(), 2);

        assert_eq!(table.allocate("e"), Some(slot(1)));
        assert_eq!(table.allocate("f"), Some(slot(2)));
        assert_eq!(table.allocate("g"), Some(slot(4)));
    }

    #[test]
    fn test_release_empty_slot_is_noop() {
        let table = SlotTable::new();
        let first = table.allocate(7).unwrap();
        assert_eq!(table.release(first), Some(7));
        assert_eq!(table.release(first), None);
        assert_eq!(table.capacity(), 1);
    }

    #[test]
    #[should_panic(expected = "outside registry")]
    fn test_release_out_of_range_panics() {
        let table: SlotTable<u8> = SlotTable::new();
        table.release(slot(3));
    }

    #[test]
    fn test_allocate_with_sees_its_slot() {
        let table = SlotTable::new();
        table.allocate(0);
        let (chosen, seen) = table
            .allocate_with(|slot| (slot.as_usize() * 10, slot))
            .unwrap();
        assert_eq!(chosen, seen);
        assert_eq!(chosen, slot(1));
    }

    #[test]
    fn test_full_table_refuses_without_building() {
        let table = SlotTable::with_limit(2);
        table.allocate('a');
        table.allocate('b');

        let mut built = false;
        let refused = table.allocate_with(|_| {
            built = true;
            ('c', ())
        });
        assert!(refused.is_none());
        assert!(!built);
        assert_eq!(table.capacity(), 2);

        table.release(slot(0));
        assert_eq!(table.allocate('d'), Some(slot(0)));
    }

    #[test]
    fn test_limit_clamped_to_device_range() {
        assert_eq!(SlotTable::<u8>::new().limit(), MAX_SLOTS);
        assert_eq!(SlotTable::<u8>::with_limit(usize::MAX).limit(), MAX_SLOTS);
    }

    #[test]
    fn test_last_slot_is_fff_and_then_full() {
        let table = SlotTable::new();
        let mut last = None;
        for n in 0..MAX_SLOTS {
            last = table.allocate(n);
        }
        assert_eq!(last.unwrap().device_address().to_string(), "FFF");
        assert_eq!(table.allocate(MAX_SLOTS), None);
        assert_eq!(table.live_count(), MAX_SLOTS);
    }

    #[test]
    fn test_snapshot_includes_holes() {
        let table = SlotTable::new();
        table.allocate('x');
        table.allocate('y');
        table.allocate('z');
        table.release(slot(1));

        let snapshot = table.snapshot();
        assert_eq!(
            snapshot,
            vec![(slot(0), Some('x')), (slot(1), None), (slot(2), Some('z'))]
        );
        assert_eq!(table.live(), vec![(slot(0), 'x'), (slot(2), 'z')]);
    }

    #[test]
    fn test_concurrent_allocations_are_unique() {
        let table = Arc::new(SlotTable::new());
        let mut handles = vec![];

        for worker in 0..8 {
            let table = table.clone();
            handles.push(std::thread::spawn(move || {
                (0..50)
                    .map(|n| table.allocate(worker * 100 + n).unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut slots: Vec<SlotIndex> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        slots.sort();
        slots.dedup();
        assert_eq!(slots.len(), 400);
        assert_eq!(table.capacity(), 400);
    }
}
