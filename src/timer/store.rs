//! Timer store
//!
//! The authoritative id → [`TimerData`] map. Every access goes through a
//! single reader/writer lock, held for exactly one lookup, one mutation,
//! or one bounded pass. Read paths hand out value copies so callers never
//! keep a reference into the locked map.
//!
//! Iteration follows insertion order.

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::id::IdAllocator;
use super::record::TimerData;
use super::types::INVALID_TIMER_ID;

/// Lock-guarded timer map plus its id allocator.
#[derive(Debug)]
pub struct TimerStore {
    timers: RwLock<IndexMap<u64, TimerData>>,
    ids: IdAllocator,
}

impl TimerStore {
    /// Creates an empty store with room for `capacity` timers.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timers: RwLock::new(IndexMap::with_capacity(capacity)),
            ids: IdAllocator::new(),
        }
    }

    /// Assigns a fresh id to `record`, stores it, and returns the id.
    ///
    /// # Panics
    ///
    /// Panics if the allocator ever yields the reserved zero id.
    pub fn insert(&self, mut record: TimerData) -> u64 {
        let id = self.ids.allocate();
        assert_ne!(id, INVALID_TIMER_ID, "timer store cannot hold id 0");
        record.id = id;
        self.timers.write().insert(id, record);
        id
    }

    /// Returns a copy of the record, if present.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<TimerData> {
        self.timers.read().get(&id).cloned()
    }

    /// Reads one field (or anything derived) without copying the record.
    pub fn read_with<R>(&self, id: u64, f: impl FnOnce(&TimerData) -> R) -> Option<R> {
        self.timers.read().get(&id).map(f)
    }

    /// Returns whether `id` is live.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        id != INVALID_TIMER_ID && self.timers.read().contains_key(&id)
    }

    /// Mutates the record under the write lock.
    ///
    /// Returns `None` when the id is absent.
    pub fn with_mut<R>(&self, id: u64, f: impl FnOnce(&mut TimerData) -> R) -> Option<R> {
        self.timers.write().get_mut(&id).map(f)
    }

    /// Removes a record. Returns whether it was present.
    pub fn remove(&self, id: u64) -> bool {
        self.timers.write().shift_remove(&id).is_some()
    }

    /// Drops every record and returns how many there were.
    pub fn remove_all(&self) -> usize {
        let mut timers = self.timers.write();
        let count = timers.len();
        timers.clear();
        count
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.read().len()
    }

    /// Returns `true` when the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.read().is_empty()
    }

    /// Visits every record under one shared lock.
    pub fn for_each(&self, mut f: impl FnMut(u64, &TimerData)) {
        for (id, record) in self.timers.read().iter() {
            f(*id, record);
        }
    }

    /// Visits every record under one exclusive lock.
    pub fn for_each_mut(&self, mut f: impl FnMut(u64, &mut TimerData)) {
        for (id, record) in self.timers.write().iter_mut() {
            f(*id, record);
        }
    }

    /// Replaces the contents of `out` with copies of every record.
    ///
    /// `out` is cleared first so its allocation can be reused across ticks.
    pub fn snapshot_into(&self, out: &mut Vec<(u64, TimerData)>) {
        out.clear();
        let timers = self.timers.read();
        out.reserve(timers.len());
        out.extend(timers.iter().map(|(id, record)| (*id, record.clone())));
    }

    /// Applies deferred removals, then deferred unpauses, in one write pass.
    ///
    /// Returns the number of records actually removed.
    pub fn apply_cleanup(&self, to_remove: &[u64], to_unpause: &[u64]) -> usize {
        let mut timers = self.timers.write();
        let removed = to_remove
            .iter()
            .filter(|id| timers.shift_remove(*id).is_some())
            .count();
        for id in to_unpause {
            if let Some(record) = timers.get_mut(id) {
                record.paused = false;
            }
        }
        removed
    }

    /// Empties the store and rewinds the id counter.
    pub fn reset(&self) {
        self.timers.write().clear();
        self.ids.reset();
    }
}

impl Default for TimerStore {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
