//! Process-wide mapping from live unit to context record.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::record::ContextRecord;
use crate::context::unit::AsyncUnitId;
use crate::observability::metrics;

/// Map of live units to the record they observe.
///
/// Entries are only ever added with set-if-absent semantics and removed with
/// delete-if-present semantics, so an entry is never repointed to a
/// different record while its unit is alive.
#[derive(Debug, Default)]
pub struct ContextStore {
    entries: DashMap<AsyncUnitId, Arc<ContextRecord>>,
    /// Live entry count; `DashMap::len` would lock every shard.
    active: AtomicUsize,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, unit: AsyncUnitId) -> Option<Arc<ContextRecord>> {
        self.entries.get(&unit).map(|r| r.value().clone())
    }

    /// Register `record` for `unit` unless the unit already has one.
    ///
    /// Returns the record the unit ends up holding.
    pub fn insert_if_absent(
        &self,
        unit: AsyncUnitId,
        record: Arc<ContextRecord>,
    ) -> Arc<ContextRecord> {
        match self.entries.entry(unit) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                // counted while the shard is still locked, so a racing
                // remove of the same unit cannot decrement first
                self.active.fetch_add(1, Ordering::Relaxed);
                metrics::record_unit_opened();
                slot.insert(record).value().clone()
            }
        }
    }

    pub fn remove(&self, unit: AsyncUnitId) -> Option<Arc<ContextRecord>> {
        let removed = self.entries.remove(&unit).map(|(_, record)| record);
        if removed.is_some() {
            self.active.fetch_sub(1, Ordering::Relaxed);
            metrics::record_unit_released();
        }
        removed
    }

    pub fn contains(&self, unit: AsyncUnitId) -> bool {
        self.entries.contains_key(&unit)
    }

    pub fn len(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
