//! Task-tree tracker.
//!
//! Receives unit-created and unit-completed events and keeps the store in
//! step: a child inherits its causal parent's record by reference, and a
//! completed unit's entry is dropped. Both handlers run inline in unit setup
//! and teardown, so they never fail and never allocate beyond the map entry.

use std::sync::Arc;

use crate::context::store::ContextStore;
use crate::context::unit::AsyncUnitId;

#[derive(Debug, Clone)]
pub struct TaskTracker {
    store: Arc<ContextStore>,
}

impl TaskTracker {
    pub fn new(store: Arc<ContextStore>) -> Self {
        Self { store }
    }

    /// A new unit was scheduled while `parent` was executing.
    ///
    /// Copies the parent's record reference if it has one. A parent without
    /// a record leaves the child untouched, including any entry a duplicate
    /// event may already have set.
    pub fn on_unit_created(&self, child: AsyncUnitId, parent: Option<AsyncUnitId>) {
        let Some(parent) = parent else { return };
        if let Some(record) = self.store.get(parent) {
            self.store.insert_if_absent(child, record);
        }
    }

    /// A unit finished or was dropped.
    pub fn on_unit_completed(&self, unit: AsyncUnitId) {
        if let Some(record) = self.store.remove(unit) {
            tracing::trace!(
                unit = %unit,
                request_id = %record.correlation_id(),
                "Unit completed"
            );
        }
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }
}
