//! Asynchronous execution units.
//!
//! A unit is one tracked future. Its id lives in a task-local slot for the
//! duration of every poll, so code running anywhere inside the future (across
//! any number of `.await` points) can find the unit it belongs to.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::tracker::TaskTracker;

tokio::task_local! {
    static CURRENT_UNIT: AsyncUnitId;
}

static NEXT_UNIT: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a live unit. Only used as a store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AsyncUnitId(u64);

impl AsyncUnitId {
    pub(crate) fn next() -> Self {
        Self(NEXT_UNIT.fetch_add(1, Ordering::Relaxed))
    }

    /// The unit whose code is executing right now, if any.
    pub fn current() -> Option<Self> {
        CURRENT_UNIT.try_with(|id| *id).ok()
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AsyncUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Fires the completion event exactly once, when the unit's future
/// finishes or is dropped unpolled.
#[derive(Debug)]
struct CompletionGuard {
    id: AsyncUnitId,
    tracker: TaskTracker,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.tracker.on_unit_completed(self.id);
    }
}

/// A unit that has been created but not necessarily started.
///
/// Dropping the handle (or the future returned by [`Unit::run`]) completes
/// the unit.
#[derive(Debug)]
pub struct Unit {
    id: AsyncUnitId,
    guard: CompletionGuard,
}

impl Unit {
    /// Allocate a unit and emit its creation event.
    pub(crate) fn open(tracker: &TaskTracker, parent: Option<AsyncUnitId>) -> Self {
        let id = AsyncUnitId::next();
        tracker.on_unit_created(id, parent);
        Self {
            id,
            guard: CompletionGuard {
                id,
                tracker: tracker.clone(),
            },
        }
    }

    pub fn id(&self) -> AsyncUnitId {
        self.id
    }

    /// Run synchronous code as this unit.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT_UNIT.sync_scope(self.id, f)
    }

    /// Drive `fut` as this unit, completing the unit when it resolves.
    pub fn run<F>(self, fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        async move {
            let Unit { id, guard } = self;
            let output = CURRENT_UNIT.scope(id, fut).await;
            drop(guard);
            output
        }
    }
}
