//! Request context propagation.
//!
//! # Data Flow
//! ```text
//! unit created (child, causal parent)
//!     → tracker.rs (copy parent's record reference, if any)
//!     → store.rs (unit → Arc<ContextRecord>)
//! accessor call
//!     → unit.rs (which unit is executing?)
//!     → store.rs lookup
//!     → record.rs (shared, mutable)
//! unit completed / dropped
//!     → tracker.rs removes the entry
//! ```
//!
//! # Design Decisions
//! - A unit is one tracked future; its id rides in a task-local for every poll
//! - Records are shared by `Arc`, never copied, so writes reach the subtree
//! - Missing context is an absent value plus a warning, never an error
//!
//! The free functions below act on [`Propagator::global`].

pub mod propagator;
pub mod record;
pub mod store;
pub mod token;
pub mod tracker;
pub mod unit;

pub use propagator::{Propagator, HOP_UNSET};
pub use record::{ContextRecord, Metadata};
pub use store::ContextStore;
pub use token::{TokenGenerator, UuidTokens};
pub use tracker::TaskTracker;
pub use unit::{AsyncUnitId, Unit};

use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub fn current_record() -> Option<Arc<ContextRecord>> {
    Propagator::global().current_record()
}

pub fn request_id() -> Option<String> {
    Propagator::global().request_id()
}

#[track_caller]
pub fn get_or_create(prefix: Option<&str>) -> String {
    Propagator::global().get_or_create(prefix)
}

#[track_caller]
pub fn set_data(key: impl Into<String>, value: impl Into<Value>) {
    Propagator::global().set_data(key, value)
}

#[track_caller]
pub fn get_data(key: &str) -> Option<Value> {
    Propagator::global().get_data(key)
}

#[track_caller]
pub fn data() -> Option<Map<String, Value>> {
    Propagator::global().data()
}

pub fn hop() -> Option<u32> {
    Propagator::global().hop()
}

pub fn metadata() -> Option<Metadata> {
    Propagator::global().metadata()
}

pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Propagator::global().spawn(fut)
}

pub fn spawn_blocking<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    Propagator::global().spawn_blocking(f)
}

pub fn instrument<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    Propagator::global().instrument(fut)
}

pub fn root<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    Propagator::global().root(fut)
}
