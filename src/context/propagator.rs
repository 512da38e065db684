//! The context service: unit creation plus accessors against the record of
//! the presently executing unit.

use serde_json::{Map, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::future::Future;
use std::panic::Location;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

use crate::context::record::{ContextRecord, Metadata};
use crate::context::store::ContextStore;
use crate::context::token::{self, TokenGenerator, UuidTokens};
use crate::context::tracker::TaskTracker;
use crate::context::unit::{AsyncUnitId, Unit};
use crate::error::ContextError;
use crate::observability::metrics;

/// Hop value reported by [`Propagator::hop_or_unset`] when no context is open.
pub const HOP_UNSET: i64 = -1;

static GLOBAL: OnceLock<Propagator> = OnceLock::new();

/// Owns the store, the tracker feeding it, and the token generator.
///
/// One instance normally serves the whole process: see [`Propagator::global`]
/// and [`Propagator::try_init`]. Separate instances are independent and are
/// mostly useful in tests.
#[derive(Debug)]
pub struct Propagator {
    tracker: TaskTracker,
    tokens: Arc<dyn TokenGenerator>,
}

impl Default for Propagator {
    fn default() -> Self {
        Self::new()
    }
}

impl Propagator {
    pub fn new() -> Self {
        Self::with_token_generator(Arc::new(UuidTokens))
    }

    pub fn with_token_generator(tokens: Arc<dyn TokenGenerator>) -> Self {
        Self {
            tracker: TaskTracker::new(Arc::new(ContextStore::new())),
            tokens,
        }
    }

    /// The process-wide propagator, created with defaults on first use.
    pub fn global() -> &'static Propagator {
        GLOBAL.get_or_init(Propagator::new)
    }

    /// Install `propagator` as the process-wide instance.
    ///
    /// Only the first call (or first [`Propagator::global`] access) wins;
    /// later calls leave the installed instance in place and report
    /// [`ContextError::AlreadyInitialized`].
    pub fn try_init(propagator: Propagator) -> Result<&'static Propagator, ContextError> {
        let mut installed = false;
        let global = GLOBAL.get_or_init(|| {
            installed = true;
            propagator
        });
        if installed {
            tracing::debug!("Request context propagator initialized");
            Ok(global)
        } else {
            tracing::debug!("Request context propagator already initialized; keeping existing");
            Err(ContextError::AlreadyInitialized)
        }
    }

    pub fn store(&self) -> &ContextStore {
        self.tracker.store()
    }

    pub fn tokens(&self) -> &dyn TokenGenerator {
        self.tokens.as_ref()
    }

    pub(crate) fn token_source(&self) -> Arc<dyn TokenGenerator> {
        self.tokens.clone()
    }

    /// Create a unit whose causal parent is the unit executing now.
    pub fn child_unit(&self) -> Unit {
        Unit::open(&self.tracker, AsyncUnitId::current())
    }

    /// Create a unit with no causal parent.
    pub fn root_unit(&self) -> Unit {
        Unit::open(&self.tracker, None)
    }

    /// Run `fut` as a child unit of the current one.
    pub fn instrument<F>(&self, fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        self.child_unit().run(fut)
    }

    /// Run `fut` as a fresh root unit that inherits nothing.
    pub fn root<F>(&self, fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        self.root_unit().run(fut)
    }

    /// `tokio::spawn` that keeps the spawned task in the caller's subtree.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(self.instrument(fut))
    }

    /// `tokio::task::spawn_blocking` running `f` as a child unit of the caller.
    ///
    /// The unit is created here, so `f` sees the caller's record even if it
    /// starts after the caller has moved on. It completes once `f` returns.
    pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let unit = self.child_unit();
        tokio::task::spawn_blocking(move || unit.enter(f))
    }

    /// Register a brand-new record for `unit`.
    ///
    /// If the unit already holds a record (inherited or opened earlier) that
    /// record is kept and returned instead.
    pub fn open(&self, unit: &Unit, record: ContextRecord) -> Arc<ContextRecord> {
        self.store().insert_if_absent(unit.id(), Arc::new(record))
    }

    /// Record of the presently executing unit. Never creates one.
    pub fn current_record(&self) -> Option<Arc<ContextRecord>> {
        AsyncUnitId::current().and_then(|unit| self.store().get(unit))
    }

    /// Correlation id of the current record, if one is open.
    pub fn request_id(&self) -> Option<String> {
        self.current_record()
            .map(|record| record.correlation_id().to_string())
    }

    /// Correlation id of the current record, opening a new record with hop 0
    /// for the current unit if there is none.
    ///
    /// Outside any unit there is nothing to own a record, so a fresh id is
    /// returned without being registered.
    #[track_caller]
    pub fn get_or_create(&self, prefix: Option<&str>) -> String {
        let Some(unit) = AsyncUnitId::current() else {
            warn_missing("get_or_create", "Called outside any tracked unit; id will not propagate");
            return token::correlation_id(self.tokens(), prefix);
        };

        if let Some(record) = self.store().get(unit) {
            return record.correlation_id().to_string();
        }

        let id = token::correlation_id(self.tokens(), prefix);
        let record = self
            .store()
            .insert_if_absent(unit, Arc::new(ContextRecord::new(id)));
        tracing::debug!(unit = %unit, request_id = %record.correlation_id(), "Opened request context");
        record.correlation_id().to_string()
    }

    /// Set one data entry on the current record. Without a record this only
    /// logs a warning.
    #[track_caller]
    pub fn set_data(&self, key: impl Into<String>, value: impl Into<Value>) {
        match self.current_record() {
            Some(record) => record.insert(key, value.into()),
            None => warn_missing("set_data", "No request context open; value dropped"),
        }
    }

    /// One data entry of the current record.
    #[track_caller]
    pub fn get_data(&self, key: &str) -> Option<Value> {
        match self.current_record() {
            Some(record) => record.get(key),
            None => {
                warn_missing("get_data", "No request context open");
                None
            }
        }
    }

    /// The whole data mapping of the current record (empty if never written).
    #[track_caller]
    pub fn data(&self) -> Option<Map<String, Value>> {
        match self.current_record() {
            Some(record) => Some(record.data()),
            None => {
                warn_missing("get_data", "No request context open");
                None
            }
        }
    }

    pub fn hop(&self) -> Option<u32> {
        self.current_record().map(|record| record.hop())
    }

    /// Current hop, or [`HOP_UNSET`] when no context is open.
    pub fn hop_or_unset(&self) -> i64 {
        self.hop().map_or(HOP_UNSET, i64::from)
    }

    pub fn metadata(&self) -> Option<Metadata> {
        self.current_record().map(|record| record.metadata())
    }
}

/// Report an accessor used with no open context. Carries the caller's
/// location and a backtrace (captured when `RUST_BACKTRACE` is set).
#[track_caller]
fn warn_missing(operation: &'static str, message: &'static str) {
    let location = Location::caller();
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        tracing::warn!(
            operation,
            location = %location,
            backtrace = %backtrace,
            "{}",
            message
        );
    } else {
        tracing::warn!(operation, location = %location, "{}", message);
    }
    metrics::record_missing_context(operation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Counter(std::sync::atomic::AtomicUsize);

    impl TokenGenerator for Counter {
        fn generate(&self) -> String {
            let n = self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            format!("t{}", n)
        }
    }

    #[test]
    fn test_no_record_outside_units() {
        let propagator = Propagator::new();
        assert!(propagator.current_record().is_none());
        assert_eq!(propagator.hop(), None);
        assert_eq!(propagator.hop_or_unset(), HOP_UNSET);
        assert!(propagator.metadata().is_none());
        assert!(propagator.get_data("k").is_none());
        assert!(propagator.data().is_none());
    }

    #[test]
    fn test_get_or_create_outside_unit_registers_nothing() {
        let propagator = Propagator::with_token_generator(Arc::new(Counter::default()));
        assert_eq!(propagator.get_or_create(Some("svc")), "svc-t0");
        assert!(propagator.store().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable_within_unit() {
        let propagator = Propagator::with_token_generator(Arc::new(Counter::default()));

        let (first, second, data) = propagator
            .root(async {
                let first = propagator.get_or_create(None);
                tokio::task::yield_now().await;
                let second = propagator.get_or_create(Some("ignored"));
                (first, second, propagator.data())
            })
            .await;

        assert_eq!(first, "t0");
        assert_eq!(first, second);
        assert_eq!(data, Some(Map::new()));
        assert!(propagator.store().is_empty());
    }

    #[tokio::test]
    async fn test_data_round_trip_in_subtree() {
        let propagator = Propagator::new();

        let value = propagator
            .root(async {
                propagator.get_or_create(None);
                propagator.set_data("k", "v");
                propagator
                    .instrument(async { (propagator.get_data("k"), propagator.data()) })
                    .await
            })
            .await;

        let mut expected = Map::new();
        expected.insert("k".into(), json!("v"));
        assert_eq!(value, (Some(json!("v")), Some(expected)));
    }

    #[tokio::test]
    async fn test_root_does_not_inherit() {
        let propagator = Propagator::new();

        let (outer, inner) = propagator
            .root(async {
                let outer = propagator.get_or_create(None);
                let inner = propagator.root(async { propagator.request_id() }).await;
                (outer, inner)
            })
            .await;

        assert!(!outer.is_empty());
        assert_eq!(inner, None);
    }

    #[tokio::test]
    async fn test_spawn_blocking_inherits_and_releases() {
        let propagator: &'static Propagator = Box::leak(Box::new(Propagator::new()));

        let (outer, inner) = propagator
            .root(async {
                let outer = propagator.get_or_create(None);
                let inner = propagator
                    .spawn_blocking(|| (propagator.request_id(), AsyncUnitId::current()))
                    .await
                    .unwrap();
                (outer, inner)
            })
            .await;

        let (id, unit) = inner;
        assert_eq!(id, Some(outer));
        assert!(!propagator.store().contains(unit.unwrap()));
        assert!(propagator.store().is_empty());
    }

    #[tokio::test]
    async fn test_open_keeps_existing_record() {
        let propagator = Propagator::new();
        let unit = propagator.root_unit();

        let first = propagator.open(&unit, ContextRecord::new("a"));
        let second = propagator.open(&unit, ContextRecord::new("b"));

        assert!(Arc::ptr_eq(&first, &second));
        drop(unit);
        assert!(propagator.store().is_empty());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = Propagator::global();
        assert!(matches!(
            Propagator::try_init(Propagator::new()),
            Err(ContextError::AlreadyInitialized)
        ));
    }
}
