//! The context record shared by one causal subtree of units.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

/// Mutable bundle shared by reference across every unit descending from the
/// unit that opened it.
///
/// The correlation id and session fields are fixed at creation. Hop and data
/// are interior-mutable so a write made by any unit is seen by all others
/// holding the same record.
#[derive(Debug)]
pub struct ContextRecord {
    correlation_id: String,
    hop: AtomicU32,
    session: Option<String>,
    session_group: Option<String>,
    data: RwLock<Map<String, Value>>,
}

/// Point-in-time copy of a record's propagation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub hop: u32,
    pub session: Option<String>,
    pub session_group: Option<String>,
}

impl ContextRecord {
    /// Create a record with hop 0, no session and empty data.
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            hop: AtomicU32::new(0),
            session: None,
            session_group: None,
            data: RwLock::new(Map::new()),
        }
    }

    pub fn with_hop(self, hop: u32) -> Self {
        self.hop.store(hop, Ordering::Relaxed);
        self
    }

    pub fn with_session(mut self, session: Option<String>) -> Self {
        self.session = session;
        self
    }

    pub fn with_session_group(mut self, session_group: Option<String>) -> Self {
        self.session_group = session_group;
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn hop(&self) -> u32 {
        self.hop.load(Ordering::Relaxed)
    }

    /// Overwrite the hop count seen by every unit sharing this record.
    pub fn set_hop(&self, hop: u32) {
        self.hop.store(hop, Ordering::Relaxed);
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn session_group(&self) -> Option<&str> {
        self.session_group.as_deref()
    }

    /// Insert or replace one data entry.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        // A poisoned lock only means another writer panicked mid-insert;
        // the map itself is still usable.
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.get(key).cloned()
    }

    /// Snapshot of the whole data mapping (empty if nothing was written).
    pub fn data(&self) -> Map<String, Value> {
        self.data.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            hop: self.hop(),
            session: self.session.clone(),
            session_group: self.session_group.clone(),
        }
    }
}
