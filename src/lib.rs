//! Request context propagation for async Rust services.
//!
//! A correlation id plus a small metadata bundle follows every unit of work
//! spawned while handling one request, and is forwarded to downstream calls
//! with an incremented hop count.

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod observability;

pub use config::{ContextOptions, ServiceConfig};
pub use context::{ContextRecord, Metadata, Propagator};
pub use error::ContextError;
pub use http::{CorrelationLayer, HttpServer, PropagateContext};
