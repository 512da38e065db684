//! HTTP integration subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → middleware.rs (read headers, open root unit + record)
//!     → handler (accessors, spawned children inherit the record)
//!     → outbound.rs (downstream headers, hop + 1)
//!     → middleware.rs (write context headers onto the response)
//! ```

pub mod headers;
pub mod middleware;
pub mod outbound;
pub mod server;

pub use headers::{
    ContextHeaders, DEFAULT_HEADER_NAME, X_REQUEST_HOP, X_REQUEST_SESSION_GROUP_ID,
    X_REQUEST_SESSION_ID,
};
pub use middleware::{CorrelationLayer, CorrelationService};
pub use outbound::{outbound_headers, PropagateContext};
pub use server::HttpServer;
