//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while setting up context propagation.
///
/// Nothing on the request path returns these: a missing context degrades to
/// an absent value plus a warning instead.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The process-wide propagator was already installed.
    #[error("request context propagator already initialized")]
    AlreadyInitialized,

    /// The configured correlation header name is not a valid HTTP header name.
    #[error("invalid correlation header name {name:?}")]
    InvalidHeaderName { name: String },

    /// The configured id prefix cannot appear in an HTTP header value.
    #[error("invalid correlation id prefix {prefix:?}")]
    InvalidPrefix { prefix: String },
}

/// Errors raised while building the HTTP service.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("failed to build downstream client: {0}")]
    Client(#[from] reqwest::Error),
}
