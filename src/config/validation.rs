//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate header name and id prefix against HTTP rules
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ContextOptions, ServiceConfig};
use crate::http::headers::ContextHeaders;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }

    errors.extend(validate_options(&config.context));

    if let Some(url) = &config.downstream.url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "downstream.url",
                format!("must start with http:// or https://: {}", url),
            ));
        }
    }
    if config.downstream.timeout_secs == 0 {
        errors.push(ValidationError::new("downstream.timeout_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks shared with [`crate::http::CorrelationLayer::try_new`].
pub fn validate_options(options: &ContextOptions) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if let Err(e) = ContextHeaders::from_options(options) {
        errors.push(ValidationError::new("context.header_name", e.to_string()));
    }
    if let Some(prefix) = &options.prefix {
        if !ContextHeaders::is_valid_prefix(prefix) {
            errors.push(ValidationError::new(
                "context.prefix",
                "must contain only visible ASCII characters",
            ));
        }
    }
    errors
}
