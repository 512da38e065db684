//! Context header names and their encoding on `HeaderMap`s.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ContextOptions;
use crate::context::ContextRecord;
use crate::error::ContextError;

/// Default header carrying the correlation id.
pub const DEFAULT_HEADER_NAME: &str = "x-request-id";
/// Forward count.
pub const X_REQUEST_HOP: HeaderName = HeaderName::from_static("x-request-hop");
/// Optional session identifier.
pub const X_REQUEST_SESSION_ID: HeaderName = HeaderName::from_static("x-request-session-id");
/// Optional session-group identifier.
pub const X_REQUEST_SESSION_GROUP_ID: HeaderName =
    HeaderName::from_static("x-request-session-group-id");

/// Context values read from an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundContext {
    pub correlation_id: Option<String>,
    pub hop: u32,
    pub session: Option<String>,
    pub session_group: Option<String>,
}

/// Header names in use for one integration. Only the correlation header
/// name is configurable.
#[derive(Debug, Clone)]
pub struct ContextHeaders {
    correlation: HeaderName,
}

impl Default for ContextHeaders {
    fn default() -> Self {
        Self {
            correlation: HeaderName::from_static(DEFAULT_HEADER_NAME),
        }
    }
}

impl ContextHeaders {
    pub fn new(correlation: Option<&str>) -> Result<Self, ContextError> {
        let Some(name) = correlation else {
            return Ok(Self::default());
        };
        // HeaderName parsing lowercases; reject anything it cannot represent.
        let correlation = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ContextError::InvalidHeaderName {
                name: name.to_string(),
            }
        })?;
        Ok(Self { correlation })
    }

    pub fn from_options(options: &ContextOptions) -> Result<Self, ContextError> {
        Self::new(options.header_name.as_deref())
    }

    /// A prefix is valid when `<prefix>-<token>` is always a valid header value.
    pub fn is_valid_prefix(prefix: &str) -> bool {
        prefix.bytes().all(|b| b.is_ascii_graphic())
    }

    pub fn correlation(&self) -> &HeaderName {
        &self.correlation
    }

    /// Read context headers. When no correlation id arrives the other
    /// headers are ignored, since they describe a context that is not being
    /// adopted.
    pub fn read(&self, headers: &HeaderMap) -> InboundContext {
        let Some(correlation_id) = non_empty(headers, &self.correlation) else {
            return InboundContext::default();
        };

        let hop = non_empty(headers, &X_REQUEST_HOP)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);

        InboundContext {
            correlation_id: Some(correlation_id),
            hop,
            session: non_empty(headers, &X_REQUEST_SESSION_ID),
            session_group: non_empty(headers, &X_REQUEST_SESSION_GROUP_ID),
        }
    }

    /// Write id and hop unconditionally, session headers only when present.
    pub fn write(
        &self,
        headers: &mut HeaderMap,
        correlation_id: &str,
        hop: u32,
        session: Option<&str>,
        session_group: Option<&str>,
    ) {
        set(headers, self.correlation.clone(), correlation_id);
        headers.insert(X_REQUEST_HOP, HeaderValue::from(hop));
        if let Some(session) = session.filter(|s| !s.is_empty()) {
            set(headers, X_REQUEST_SESSION_ID, session);
        }
        if let Some(group) = session_group.filter(|s| !s.is_empty()) {
            set(headers, X_REQUEST_SESSION_GROUP_ID, group);
        }
    }

    /// Write the headers describing `record` as it stands now.
    pub fn write_record(&self, headers: &mut HeaderMap, record: &ContextRecord) {
        self.write(
            headers,
            record.correlation_id(),
            record.hop(),
            record.session(),
            record.session_group(),
        );
    }
}

fn non_empty(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => {
            tracing::warn!(header = %name, "Context value is not a valid header value; skipped");
        }
    }
}
