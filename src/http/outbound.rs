//! Context headers for downstream calls.

use axum::http::HeaderMap;

use crate::context::Propagator;
use crate::http::headers::ContextHeaders;

impl Propagator {
    /// Headers for a call made on behalf of the current record: same id,
    /// hop + 1, sessions copied when present.
    ///
    /// Without a record the call still goes out, with an id from
    /// [`Propagator::get_or_create`] and hop 1.
    #[track_caller]
    pub fn outbound_headers(&self, names: &ContextHeaders) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self.current_record() {
            Some(record) => names.write(
                &mut headers,
                record.correlation_id(),
                record.hop().saturating_add(1),
                record.session(),
                record.session_group(),
            ),
            None => {
                let id = self.get_or_create(None);
                tracing::debug!(request_id = %id, "No request context for outbound call; sending hop 1");
                names.write(&mut headers, &id, 1, None, None);
            }
        }
        headers
    }
}

/// Build outbound headers from the global propagator with default names.
#[track_caller]
pub fn outbound_headers() -> HeaderMap {
    Propagator::global().outbound_headers(&ContextHeaders::default())
}

/// Attach the current context to an outgoing `reqwest` request.
pub trait PropagateContext {
    fn propagate_context(self) -> Self;

    fn propagate_context_with(self, names: &ContextHeaders) -> Self;
}

impl PropagateContext for reqwest::RequestBuilder {
    #[track_caller]
    fn propagate_context(self) -> Self {
        self.propagate_context_with(&ContextHeaders::default())
    }

    #[track_caller]
    fn propagate_context_with(self, names: &ContextHeaders) -> Self {
        self.headers(Propagator::global().outbound_headers(names))
    }
}
