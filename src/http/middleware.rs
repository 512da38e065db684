//! Correlation middleware.
//!
//! Every inbound request runs as a new root unit holding a brand-new record,
//! adopted from the request's context headers or synthesized. The record's
//! headers are written onto the response once the inner service succeeds.
//! Store cleanup is left entirely to the unit's completion event.

use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

use crate::config::ContextOptions;
use crate::context::token::{self, TokenGenerator};
use crate::context::{ContextRecord, Propagator};
use crate::error::ContextError;
use crate::http::headers::{ContextHeaders, InboundContext};
use crate::observability::metrics;

/// Layer that applies [`CorrelationService`].
#[derive(Clone, Debug)]
pub struct CorrelationLayer {
    headers: ContextHeaders,
    prefix: Option<String>,
    tokens: Arc<dyn TokenGenerator>,
    propagator: &'static Propagator,
}

impl CorrelationLayer {
    /// Layer with default header names and no id prefix.
    pub fn new() -> Self {
        let propagator = Propagator::global();
        Self {
            headers: ContextHeaders::default(),
            prefix: None,
            tokens: propagator.token_source(),
            propagator,
        }
    }

    pub fn try_new(options: &ContextOptions) -> Result<Self, ContextError> {
        let headers = ContextHeaders::from_options(options)?;
        if let Some(prefix) = &options.prefix {
            if !ContextHeaders::is_valid_prefix(prefix) {
                return Err(ContextError::InvalidPrefix {
                    prefix: prefix.clone(),
                });
            }
        }
        Ok(Self {
            headers,
            prefix: options.prefix.clone(),
            ..Self::new()
        })
    }

    /// Use `tokens` instead of the propagator's generator for synthesized ids.
    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Register records with `propagator` instead of the global one, and
    /// take its token generator.
    pub fn with_propagator(mut self, propagator: &'static Propagator) -> Self {
        self.tokens = propagator.token_source();
        self.propagator = propagator;
        self
    }

    pub fn headers(&self) -> &ContextHeaders {
        &self.headers
    }
}

impl Default for CorrelationLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service opening a request context around its inner service.
#[derive(Clone, Debug)]
pub struct CorrelationService<S> {
    inner: S,
    layer: CorrelationLayer,
}

impl<S> CorrelationService<S> {
    fn record_for(&self, inbound: InboundContext) -> ContextRecord {
        match inbound.correlation_id {
            Some(id) => ContextRecord::new(id)
                .with_hop(inbound.hop)
                .with_session(inbound.session)
                .with_session_group(inbound.session_group),
            None => ContextRecord::new(token::correlation_id(
                self.layer.tokens.as_ref(),
                self.layer.prefix.as_deref(),
            )),
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let inbound = self.layer.headers.read(request.headers());
        let adopted = inbound.correlation_id.is_some();
        let record = self.record_for(inbound);

        let propagator = self.layer.propagator;
        let unit = propagator.root_unit();
        let record = propagator.open(&unit, record);
        metrics::record_request(adopted);

        let span = tracing::info_span!(
            "request",
            request_id = %record.correlation_id(),
            hop = record.hop(),
        );
        tracing::debug!(
            parent: &span,
            adopted,
            method = %request.method(),
            path = %request.uri().path(),
            "Request context opened"
        );

        let inner = &mut self.inner;
        let future = span.in_scope(|| unit.enter(|| inner.call(request)));
        let headers = self.layer.headers.clone();

        Box::pin(
            unit.run(async move {
                let mut response = future.await?;
                headers.write_record(response.headers_mut(), &record);
                Ok(response)
            })
            .instrument(span),
        )
    }
}
