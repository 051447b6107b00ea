//! Correlation ID handling and the per-request context.
//!
//! # Responsibilities
//! - Reuse an inbound `X-Correlation-ID` verbatim, or generate a UUID v4
//! - Bind a `tracing` span carrying the ID (the request's logging sink)
//! - Expose the context to handlers as an extractor
//!
//! # Design Decisions
//! - The context is a value carried in request extensions, never global state
//! - Unusable inbound headers are replaced, not rejected

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue};
use tracing::Span;
use uuid::Uuid;

use crate::admission::CallerIdentity;
use crate::errors::GatewayError;

/// Header carrying the correlation ID in both directions.
pub static X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

const NIL_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Identifier tying a client request to server-side logs.
#[derive(Clone, PartialEq, Eq)]
pub struct CorrelationId {
    value: Arc<str>,
    header: HeaderValue,
}

impl CorrelationId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        let value = Uuid::new_v4().to_string();
        match HeaderValue::from_str(&value) {
            Ok(header) => Self {
                value: value.into(),
                header,
            },
            // Unreachable for a hyphenated UUID; keeps value and header equal.
            Err(_) => Self {
                value: NIL_ID.into(),
                header: HeaderValue::from_static(NIL_ID),
            },
        }
    }

    /// Reuse an inbound header value if it can be echoed back unchanged.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let text = value.to_str().ok()?;
        if text.is_empty() {
            return None;
        }
        Some(Self {
            value: text.into(),
            header: value.clone(),
        })
    }

    /// Use the inbound header when present and usable, otherwise generate.
    pub fn from_headers(headers: &HeaderMap) -> (Self, Provenance) {
        match headers.get(&X_CORRELATION_ID) {
            Some(value) => match Self::from_header(value) {
                Some(id) => (id, Provenance::Propagated),
                None => (Self::generate(), Provenance::ReplacedMalformed),
            },
            None => (Self::generate(), Provenance::Generated),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn header_value(&self) -> HeaderValue {
        self.header.clone()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({})", self.value)
    }
}

/// Where a correlation ID came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Propagated,
    Generated,
    ReplacedMalformed,
}

/// Everything the pipeline knows about one request.
///
/// Created once at pipeline entry and never modified afterwards.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    start_time: Instant,
    caller: CallerIdentity,
    span: Span,
}

impl RequestContext {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn caller_key(&self) -> &str {
        &self.caller.key
    }

    pub fn caller_class(&self) -> &'static str {
        self.caller.class
    }

    /// Logging sink bound to this request's correlation ID.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Build the context for an inbound request.
pub fn attach(headers: &HeaderMap, caller: CallerIdentity) -> RequestContext {
    let (correlation_id, provenance) = CorrelationId::from_headers(headers);
    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        caller = %caller.key,
    );

    if provenance == Provenance::ReplacedMalformed {
        span.in_scope(|| {
            tracing::debug!("Inbound correlation header unusable, generated a new one");
        });
    }

    RequestContext {
        correlation_id,
        start_time: Instant::now(),
        caller,
        span,
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| GatewayError::internal("request context missing, handler mounted outside the pipeline"))
    }
}
