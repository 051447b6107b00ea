//! Failure classification.
//!
//! Maps any failure to a fixed `(status, kind, message, retryable)` tuple.
//! Classification walks the error's `source()` chain and stops at the first
//! error it recognizes; anything unrecognized is `Internal`.

use std::io;

use axum::extract::rejection::{
    BytesRejection, FormRejection, JsonRejection, PathRejection, QueryRejection, StringRejection,
};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::errors::failure::GatewayError;

/// Sources deeper than this are ignored; guards against cyclic chains.
const MAX_CHAIN_DEPTH: usize = 32;

/// Stable client-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    UpstreamTimeout,
    UpstreamUnavailable,
    Internal,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::Validation,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::MethodNotAllowed,
        ErrorKind::PayloadTooLarge,
        ErrorKind::UpstreamTimeout,
        ErrorKind::UpstreamUnavailable,
        ErrorKind::Internal,
    ];

    /// The kind whose status is exactly `status`, if there is one.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.status() == status)
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::UpstreamTimeout | ErrorKind::UpstreamUnavailable)
    }

    /// Message used when the failure has none, or must not be shown.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not found",
            ErrorKind::MethodNotAllowed => "Method not allowed",
            ErrorKind::PayloadTooLarge => "Payload too large",
            ErrorKind::UpstreamTimeout => "Upstream service timed out",
            ErrorKind::UpstreamUnavailable => "Upstream service unavailable",
            ErrorKind::Internal => "Internal Server Error",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

/// A failure reduced to what the client is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    /// Diagnostic text, only populated in development mode.
    pub detail: Option<String>,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, message: Option<String>, detail: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_message().to_string());
        Self {
            status: kind.status(),
            kind,
            message,
            retryable: kind.retryable(),
            detail,
        }
    }

    /// Classification of a failure with no usable information at all.
    pub fn internal(detail: Option<String>) -> Self {
        Self::new(ErrorKind::Internal, None, detail)
    }
}

/// Classify a failure. Never panics and never fails.
pub fn classify(failure: &(dyn std::error::Error + 'static), mode: Mode) -> ClassifiedError {
    let detail = mode.is_development().then(|| error_chain(failure));

    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(failure);
    for _ in 0..MAX_CHAIN_DEPTH {
        let Some(err) = current else { break };

        if let Some(GatewayError::Other(inner)) = err.downcast_ref::<GatewayError>() {
            let inner: &(dyn std::error::Error + 'static) = &**inner;
            current = Some(inner);
            continue;
        }

        if let Some(kind) = recognize(err) {
            let message = if kind == ErrorKind::Internal {
                None
            } else {
                Some(err.to_string())
            };
            return ClassifiedError::new(kind, message, detail);
        }

        current = err.source();
    }

    ClassifiedError::internal(detail)
}

fn recognize(err: &(dyn std::error::Error + 'static)) -> Option<ErrorKind> {
    if let Some(gateway) = err.downcast_ref::<GatewayError>() {
        return gateway.kind();
    }
    if err.is::<tokio::time::error::Elapsed>() {
        return Some(ErrorKind::UpstreamTimeout);
    }
    if let Some(io) = err.downcast_ref::<io::Error>() {
        return match io.kind() {
            io::ErrorKind::TimedOut => Some(ErrorKind::UpstreamTimeout),
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => Some(ErrorKind::UpstreamUnavailable),
            _ => None,
        };
    }
    rejection_status(err).map(|status| match status {
        StatusCode::PAYLOAD_TOO_LARGE => ErrorKind::PayloadTooLarge,
        s if s.is_client_error() => ErrorKind::Validation,
        _ => ErrorKind::Internal,
    })
}

fn rejection_status(err: &(dyn std::error::Error + 'static)) -> Option<StatusCode> {
    macro_rules! status_of {
        ($($rejection:ty),*) => {
            $(
                if let Some(r) = err.downcast_ref::<$rejection>() {
                    return Some(r.status());
                }
            )*
        };
    }
    status_of!(
        JsonRejection,
        QueryRejection,
        PathRejection,
        FormRejection,
        BytesRejection,
        StringRejection
    );
    None
}

/// `outer: inner: innermost`, bounded like the classification walk.
fn error_chain(failure: &(dyn std::error::Error + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(failure);
    for _ in 0..MAX_CHAIN_DEPTH {
        let Some(err) = current else { break };
        let text = err.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        current = err.source();
    }
    let joined = parts.join(": ");
    if joined.is_empty() {
        "<no message>".to_string()
    } else {
        joined
    }
}
