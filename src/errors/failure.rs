//! Typed failures raised by route handlers.
//!
//! Handlers return `Result<_, GatewayError>`. Converting the error into a
//! response does not render it: the error rides out of the handler in a
//! [`HandlerFailure`] response extension and the pipeline classifies it,
//! because only the pipeline knows the correlation ID and deployment mode.

use std::sync::Arc;

use axum::extract::rejection::{
    BytesRejection, FormRejection, JsonRejection, PathRejection, QueryRejection, StringRejection,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::errors::classifier::ErrorKind;

/// Failure raised by a route handler or by pipeline bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UpstreamTimeout(String),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Internal(String),

    /// Any other error; classified by inspecting the wrapped error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn upstream_timeout(msg: impl Into<String>) -> Self {
        Self::UpstreamTimeout(msg.into())
    }

    pub fn upstream_unavailable(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an arbitrary error for classification.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }

    /// Typed failure of the given kind; used to envelope bare error
    /// responses produced outside a handler (router fallbacks, framework
    /// layers).
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::Unauthorized => Self::Unauthorized(message),
            ErrorKind::Forbidden => Self::Forbidden(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::MethodNotAllowed => Self::MethodNotAllowed(message),
            ErrorKind::PayloadTooLarge => Self::PayloadTooLarge(message),
            ErrorKind::UpstreamTimeout => Self::UpstreamTimeout(message),
            ErrorKind::UpstreamUnavailable => Self::UpstreamUnavailable(message),
            ErrorKind::Internal => Self::Internal(message),
        }
    }

    /// Kind of a typed variant; `None` for [`GatewayError::Other`].
    pub fn kind(&self) -> Option<ErrorKind> {
        let kind = match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            Self::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
            Self::UpstreamTimeout(_) => ErrorKind::UpstreamTimeout,
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Other(_) => return None,
        };
        Some(kind)
    }
}

macro_rules! rejection_into_gateway_error {
    ($($rejection:ty),* $(,)?) => {
        $(
            impl From<$rejection> for GatewayError {
                fn from(rejection: $rejection) -> Self {
                    Self::other(rejection)
                }
            }
        )*
    };
}

rejection_into_gateway_error!(
    JsonRejection,
    QueryRejection,
    PathRejection,
    FormRejection,
    BytesRejection,
    StringRejection,
);

impl From<std::io::Error> for GatewayError {
    fn from(error: std::io::Error) -> Self {
        Self::other(error)
    }
}

impl From<tokio::time::error::Elapsed> for GatewayError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::other(error)
    }
}

/// Response extension carrying a handler failure to the pipeline.
#[derive(Debug, Clone)]
pub struct HandlerFailure(pub Arc<dyn std::error::Error + Send + Sync + 'static>);

impl HandlerFailure {
    pub fn error(&self) -> &(dyn std::error::Error + 'static) {
        &*self.0
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self
            .kind()
            .map(|k| k.status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = status.into_response();
        response
            .extensions_mut()
            .insert(HandlerFailure(Arc::new(self)));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_response_carries_failure() {
        let response = GatewayError::upstream_timeout("orders service slow").into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let failure = response.extensions().get::<HandlerFailure>().unwrap();
        assert_eq!(failure.error().to_string(), "orders service slow");
    }

    #[test]
    fn test_from_kind_round_trips_status() {
        for kind in ErrorKind::ALL {
            let err = GatewayError::from_kind(kind, "x");
            assert_eq!(err.kind(), Some(kind));
            assert_eq!(err.into_response().status(), kind.status());
        }
    }

    #[test]
    fn test_other_has_no_direct_kind() {
        let err = GatewayError::other(std::fmt::Error);
        assert!(err.kind().is_none());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
