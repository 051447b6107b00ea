//! The JSON body sent on every error and rejection path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::context::CorrelationId;
use crate::errors::classifier::{ClassifiedError, ErrorKind};

/// Client-facing message for admission rejections.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Stable error body: `{"success": false, "error": ..., "correlationId": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    pub correlation_id: String,
    pub kind: ErrorKind,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorEnvelope {
    pub fn from_classified(classified: &ClassifiedError, correlation_id: &CorrelationId) -> Self {
        Self {
            success: false,
            error: classified.message.clone(),
            correlation_id: correlation_id.to_string(),
            kind: classified.kind,
            retryable: classified.retryable,
            detail: classified.detail.clone(),
        }
    }

    /// Render a classified failure with its own status code.
    pub fn render(classified: &ClassifiedError, correlation_id: &CorrelationId) -> Response {
        (
            classified.status,
            Json(Self::from_classified(classified, correlation_id)),
        )
            .into_response()
    }

    /// 429 body; the caller adds `Retry-After`.
    pub fn rate_limited(correlation_id: &CorrelationId) -> Response {
        let body = RateLimited {
            success: false,
            error: RATE_LIMITED_MESSAGE,
            correlation_id: correlation_id.as_str(),
            retryable: true,
        };
        (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
    }
}

// Rejections are a policy decision, not a classified failure, so they carry
// no `kind`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimited<'a> {
    success: bool,
    error: &'a str,
    correlation_id: &'a str,
    retryable: bool,
}
