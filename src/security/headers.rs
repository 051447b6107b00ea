//! Security response headers.
//!
//! # Responsibilities
//! - Add `X-Content-Type-Options`, `X-Frame-Options` and `Referrer-Policy`
//!   to every response, error envelopes included
//!
//! # Design Decisions
//! - Values set by a handler are kept (`if_not_present`)

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityConfig;

pub fn apply_security_headers(router: Router, config: &SecurityConfig) -> Router {
    if !config.enable_headers {
        return router;
    }

    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
}
