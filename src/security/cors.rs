//! Cross-origin policy for the browser client.
//!
//! Credentials are allowed by default, so every list is explicit: browsers
//! refuse wildcards on credentialed requests.

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::context::X_CORRELATION_ID;

/// Build the CORS layer. `api_key_header` is added to the allowed request headers.
pub fn cors_layer(config: &CorsConfig, api_key_header: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Skipping unusable CORS origin");
                None
            }
        })
        .collect();

    let mut allow_headers = vec![
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        X_CORRELATION_ID.clone(),
    ];
    if let Ok(name) = HeaderName::from_bytes(api_key_header.as_bytes()) {
        allow_headers.push(name);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(allow_headers)
        .expose_headers([X_CORRELATION_ID.clone(), header::RETRY_AFTER])
        .allow_credentials(config.allow_credentials)
}
