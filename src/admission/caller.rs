//! Caller identification for admission control.
//!
//! Callers presenting a configured API key are keyed by that key and share
//! the `api_key` class; everyone else, including callers sending a key that
//! is not configured, is keyed by client IP in the `anonymous` class.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::config::AdmissionConfig;

/// Class name for callers identified by client IP.
pub const ANONYMOUS_CLASS: &str = "anonymous";
/// Class name for callers presenting an API key.
pub const API_KEY_CLASS: &str = "api_key";

/// Rate-limit subject of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Bucket key, e.g. `ip:10.0.0.7` or `key:abc123`.
    pub key: String,
    /// Policy class the bucket belongs to.
    pub class: &'static str,
}

impl CallerIdentity {
    /// Identify the caller from the request headers and peer address.
    ///
    /// Only keys listed in `admission.api_keys` get their own bucket, so a
    /// client cannot mint fresh buckets by inventing keys.
    pub fn identify(headers: &HeaderMap, admission: &AdmissionConfig, peer: Option<SocketAddr>) -> Self {
        let api_key = headers
            .get(admission.api_key_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| admission.api_keys.contains(*v));

        match (api_key, peer) {
            (Some(key), _) => Self {
                key: format!("key:{}", key),
                class: API_KEY_CLASS,
            },
            (None, Some(addr)) => Self::anonymous(format!("ip:{}", addr.ip())),
            // No peer address (e.g. in-process service calls); everyone
            // shares one bucket rather than bypassing admission.
            (None, None) => Self::anonymous("ip:unknown".to_string()),
        }
    }

    fn anonymous(key: String) -> Self {
        Self {
            key,
            class: ANONYMOUS_CLASS,
        }
    }
}
