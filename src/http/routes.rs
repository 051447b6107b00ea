//! Built-in gateway routes.

use axum::http::Uri;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::GatewayError;

const SERVICE: &str = "bff";

#[derive(Debug, Serialize)]
struct Probe {
    status: &'static str,
    timestamp: String,
    service: &'static str,
}

impl Probe {
    fn now(status: &'static str) -> Self {
        Self {
            status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            service: SERVICE,
        }
    }
}

/// `/health`, `/ready` and `/`.
pub fn builtin() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/", get(info))
}

async fn health() -> Json<Probe> {
    Json(Probe::now("healthy"))
}

// No backend connectivity checks yet; readiness equals liveness.
async fn ready() -> Json<Probe> {
    Json(Probe::now("ready"))
}

async fn info() -> Json<Value> {
    Json(json!({
        "name": "E-Commerce BFF API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Backend for Frontend - Orchestrates microservices",
        "endpoints": {
            "health": "/health",
            "ready": "/ready",
            "api": "/api/*",
        },
    }))
}

pub async fn not_found(uri: Uri) -> GatewayError {
    GatewayError::not_found(format!("Route {} not found", uri.path()))
}
