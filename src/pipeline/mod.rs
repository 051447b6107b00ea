//! The request pipeline.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → stages::entry      (correlation context, panic guard, deadline)
//!     → CORS               (preflights answered here)
//!     → stages::admission  (token bucket per caller; 429 on deny)
//!     → body limit
//!     → route handler
//!     ← stages::entry      (classify failure once, envelope, X-Correlation-ID)
//! ```
//!
//! # Design Decisions
//! - Stage order is fixed by [`Pipeline::wrap`]; routes cannot reorder it
//! - Handlers never render errors, they return [`GatewayError`](crate::errors::GatewayError)
//! - Exactly one response per request, tracked by [`lifecycle::Lifecycle`]

pub mod lifecycle;
pub mod stages;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::admission::AdmissionController;
use crate::config::RuntimeSettings;

pub use lifecycle::{Lifecycle, Stage};

/// Shared state of both pipeline stages.
#[derive(Clone, Debug)]
pub struct PipelineState {
    pub settings: RuntimeSettings,
    pub admission: AdmissionController,
}

/// Builder that wraps application routes in the pipeline stages.
pub struct Pipeline {
    state: PipelineState,
    body_limit: usize,
    cors: Option<CorsLayer>,
}

impl Pipeline {
    pub fn new(settings: RuntimeSettings, admission: AdmissionController) -> Self {
        Self {
            state: PipelineState {
                settings,
                admission,
            },
            body_limit: 10 * 1024 * 1024,
            cors: None,
        }
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn cors(mut self, layer: CorsLayer) -> Self {
        self.cors = Some(layer);
        self
    }

    pub fn wrap(self, routes: Router) -> Router {
        let routes = routes
            .layer(RequestBodyLimitLayer::new(self.body_limit))
            .layer(DefaultBodyLimit::disable())
            .layer(from_fn_with_state(self.state.clone(), stages::admission));

        let routes = match self.cors {
            Some(cors) => routes.layer(cors),
            None => routes,
        };

        routes.layer(from_fn_with_state(self.state, stages::entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, Mode};
    use crate::context::RequestContext;
    use crate::errors::GatewayError;
    use axum::body::{Body, Bytes};
    use axum::http::{header, HeaderMap, Request, StatusCode};
    use axum::routing::{get, post};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "fine"
    }

    async fn slow_upstream() -> Result<&'static str, GatewayError> {
        Err(GatewayError::upstream_timeout("orders service did not answer"))
    }

    async fn broken() -> Result<&'static str, GatewayError> {
        Err(GatewayError::other(std::io::Error::other(
            "db password=hunter2 rejected",
        )))
    }

    async fn panics() -> &'static str {
        panic!("inventory cache corrupted");
    }

    async fn hangs() -> &'static str {
        tokio::time::sleep(Duration::from_secs(30)).await;
        "late"
    }

    async fn whoami(ctx: RequestContext) -> String {
        ctx.correlation_id().to_string()
    }

    async fn echo(body: Bytes) -> Result<Bytes, GatewayError> {
        Ok(body)
    }

    async fn conflict() -> (StatusCode, &'static str) {
        (StatusCode::CONFLICT, "version mismatch")
    }

    async fn downstream_busy() -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
        (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "5")], "downstream busy")
    }

    async fn maintenance() -> (StatusCode, &'static str) {
        (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance")
    }

    fn app(config: &GatewayConfig) -> Router {
        let routes = Router::new()
            .route("/ok", get(ok))
            .route("/health", get(ok))
            .route("/slow", get(slow_upstream))
            .route("/broken", get(broken))
            .route("/panic", get(panics))
            .route("/hang", get(hangs))
            .route("/whoami", get(whoami))
            .route("/echo", post(echo))
            .route("/conflict", get(conflict))
            .route("/busy", get(downstream_busy))
            .route("/maintenance", get(maintenance));

        Pipeline::new(RuntimeSettings::new(config), AdmissionController::in_memory())
            .body_limit(1024)
            .wrap(routes)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    fn get_req(path: &str) -> Request<Body> {
        Request::get(path).body(Body::empty()).unwrap()
    }

    fn json(body: &Bytes) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    fn correlation(headers: &HeaderMap) -> &str {
        headers.get("x-correlation-id").unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_success_gets_generated_correlation_id() {
        let app = app(&GatewayConfig::default());
        let (status, headers, body) = send(&app, get_req("/ok")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"fine");
        assert!(uuid::Uuid::parse_str(correlation(&headers)).is_ok());
    }

    #[tokio::test]
    async fn test_inbound_correlation_id_reaches_handler_and_response() {
        let app = app(&GatewayConfig::default());
        let request = Request::get("/whoami")
            .header("x-correlation-id", "trace-abc-123")
            .body(Body::empty())
            .unwrap();
        let (_, headers, body) = send(&app, request).await;
        assert_eq!(correlation(&headers), "trace-abc-123");
        assert_eq!(&body[..], b"trace-abc-123");
    }

    #[tokio::test]
    async fn test_rejects_past_capacity_with_retry_after() {
        let mut config = GatewayConfig::default();
        config.admission.default_policy.capacity = 2;
        config.admission.default_policy.refill_per_second = 0.5;
        let app = app(&config);

        for _ in 0..2 {
            assert_eq!(send(&app, get_req("/ok")).await.0, StatusCode::OK);
        }
        let (status, headers, body) = send(&app, get_req("/ok")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "2");

        let body = json(&body);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Too many requests, please try again later.");
        assert_eq!(body["correlationId"], correlation(&headers));
    }

    #[tokio::test]
    async fn test_api_keys_have_their_own_buckets() {
        let mut config = GatewayConfig::default();
        config.admission.default_policy.capacity = 1;
        config.admission.api_keys.insert("partner-7".to_string());
        let app = app(&config);

        assert_eq!(send(&app, get_req("/ok")).await.0, StatusCode::OK);
        assert_eq!(send(&app, get_req("/ok")).await.0, StatusCode::TOO_MANY_REQUESTS);

        let keyed = Request::get("/ok")
            .header("x-api-key", "partner-7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, keyed).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rotating_unknown_api_keys_does_not_bypass_admission() {
        let mut config = GatewayConfig::default();
        config.admission.default_policy.capacity = 1;
        config.admission.default_policy.refill_per_second = 0.01;
        config.admission.api_keys.insert("partner-7".to_string());
        let app = app(&config);

        let mut admitted = 0;
        for i in 0..20 {
            let request = Request::get("/ok")
                .header("x-api-key", format!("made-up-{}", i))
                .body(Body::empty())
                .unwrap();
            if send(&app, request).await.0 == StatusCode::OK {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_exempt_paths_skip_admission() {
        let mut config = GatewayConfig::default();
        config.admission.default_policy.capacity = 1;
        let app = app(&config);

        for _ in 0..5 {
            assert_eq!(send(&app, get_req("/health")).await.0, StatusCode::OK);
        }
        assert_eq!(send(&app, get_req("/ok")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_disabled_admission_never_rejects() {
        let mut config = GatewayConfig::default();
        config.admission.enabled = false;
        config.admission.default_policy.capacity = 1;
        let app = app(&config);

        for _ in 0..5 {
            assert_eq!(send(&app, get_req("/ok")).await.0, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_typed_failure_is_classified() {
        let app = app(&GatewayConfig::default());
        let (status, headers, body) = send(&app, get_req("/slow")).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let body = json(&body);
        assert_eq!(body["error"], "orders service did not answer");
        assert_eq!(body["retryable"], true);
        assert_eq!(body["kind"], "upstream_timeout");
        assert_eq!(body["correlationId"], correlation(&headers));
    }

    #[tokio::test]
    async fn test_unknown_failure_hidden_in_production() {
        let app = app(&GatewayConfig::default());
        let (status, _, body) = send(&app, get_req("/broken")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
        let body = json(&body);
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["retryable"], false);
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_development_mode_includes_detail() {
        let config = GatewayConfig {
            mode: Mode::Development,
            ..GatewayConfig::default()
        };
        let app = app(&config);
        let (_, _, body) = send(&app, get_req("/broken")).await;

        let body = json(&body);
        assert_eq!(body["error"], "Internal Server Error");
        assert!(body["detail"].as_str().unwrap().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_envelope() {
        let app = app(&GatewayConfig::default());
        let request = Request::get("/panic")
            .header("x-correlation-id", "panic-trace")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(correlation(&headers), "panic-trace");

        let body = json(&body);
        assert_eq!(body["correlationId"], "panic-trace");
        assert!(!body["error"].as_str().unwrap().contains("inventory"));
    }

    #[tokio::test]
    async fn test_handler_deadline_is_upstream_timeout() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 1;
        let app = app(&config);

        let (status, _, body) = send(&app, get_req("/hang")).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json(&body)["retryable"], true);
    }

    #[tokio::test]
    async fn test_bare_framework_errors_are_enveloped() {
        let app = app(&GatewayConfig::default());

        let (status, headers, body) = send(&app, get_req("/nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["correlationId"], correlation(&headers));

        let (status, headers, body) = send(&app, get_req("/echo")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(headers.contains_key(header::ALLOW));
        assert_eq!(json(&body)["kind"], "method_not_allowed");
    }

    #[tokio::test]
    async fn test_returned_error_statuses_are_kept() {
        let app = app(&GatewayConfig::default());

        let (status, headers, body) = send(&app, get_req("/conflict")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(headers.contains_key("x-correlation-id"));
        assert_eq!(&body[..], b"version mismatch");

        let (status, headers, body) = send(&app, get_req("/busy")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "5");
        assert_eq!(&body[..], b"downstream busy");
    }

    #[tokio::test]
    async fn test_bare_status_matching_a_kind_is_enveloped_with_same_status() {
        let app = app(&GatewayConfig::default());
        let (status, headers, body) = send(&app, get_req("/maintenance")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let body = json(&body);
        assert_eq!(body["kind"], "upstream_unavailable");
        assert_eq!(body["retryable"], true);
        assert_eq!(body["correlationId"], correlation(&headers));
    }

    #[tokio::test]
    async fn test_oversized_body_is_payload_too_large() {
        let app = app(&GatewayConfig::default());
        let request = Request::post("/echo")
            .header(header::CONTENT_LENGTH, "4096")
            .body(Body::from(vec![b'x'; 4096]))
            .unwrap();
        let (status, headers, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(headers.contains_key("x-correlation-id"));
        assert_eq!(json(&body)["kind"], "payload_too_large");

        let small = Request::post("/echo").body(Body::from("ping")).unwrap();
        let (status, _, body) = send(&app, small).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"ping");
    }

    #[tokio::test]
    async fn test_settings_reload_applies_to_next_request() {
        let mut config = GatewayConfig::default();
        config.admission.default_policy.capacity = 1;
        let settings = RuntimeSettings::new(&config);
        let app = Pipeline::new(settings.clone(), AdmissionController::in_memory())
            .wrap(Router::new().route("/ok", get(ok)));

        assert_eq!(send(&app, get_req("/ok")).await.0, StatusCode::OK);
        assert_eq!(send(&app, get_req("/ok")).await.0, StatusCode::TOO_MANY_REQUESTS);

        config.admission.enabled = false;
        settings.replace(&config);
        assert_eq!(send(&app, get_req("/ok")).await.0, StatusCode::OK);
    }
}
