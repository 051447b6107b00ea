//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use bff_gateway::admission::BucketStore;
use bff_gateway::{GatewayConfig, GatewayError, GatewayServer, RequestContext, Shutdown};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// A gateway running on an ephemeral port; shuts down on drop.
pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the full server (all layers, real listener) with the demo API.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    serve(GatewayServer::new(config).with_api(demo_api())).await
}

/// Like [`start_gateway`], with buckets kept in `store`.
#[allow(dead_code)]
pub async fn start_gateway_with_store(
    config: GatewayConfig,
    store: Arc<dyn BucketStore>,
) -> TestGateway {
    serve(GatewayServer::new(config).with_store(store).with_api(demo_api())).await
}

async fn serve(server: GatewayServer) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    // Wait until the listener accepts HTTP.
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .is_ok()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    TestGateway { addr, shutdown }
}

/// Config with admission effectively out of the way.
#[allow(dead_code)]
pub fn permissive_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.admission.default_policy.capacity = 10_000;
    config.admission.default_policy.refill_per_second = 10_000.0;
    config
}

fn demo_api() -> Router {
    Router::new()
        .route("/orders", get(orders).post(create_order))
        .route("/slow", get(slow))
        .route("/broken", get(broken))
        .route("/panic", get(panics))
        .route("/whoami", get(whoami))
}

async fn orders() -> Json<Value> {
    Json(json!({ "success": true, "orders": [] }))
}

async fn create_order(Json(body): Json<Value>) -> Result<Json<Value>, GatewayError> {
    let sku = body
        .get("sku")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::validation("sku is required"))?;
    Ok(Json(json!({ "success": true, "sku": sku })))
}

async fn slow() -> Result<Json<Value>, GatewayError> {
    Err(GatewayError::upstream_timeout("Orders service timed out"))
}

async fn broken() -> Result<Json<Value>, GatewayError> {
    Err(GatewayError::other(std::io::Error::other(
        "connection string postgres://admin:s3cret@db rejected",
    )))
}

async fn panics() -> Json<Value> {
    panic!("unexpected inventory state");
}

async fn whoami(ctx: RequestContext) -> Json<Value> {
    Json(json!({
        "correlationId": ctx.correlation_id().as_str(),
        "caller": ctx.caller_key(),
        "class": ctx.caller_class(),
    }))
}
