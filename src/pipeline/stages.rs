//! The two middleware halves of the request pipeline.
//!
//! `entry` runs outermost: it attaches the correlation context, isolates the
//! rest of the stack behind a panic guard and a deadline, classifies any
//! failure exactly once and stamps the correlation header on the way out.
//! `admission` runs just outside the routes and decides whether the handler
//! is invoked at all.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use tracing::Instrument;

use crate::admission::{AdmissionDecision, CallerIdentity};
use crate::config::{AdmissionConfig, Mode};
use crate::context::{self, RequestContext, X_CORRELATION_ID};
use crate::errors::{classify, ErrorEnvelope, ErrorKind, GatewayError, HandlerFailure};
use crate::observability::metrics;
use crate::pipeline::lifecycle::{Lifecycle, Stage};
use crate::pipeline::PipelineState;

/// Upper bound on a bare error body read back for its message.
const MAX_NORMALIZED_BODY: usize = 4 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {0}")]
struct HandlerPanic(String);

pub async fn entry(State(state): State<PipelineState>, mut request: Request, next: Next) -> Response {
    let settings = state.settings.snapshot();
    let lifecycle = Lifecycle::new();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let caller = CallerIdentity::identify(request.headers(), &settings.admission, peer);
    let ctx = context::attach(request.headers(), caller);
    advance(&lifecycle, Stage::CorrelationAttached);

    request.extensions_mut().insert(ctx.clone());
    request.extensions_mut().insert(lifecycle.clone());

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let span = ctx.span().clone();

    async move {
        let response = match invoke(next, request, settings.request_timeout).await {
            Ok(response) => settle(response, &ctx, &lifecycle, settings.mode).await,
            Err(failure) => fail(&failure, &HeaderMap::new(), &ctx, &lifecycle, settings.mode),
        };
        finish(response, &ctx, &lifecycle, &method, &path)
    }
    .instrument(span)
    .await
}

pub async fn admission(State(state): State<PipelineState>, request: Request, next: Next) -> Response {
    let extensions = request.extensions();
    let (Some(ctx), Some(lifecycle)) = (
        extensions.get::<RequestContext>().cloned(),
        extensions.get::<Lifecycle>().cloned(),
    ) else {
        return GatewayError::internal("admission stage reached without pipeline entry")
            .into_response();
    };

    let settings = state.settings.snapshot();
    let policy = &settings.admission;
    if policy.enabled && !is_exempt(policy, request.uri().path()) {
        let decision = state
            .admission
            .admit(ctx.caller(), policy, Instant::now())
            .await;
        advance(&lifecycle, Stage::AdmissionChecked);
        if !decision.allowed {
            advance(&lifecycle, Stage::Rejected);
            return rejection(&ctx, &decision);
        }
    } else {
        advance(&lifecycle, Stage::AdmissionChecked);
    }

    advance(&lifecycle, Stage::HandlerInvoked);
    next.run(request).await
}

fn is_exempt(config: &AdmissionConfig, path: &str) -> bool {
    config.exempt_paths.iter().any(|p| p == path)
}

fn rejection(ctx: &RequestContext, decision: &AdmissionDecision) -> Response {
    let mut response = ErrorEnvelope::rate_limited(ctx.correlation_id());
    if let Some(secs) = decision.retry_after_secs() {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

/// Run the inner stack behind a panic guard and the request deadline.
async fn invoke(next: Next, request: Request, deadline: Duration) -> Result<Response, GatewayError> {
    let inner = AssertUnwindSafe(next.run(request)).catch_unwind();
    match tokio::time::timeout(deadline, inner).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(payload)) => Err(GatewayError::other(HandlerPanic(panic_message(payload.as_ref())))),
        Err(_) => Err(GatewayError::upstream_timeout(format!(
            "Request did not complete within {:?}",
            deadline
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Turn whatever the inner stack produced into the final response.
///
/// Typed handler failures are classified here. A bare error response (no
/// JSON body) is enveloped only when its status is exactly that of an error
/// kind, so the status never changes; any other response passes through
/// untouched.
async fn settle(response: Response, ctx: &RequestContext, lifecycle: &Lifecycle, mode: Mode) -> Response {
    if lifecycle.current() == Stage::Rejected {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    if let Some(failure) = parts.extensions.remove::<HandlerFailure>() {
        return fail(failure.error(), &parts.headers, ctx, lifecycle, mode);
    }

    let kind = match ErrorKind::from_status(parts.status) {
        Some(kind) if is_bare_error(&parts.headers) => kind,
        _ => return Response::from_parts(parts, body),
    };

    let message = if parts.status.is_client_error() {
        read_message(body).await
    } else {
        String::new()
    };
    let failure = GatewayError::from_kind(kind, message);
    fail(&failure, &parts.headers, ctx, lifecycle, mode)
}

fn is_bare_error(headers: &HeaderMap) -> bool {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    !is_json
}

async fn read_message(body: Body) -> String {
    match axum::body::to_bytes(body, MAX_NORMALIZED_BODY).await {
        Ok(bytes) => std::str::from_utf8(&bytes)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Classify a failure and render its envelope.
///
/// Headers already set by inner layers (CORS, `Allow`) are carried over.
fn fail(
    failure: &(dyn std::error::Error + 'static),
    carried: &HeaderMap,
    ctx: &RequestContext,
    lifecycle: &Lifecycle,
    mode: Mode,
) -> Response {
    advance(lifecycle, Stage::Failed);
    let classified = classify(failure, mode);
    advance(lifecycle, Stage::Classified);

    if classified.status.is_server_error() {
        tracing::error!(
            kind = classified.kind.as_str(),
            status = classified.status.as_u16(),
            error = %failure,
            "Request failed"
        );
    } else {
        tracing::warn!(
            kind = classified.kind.as_str(),
            status = classified.status.as_u16(),
            error = %failure,
            "Request rejected by handler"
        );
    }
    metrics::record_error(classified.kind.as_str());

    let mut response = ErrorEnvelope::render(&classified, ctx.correlation_id());
    for (name, value) in carried {
        if *name == header::CONTENT_TYPE || *name == header::CONTENT_LENGTH {
            continue;
        }
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}

fn finish(
    mut response: Response,
    ctx: &RequestContext,
    lifecycle: &Lifecycle,
    method: &Method,
    path: &str,
) -> Response {
    let outcome = match lifecycle.current() {
        Stage::Rejected => "rejected",
        Stage::Classified => "failed",
        _ => "responded",
    };
    if lifecycle.current() != Stage::Rejected {
        advance(lifecycle, Stage::Responded);
    }

    response
        .headers_mut()
        .insert(&X_CORRELATION_ID, ctx.correlation_id().header_value());

    let status = response.status().as_u16();
    tracing::info!(
        method = %method,
        path = %path,
        status,
        latency_ms = ctx.start_time().elapsed().as_millis() as u64,
        outcome,
        "Request completed"
    );
    metrics::record_request(method.as_str(), status, outcome, ctx.start_time());
    response
}

fn advance(lifecycle: &Lifecycle, to: Stage) {
    if let Err(e) = lifecycle.advance(to) {
        tracing::error!(error = %e, "Pipeline stage out of order");
    }
}
