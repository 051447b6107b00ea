//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: built-in routes plus the application API
//! - Wrap everything in the request pipeline
//! - Wire up outer layers (security headers, response compression, tracing)
//! - Serve with peer addresses and graceful shutdown
//! - Run the idle bucket sweeper alongside the listener

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::admission::{AdmissionController, BucketStore, EvictionSweeper};
use crate::config::{GatewayConfig, RuntimeSettings};
use crate::http::routes;
use crate::lifecycle::Shutdown;
use crate::pipeline::Pipeline;
use crate::security::{apply_security_headers, cors_layer};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    config: GatewayConfig,
    settings: RuntimeSettings,
    admission: AdmissionController,
    api: Option<Router>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Self {
        let settings = RuntimeSettings::new(&config);
        Self {
            config,
            settings,
            admission: AdmissionController::in_memory(),
            api: None,
        }
    }

    /// Use an external bucket store instead of the in-process one.
    pub fn with_store(mut self, store: Arc<dyn BucketStore>) -> Self {
        self.admission = AdmissionController::new(store);
        self
    }

    /// Mount application routes under `/api`.
    pub fn with_api(mut self, api: Router) -> Self {
        self.api = Some(api);
        self
    }

    /// Handle for hot-reloading runtime settings.
    pub fn settings(&self) -> RuntimeSettings {
        self.settings.clone()
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let mut app = routes::builtin();
        if let Some(api) = &self.api {
            app = app.nest("/api", api.clone());
        }
        let app = app.fallback(routes::not_found);

        let pipeline = Pipeline::new(self.settings.clone(), self.admission.clone())
            .body_limit(self.config.security.max_body_size)
            .cors(cors_layer(
                &self.config.cors,
                &self.config.admission.api_key_header,
            ));

        apply_security_headers(pipeline.wrap(app), &self.config.security)
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured listener address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = &self.config.listener.bind_address;
        TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, mode = ?self.config.mode, "HTTP server starting");

        let sweeper = EvictionSweeper::new(
            self.admission.store().clone(),
            self.settings.clone(),
            self.config.admission.sweep_interval(),
        );
        tokio::spawn(sweeper.run(shutdown.subscribe()));

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
