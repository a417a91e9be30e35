//! ServerBuilder for fluent API to build the dispatch server

use super::exposure::{RestExposure, WebSocketExposure};
use super::host::ServerHost;
use crate::config::{AuthMode, DispatchConfig};
use crate::core::auth::{IdentityVerifier, StaticTokenVerifier, TrustingVerifier};
use anyhow::Result;
use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Builder for the dispatch server
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new()
///     .with_config(DispatchConfig::load()?)
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: DispatchConfig,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder with the default configuration
    pub fn new() -> Self {
        Self {
            config: DispatchConfig::default(),
            verifier: None,
            custom_routes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the identity verifier chosen from `auth.mode`
    pub fn with_verifier(mut self, verifier: impl IdentityVerifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Add custom routes to the server
    ///
    /// Merged next to the status API, for example an admin endpoint:
    ///
    /// ```ignore
    /// let admin = Router::new().route("/admin/ping", get(|| async { "ok" }));
    ///
    /// ServerBuilder::new()
    ///     .with_custom_routes(admin)
    ///     .build()?;
    /// ```
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Validate the configuration and start the dispatcher
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build_host(&mut self) -> Result<ServerHost> {
        self.config.validate()?;

        let verifier = match self.verifier.take() {
            Some(verifier) => verifier,
            None => default_verifier(&self.config),
        };

        Ok(ServerHost::start(self.config.clone(), verifier))
    }

    /// Build the host and the full router (REST + WebSocket + middleware)
    ///
    /// The host is returned alongside so callers can inspect the dispatcher.
    pub fn build_with_host(mut self) -> Result<(Arc<ServerHost>, Router)> {
        let host = Arc::new(self.build_host()?);
        let custom_routes = std::mem::take(&mut self.custom_routes);

        let rest_router = RestExposure::build_router(host.clone(), custom_routes)?;
        let ws_router = WebSocketExposure::build_router(host.clone())?;

        let middleware = ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(build_cors_layer(&host.config)?);

        let app = rest_router.merge(ws_router).layer(middleware);
        Ok((host, app))
    }

    /// Build the final router
    pub fn build(self) -> Result<Router> {
        let (_host, app) = self.build_with_host()?;
        Ok(app)
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the configured `host:port`
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let app = self.build()?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Dispatch server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_verifier(config: &DispatchConfig) -> Arc<dyn IdentityVerifier> {
    match config.auth.mode {
        AuthMode::Trust => {
            tracing::warn!("Identity verification disabled: any client may claim any actor id");
            Arc::new(TrustingVerifier)
        }
        AuthMode::StaticTokens => Arc::new(StaticTokenVerifier::new(&config.auth.tokens)),
    }
}

/// Build the CORS middleware layer from the allowed origins
///
/// `"*"` admits every origin; credentials are only allowed with an explicit
/// list.
pub fn build_cors_layer(config: &DispatchConfig) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(3600));

    if config.allows_any_origin() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = config
        .allowed_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{o}': {e}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(layer.allow_origin(origins).allow_credentials(true))
}

/// Resolve once the process is asked to stop (Ctrl+C, or SIGTERM on unix)
///
/// A signal handler that cannot be installed is logged and never fires;
/// the other one still stops the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "sigterm",
    };
    tracing::info!(signal, "Stopping dispatch server, draining open connections");
}
