//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with API and WebSocket handlers
//! - Wire up middleware (tracing, request timeout)
//! - Assemble the gateway subsystems into shared app state
//! - Serve with graceful shutdown and drain connections on the way out

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ConnectionConfig, GatewayConfig};
use crate::credentials::InMemoryCredentialStore;
use crate::error::GatewayError;
use crate::http::auth::{SessionAuthenticator, StaticTokenAuthenticator};
use crate::http::{api, ws};
use crate::registry::ConnectionRegistry;
use crate::router::ExecutionGateway;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ExecutionGateway>,
    pub registry: Arc<ConnectionRegistry>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub connection: ConnectionConfig,
    pub started: Instant,
}

/// HTTP server for the execution gateway.
pub struct GatewayServer {
    router: Router,
    registry: Arc<ConnectionRegistry>,
}

impl GatewayServer {
    /// Assemble all subsystems from a validated config.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let registry = Arc::new(ConnectionRegistry::new());
        let credentials = Arc::new(InMemoryCredentialStore::from_seeds(&config.credentials));
        let gateway = Arc::new(ExecutionGateway::new(
            &config,
            credentials,
            registry.clone(),
        )?);
        let authenticator = Arc::new(StaticTokenAuthenticator::new(config.auth_tokens.clone()));

        let state = AppState {
            gateway,
            registry: registry.clone(),
            authenticator,
            connection: config.connection.clone(),
            started: Instant::now(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, registry })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/gateway/connect", get(ws::connect_handler))
            .route("/api/execute", post(api::execute_handler))
            .route("/api/notify", post(api::notify_handler))
            .route("/health", get(api::health_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway server starting");

        let registry = self.registry.clone();
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                // Drain before the graceful wait: suspended delegated calls
                // must fail so their in-flight API requests can finish
                // instead of holding the shutdown open.
                registry.drain();
            })
            .await?;

        tracing::info!("gateway server stopped");
        Ok(())
    }
}
