//! HTTP API server for the assistant bridge

mod auth;
pub mod health;
pub mod rate_limit;
pub mod webhook;

use std::sync::Arc;

use axum::{Router, routing::post};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::assistant::Orchestrator;
use crate::db::DbPool;
use crate::session::SessionManager;
use crate::station::StationRegistry;

/// Shared state for API handlers
pub struct ApiState {
    pub db: DbPool,
    pub stations: StationRegistry,
    pub sessions: SessionManager,
    pub orchestrator: Orchestrator,
    pub webhook_secret: Option<SecretString>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    db: DbPool,
    stations: StationRegistry,
    sessions: SessionManager,
    orchestrator: Orchestrator,
    port: u16,
    webhook_secret: Option<SecretString>,
    rate_limit_per_minute: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub const fn new(
        db: DbPool,
        stations: StationRegistry,
        sessions: SessionManager,
        orchestrator: Orchestrator,
        port: u16,
    ) -> Self {
        Self {
            db,
            stations,
            sessions,
            orchestrator,
            port,
            webhook_secret: None,
            rate_limit_per_minute: None,
        }
    }

    /// Set the shared secret required on webhook calls
    #[must_use]
    pub fn webhook_secret(mut self, secret: Option<SecretString>) -> Self {
        self.webhook_secret = secret;
        self
    }

    /// Limit requests per minute across the whole API
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_per_minute = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let rate_limiter = self.rate_limit_per_minute.map(rate_limit::create_limiter);

        let state = Arc::new(ApiState {
            db: self.db,
            stations: self.stations,
            sessions: self.sessions,
            orchestrator: self.orchestrator,
            webhook_secret: self.webhook_secret,
            rate_limiter,
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let webhooks = Router::new()
            .route("/webhook/{station}", post(webhook::handle_webhook))
            .route_layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                auth::require_webhook_secret,
            ))
            .with_state(self.state.clone());

        let router = Router::new()
            .merge(webhooks)
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        let router = router.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            rate_limit::rate_limit_middleware,
        ));

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.webhook_secret.is_none() {
            tracing::warn!("no webhook secret configured, webhooks are unauthenticated");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            stations = self.state.stations.len(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
