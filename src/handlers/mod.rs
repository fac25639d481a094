//! HTTP request handlers for the Botgate API

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::registry::BlackoutRegistry;
use crate::transport::ChatTransport;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::services::ServeDir;

pub mod health;
pub mod metrics;
pub mod query;
pub mod status;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers. The
/// blackout registry is deliberately owned here and handed to the
/// dispatcher, so the status endpoint and the engine observe the same map.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    registry: Arc<BlackoutRegistry>,
    dispatcher: Arc<Dispatcher>,
    metrics: Metrics,
}

impl AppState {
    /// Create a new AppState from configuration and a transport
    pub fn new(config: Arc<Config>, transport: Arc<dyn ChatTransport>) -> AppResult<Self> {
        let metrics = Metrics::new()
            .map_err(|e| AppError::Internal(format!("metrics registration failed: {e}")))?;
        let registry = Arc::new(BlackoutRegistry::new(config.engine.blackout()));
        let dispatcher = Arc::new(Dispatcher::new(
            &config,
            transport,
            registry.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            config,
            registry,
            dispatcher,
            metrics,
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the blackout registry
    pub fn registry(&self) -> &BlackoutRegistry {
        &self.registry
    }

    /// Get reference to the dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get reference to the metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Build the full API router for the given state
///
/// Named routes are registered before the universal `/{endpoint}` fallback,
/// so `health`, `status`, `metrics`, `files` and the name-search endpoints
/// are never interpreted as bot commands.
pub fn router(state: AppState) -> Router {
    let downloads_dir = state.config().server.downloads_dir.clone();

    Router::new()
        .route("/health", get(health::handler))
        .route("/status", get(status::handler))
        .route("/metrics", get(metrics::handler))
        .route("/dni_nombres", get(query::dni_nombres))
        .route("/venezolanos_nombres", get(query::venezolanos_nombres))
        .nest_service("/files", ServeDir::new(downloads_dir))
        .route("/{endpoint}", get(query::universal))
        .layer(axum::middleware::from_fn(
            crate::middleware::request_id_middleware,
        ))
        .with_state(state)
}
