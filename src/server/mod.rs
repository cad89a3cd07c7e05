//! HTTP server for the four-eyes check.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries (returns 204 once handled)
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::effects::GitHubConnector;
use crate::pipeline::PipelineConfig;
use crate::policy::ProtectedRefs;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. It is built
/// once at startup and never mutated.
pub struct AppState<C> {
    inner: Arc<AppStateInner<C>>,
}

struct AppStateInner<C> {
    /// Webhook secret for signature verification.
    webhook_secret: Vec<u8>,

    protected_refs: ProtectedRefs,

    pipeline: PipelineConfig,

    connector: C,

    /// Cancelled on shutdown; aborts in-flight evaluations.
    shutdown: CancellationToken,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: GitHubConnector> AppState<C> {
    pub fn new(
        webhook_secret: impl Into<Vec<u8>>,
        protected_refs: ProtectedRefs,
        pipeline: PipelineConfig,
        connector: C,
        shutdown: CancellationToken,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: webhook_secret.into(),
                protected_refs,
                pipeline,
                connector,
                shutdown,
            }),
        }
    }

    /// Builds the state from loaded configuration.
    pub fn from_config(config: &Config, connector: C, shutdown: CancellationToken) -> Self {
        AppState::new(
            config.webhook_secret.clone(),
            config.protected_refs.clone(),
            config.pipeline.clone(),
            connector,
            shutdown,
        )
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn protected_refs(&self) -> &ProtectedRefs {
        &self.inner.protected_refs
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.inner.pipeline
    }

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<C: GitHubConnector>(app_state: AppState<C>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<C>))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
