use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use callwatch::{CallEvent, CallTracker, LoggingObserver, SessionUpdate};

mod adapters;
mod config;
mod models;
mod routes;

use adapters::ElevenLabsProvider;
use config::ServerConfig;

const EVENT_BUFFER: usize = 256;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<CallTracker>,
    /// Push events waiting for the ingestor
    pub events: mpsc::Sender<CallEvent>,
    /// Session updates fanned out to SSE clients
    pub updates: broadcast::Sender<SessionUpdate>,
    pub webhook_secret: Option<String>,
}

impl AppState {
    /// Wire the push channel and the update fan-out. Needs a running runtime.
    pub fn new(tracker: Arc<CallTracker>, webhook_secret: Option<String>) -> Self {
        let events = tracker.open_event_channel(EVENT_BUFFER);
        let (updates, _) = broadcast::channel(EVENT_BUFFER);

        let fan_out = updates.clone();
        tracker.subscribe(
            None,
            Arc::new(move |update: &SessionUpdate| {
                // No subscribers is fine
                let _ = fan_out.send(update.clone());
            }),
        );

        Self {
            tracker,
            events,
            updates,
            webhook_secret,
        }
    }
}

#[derive(Serialize)]
struct HealthCheck {
    status: String,
    message: String,
    version: String,
    provider: String,
    tracked_calls: usize,
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthCheck> {
    Json(HealthCheck {
        status: "ok".to_string(),
        message: "Callwatch API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.tracker.provider_name().to_string(),
        tracked_calls: state.tracker.sessions().len(),
    })
}

pub fn build_router(state: AppState) -> Router {
    let openapi = routes::swagger::ApiDoc::openapi();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/health", get(health_check))
        .merge(routes::call::router())
        .merge(routes::webhook::router())
        .merge(routes::events::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,callwatch=debug,callwatch_server=debug")),
        )
        .init();

    tracing::info!("📞 Callwatch API initializing...");

    let config = ServerConfig::from_env()?;

    let provider = Arc::new(
        ElevenLabsProvider::new(config.provider.clone())
            .context("Failed to build provider client")?,
    );
    tracing::info!("🔌 Provider: ElevenLabs ({})", config.provider.base_url);

    let tracker = Arc::new(CallTracker::new(provider, config.tracker.clone()));
    tracker.subscribe(None, Arc::new(LoggingObserver));
    tracing::info!(
        "⏱️ Poll interval {:?}, {} reconcile attempts, auto-reconcile {}",
        config.tracker.poll_interval,
        config.tracker.max_reconcile_attempts,
        if config.tracker.auto_reconcile { "on" } else { "off" }
    );

    if config.webhook_secret.is_some() {
        tracing::info!("🔐 Webhook signatures required");
    } else {
        tracing::warn!("⚠️  No CALLWATCH_WEBHOOK_SECRET set - webhook signatures not checked");
    }

    let state = AppState::new(tracker.clone(), config.webhook_secret.clone());
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    tracing::info!("📚 Swagger UI: /swagger-ui");
    tracing::info!("✅ Callwatch API ready on {}", config.bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracker.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️  Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("👋 Shutting down");
}
