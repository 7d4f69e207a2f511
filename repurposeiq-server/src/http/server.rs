//! Axum server setup.
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use repurposeiq_agents::master::MasterAgent;
use repurposeiq_agents::AgentContext;
use repurposeiq_core::Settings;
use repurposeiq_llm::{GroqClient, TavilyClient};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::db::repos::alerts::TrialAlert;
use crate::monitor::TrialMonitor;
use crate::scheduler;

/// Broadcast buffer for trial alerts; slow websocket readers lag.
const ALERT_CHANNEL_CAPACITY: usize = 64;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3030)
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    /// Only use for development or documented use cases.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
        }
    }
}

/// Cached sentiment payloads keyed by lowercased molecule.
pub type SentimentCache = Mutex<HashMap<String, (DateTime<Utc>, serde_json::Value)>>;

/// Shared application state
pub struct AppState {
    pub pool: SqlitePool,
    pub settings: Settings,
    pub master: MasterAgent,
    pub alerts_tx: broadcast::Sender<TrialAlert>,
    pub monitor: TrialMonitor,
    pub sentiment_cache: SentimentCache,
}

impl AppState {
    pub fn new(pool: SqlitePool, settings: Settings, master: MasterAgent) -> Self {
        let (alerts_tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        let monitor = TrialMonitor::new(pool.clone(), alerts_tx.clone());
        Self {
            pool,
            settings,
            master,
            alerts_tx,
            monitor,
            sentiment_cache: Mutex::new(HashMap::new()),
        }
    }
}

/// Build the full API router.
pub fn app(state: Arc<AppState>, cors_permissive: bool) -> Router {
    let cors = if cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        // Localhost only
        CorsLayer::new()
            .allow_origin([
                "http://localhost:3000".parse().expect("static origin"),
                "http://localhost:3030".parse().expect("static origin"),
                "http://127.0.0.1:3000".parse().expect("static origin"),
                "http://127.0.0.1:3030".parse().expect("static origin"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api = Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::query::router())
        .merge(routes::conversations::router())
        .merge(routes::dashboard::router())
        .merge(routes::analytics::router())
        .merge(routes::reports::router())
        .merge(routes::uploads::router())
        .merge(routes::workflows::router())
        .merge(routes::alerts::router())
        .merge(routes::monitoring::router())
        .merge(routes::suggestions::router())
        .merge(routes::sentiment::router())
        .merge(routes::contact::router());

    Router::new()
        .route("/", axum::routing::get(service_info))
        .nest("/api", api)
        .merge(routes::alerts::ws_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - service banner for humans and load balancers
async fn service_info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "service": "repurposeiq",
        "version": env!("CARGO_PKG_VERSION"),
        "api": "/api",
    }))
}

/// Run the HTTP server.
///
/// Initializes the schema, starts the trial monitor and the workflow
/// scheduler, then serves until Ctrl+C or SIGTERM.
pub async fn run_server(
    pool: SqlitePool,
    settings: Settings,
    config: ServerConfig,
) -> Result<(), ServerError> {
    crate::db::schema::init(&pool).await?;

    let groq = GroqClient::new(settings.groq_api_key.clone(), settings.groq_model.clone());
    let tavily = TavilyClient::new(settings.tavily_api_key.clone());
    let ctx = AgentContext {
        pool: pool.clone(),
        groq,
        tavily,
    };
    let state = Arc::new(AppState::new(pool, settings, MasterAgent::new(ctx)));

    state.monitor.start();
    scheduler::spawn(state.clone());

    let app = app(state, config.cors_permissive);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
