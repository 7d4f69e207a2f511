//! repurposeiq-server: HTTP server for the RepurposeIQ backend.
//!
//! Wires the agent router behind a REST API with JWT auth, SQLite
//! persistence, report generation, WebSocket trial alerts, a workflow
//! scheduler and per-role daily rate limiting.

pub mod db;
pub mod http;
pub mod models;
pub mod monitor;
pub mod rate_limit;
pub mod reports;
pub mod scheduler;

pub use http::server::{run_server, AppState, ServerConfig};

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use repurposeiq_agents::{AgentContext, MasterAgent};
    use repurposeiq_core::Settings;
    use repurposeiq_llm::{GroqClient, TavilyClient};

    use crate::http::server::AppState;

    /// Single-connection in-memory database with the full schema.
    pub async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        crate::db::schema::init(&pool).await.expect("schema init");
        pool
    }

    pub fn test_settings() -> Settings {
        // Fresh directories per state so report listings start empty.
        let scratch = std::env::temp_dir().join(format!("repurposeiq-test-{}", uuid::Uuid::new_v4()));
        Settings {
            database_url: "sqlite::memory:".into(),
            jwt_secret: "test-secret".into(),
            groq_api_key: None,
            groq_model: "llama-3.3-70b-versatile".into(),
            tavily_api_key: None,
            reports_dir: scratch.join("reports"),
            uploads_dir: scratch.join("uploads"),
        }
    }

    pub async fn test_state() -> Arc<AppState> {
        let pool = test_pool().await;
        let settings = test_settings();
        let ctx = AgentContext {
            pool: pool.clone(),
            groq: GroqClient::new(None, settings.groq_model.clone()),
            tavily: TavilyClient::new(None),
        };
        Arc::new(AppState::new(pool, settings, MasterAgent::new(ctx)))
    }
}
