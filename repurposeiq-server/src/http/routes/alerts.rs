//! Trial alert endpoints and the live websocket feed.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::db::repos::alerts::{AlertRepo, TrialAlert};
use crate::http::auth::verify_token;
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// GET /api/alerts - unviewed alerts, newest first
async fn unviewed(
    State(state): State<Arc<AppState>>,
    _user: crate::http::auth::AuthUser,
) -> Result<Json<Vec<TrialAlert>>, ApiError> {
    Ok(Json(AlertRepo::new(&state.pool).unviewed().await?))
}

/// GET /api/alerts/molecule/{molecule}
async fn for_molecule(
    State(state): State<Arc<AppState>>,
    _user: crate::http::auth::AuthUser,
    Path(molecule): Path<String>,
) -> Result<Json<Vec<TrialAlert>>, ApiError> {
    Ok(Json(AlertRepo::new(&state.pool).for_molecule(&molecule).await?))
}

/// POST /api/alerts/{id}/read
async fn mark_viewed(
    State(state): State<Arc<AppState>>,
    _user: crate::http::auth::AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    AlertRepo::new(&state.pool).mark_viewed(id).await?;
    Ok(Json(json!({"viewed": id})))
}

/// POST /api/alerts/read - mark everything read
async fn mark_all_viewed(
    State(state): State<Arc<AppState>>,
    _user: crate::http::auth::AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = AlertRepo::new(&state.pool).mark_all_viewed().await?;
    Ok(Json(json!({"viewed": count})))
}

#[derive(Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// Client-to-server websocket messages.
#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WsCommand {
    SubscribeMolecule { molecule: String },
    UnsubscribeMolecule { molecule: String },
}

/// GET /ws/alerts?token=... - websockets cannot send headers, so the
/// token rides in the query string.
async fn ws_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .ok_or_else(|| ApiError::unauthorized("missing token query parameter"))?;
    verify_token(&state.settings.jwt_secret, &token)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket)))
}

async fn handle_socket(state: Arc<AppState>, mut socket: WebSocket) {
    let mut alerts = state.alerts_tx.subscribe();

    loop {
        tokio::select! {
            alert = alerts.recv() => {
                let Ok(alert) = alert else { break };
                let payload = json!({"event": "trial_alert", "data": alert});
                if socket.send(Message::text(payload.to_string())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                let Message::Text(text) = message else { continue };
                match serde_json::from_str::<WsCommand>(&text) {
                    Ok(WsCommand::SubscribeMolecule { molecule }) => {
                        state.monitor.track(&molecule).await;
                        let ack = json!({"event": "subscribed", "molecule": molecule});
                        if socket.send(Message::text(ack.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsCommand::UnsubscribeMolecule { molecule }) => {
                        state.monitor.untrack(&molecule).await;
                        let ack = json!({"event": "unsubscribed", "molecule": molecule});
                        if socket.send(Message::text(ack.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("unrecognized websocket message: {}", e),
                }
            }
        }
    }
}

/// REST alert routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/alerts", get(unviewed))
        .route("/alerts/molecule/{molecule}", get(for_molecule))
        .route("/alerts/read", post(mark_all_viewed))
        .route("/alerts/{id}/read", post(mark_viewed))
}

/// Websocket route, mounted outside /api
pub fn ws_router() -> Router<Arc<AppState>> {
    Router::new().route("/ws/alerts", get(ws_alerts))
}
