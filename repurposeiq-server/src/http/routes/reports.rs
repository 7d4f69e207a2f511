//! Report generation and download endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::rate_limit;
use crate::reports::{self, ReportFile, ReportInput};

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub filename: String,
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Pdf,
    Excel,
}

async fn generate(
    state: Arc<AppState>,
    user: AuthUser,
    query: String,
    format: Format,
) -> Result<Json<GenerateResponse>, ApiError> {
    let query = query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::validation("query must not be empty"));
    }

    rate_limit::check(&state.pool, "groq", user.id, &user.role).await?;
    let response = state.master.answer(&query, &[], Some(user.id)).await;
    rate_limit::record(&state.pool, "groq", user.id).await?;

    if response.rejected {
        return Err(ApiError::validation(
            "query is outside the pharmaceutical domain",
        ));
    }

    let dir = state.settings.reports_dir.clone();
    let username = user.username.clone();
    // Report rendering is CPU and file IO; keep it off the runtime.
    let filename = tokio::task::spawn_blocking(move || {
        let input = ReportInput {
            query: &query,
            response: &response,
            generated_by: &username,
        };
        match format {
            Format::Pdf => reports::generate_pdf(&dir, &input),
            Format::Excel => reports::generate_excel(&dir, &input),
        }
    })
    .await
    .map_err(|e| ApiError::internal(format!("report task failed: {e}")))?
    .map_err(|e| ApiError::internal(format!("report generation failed: {e}")))?;

    Ok(Json(GenerateResponse { filename }))
}

/// POST /api/reports/pdf
async fn generate_pdf(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    generate(state, user, req.query, Format::Pdf).await
}

/// POST /api/reports/excel
async fn generate_excel(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    generate(state, user, req.query, Format::Excel).await
}

/// GET /api/reports
async fn list(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<Vec<ReportFile>>, ApiError> {
    reports::list_reports(&state.settings.reports_dir)
        .map(Json)
        .map_err(|e| ApiError::internal(format!("listing reports failed: {e}")))
}

/// GET /api/reports/download/{filename}
async fn download(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = reports::resolve_download(&state.settings.reports_dir, &filename)
        .ok_or(ApiError::NotFound {
            resource: "report",
            id: filename.clone(),
        })?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("reading report failed: {e}")))?;

    let content_type = if filename.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

/// Report routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports", get(list))
        .route("/reports/pdf", post(generate_pdf))
        .route("/reports/excel", post(generate_excel))
        .route("/reports/download/{filename}", get(download))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    fn analyst() -> AuthUser {
        AuthUser {
            id: 2,
            username: "analyst".into(),
            role: "analyst".into(),
        }
    }

    #[tokio::test]
    async fn pdf_report_is_generated_and_downloadable() {
        let state = test_state().await;
        let Json(body) = generate_pdf(
            State(state.clone()),
            analyst(),
            Json(GenerateRequest {
                query: "metformin market size".into(),
            }),
        )
        .await
        .unwrap();
        assert!(body.filename.starts_with("report_"));
        assert!(body.filename.ends_with(".pdf"));

        let Json(listed) = list(State(state.clone()), analyst()).await.unwrap();
        assert_eq!(listed.len(), 1);

        download(State(state), analyst(), Path(body.filename))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn traversal_download_is_not_found() {
        let state = test_state().await;
        let err = download(State(state), analyst(), Path("../secrets.pdf".into()))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn off_topic_report_is_rejected() {
        let state = test_state().await;
        let err = generate_excel(
            State(state),
            analyst(),
            Json(GenerateRequest {
                query: "best pizza recipe in rome".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }
}
