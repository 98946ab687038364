//! JSON and HTML endpoints

use crate::api::error::ApiError;
use crate::service::{AnalysisService, AnalyzeRequest};
use crate::session::{Session, SessionId};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use axum::response::Html;
use chrono::Utc;
use pulse_analysis::SymbolMatch;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub session_id: SessionId,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Unparseable ids cannot name a session, so they are simply unknown
pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Session {raw} not found")))
}

/// `POST /api/analyze`
pub async fn analyze(
    State(service): State<AnalysisService>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let session_id = service.submit(request)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            session_id,
            status: "started".to_string(),
            message: "Analysis started successfully".to_string(),
        }),
    ))
}

/// `GET /api/session/:id`
pub async fn session(
    State(service): State<AnalysisService>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let id = parse_session_id(&id)?;
    Ok(Json(service.status(id)?))
}

/// `GET /api/report/:id`
pub async fn report(
    State(service): State<AnalysisService>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let id = parse_session_id(&id)?;
    let report = service.report(id).await?;
    Ok(Html(report.html))
}

/// `GET /api/symbols/search?q=`
pub async fn search_symbols(
    State(service): State<AnalysisService>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<SymbolMatch>> {
    Json(service.search(&params.q))
}

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}
