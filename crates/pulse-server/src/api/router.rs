//! Route table for the HTTP API
//!
//! Every route lives under `/api/`. The browser front end is served from
//! another origin, so CORS is permissive.

use crate::api::{events, handlers};
use crate::service::AnalysisService;
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

/// Build the API router over `service`
pub fn router(service: AnalysisService) -> Router {
    // NOTE: Path params use `:param` syntax (axum 0.7).
    let api = Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/session/:id", get(handlers::session))
        .route("/session/:id/events", get(events::stream_events))
        .route("/report/:id", get(handlers::report))
        .route("/symbols/search", get(handlers::search_symbols))
        .route("/health", get(handlers::health))
        .with_state(service);

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
}
