//! HTTP surface: the SSE event stream and the JSON/CSV API.

pub mod routes;
pub mod sse;

use crate::usecases::{EventHub, PortfolioService};
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PortfolioService>,
    pub hub: EventHub,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(sse::event_stream))
        .route("/api/integrations/status", get(routes::integration_status))
        .route("/api/accounts/search", get(routes::search_accounts))
        .route("/api/operators/search", get(routes::search_operators))
        .route("/api/expansion", get(routes::expansion))
        .route("/api/health-scores", get(routes::health_scores))
        .route("/api/tasks", post(routes::create_task))
        .route("/api/reports/roi/:operator_id", get(routes::roi_report))
        .route("/api/companies/:id", get(routes::company))
        .route("/api/billing/customers/:id", get(routes::customer_billing))
        .route("/api/workflows", post(routes::dispatch_workflow))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
