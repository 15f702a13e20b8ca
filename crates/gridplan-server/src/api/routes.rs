//! REST API routes.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::{explorations, planning, request_id, ws};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    let planning_routes = Router::new()
        .route("/v1/routes/plan", post(planning::plan_route_handler))
        .route("/v1/coverage/plan", post(planning::plan_coverage_handler));

    let exploration_routes = Router::new()
        .route("/v1/explorations", post(explorations::create_exploration))
        .route(
            "/v1/explorations/:id",
            get(explorations::get_exploration).delete(explorations::cancel_exploration),
        )
        .route("/v1/explorations/:id/stream", get(ws::exploration_stream));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(planning_routes)
        .merge(exploration_routes)
        .layer(middleware::from_fn(request_id::ensure_request_id))
}
