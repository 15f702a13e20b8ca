//! API routes for the planning server.

pub mod error;
pub mod explorations;
pub mod planning;
pub mod request_id;
mod routes;
pub mod ws;

use axum::Router;

pub fn routes() -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router()
}

#[cfg(test)]
mod tests;
