//! Initiative API — HTTP shell around the turn sequencer.
//!
//! Each encounter session owns an isolated `Sequencer`; requests for one
//! session are serialized through the session map's lock.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the application router with every route mounted.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/encounters", routes::encounters::router())
        .with_state(app_state)
}
