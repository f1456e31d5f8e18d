// Presentation layer - HTTP glue over computed state
pub mod app_state;
pub mod handlers;
pub mod state_view;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    device_events, device_state, health_check, list_devices, reset_device,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/devices", get(list_devices))
        .route("/devices/:id/state", get(device_state))
        .route("/devices/:id/reset", post(reset_device))
        .route("/devices/:id/events", get(device_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
