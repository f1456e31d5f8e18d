// HTTP request handlers
use crate::presentation::app_state::AppState;
use crate::presentation::state_view::{DeviceSummary, StateEvent, StateView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List configured devices with their current address
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceSummary>> {
    let devices = state
        .monitors
        .values()
        .map(|monitor| {
            let status = monitor.status();
            DeviceSummary {
                id: monitor.device_id().to_string(),
                address: status.address,
                connectivity: status.connectivity,
            }
        })
        .collect();
    Json(devices)
}

pub async fn device_state(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateView>, StatusCode> {
    let monitor = state.monitors.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(StateView::from(&monitor.snapshot())))
}

/// Zero all totals and histories for a device
pub async fn reset_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateView>, StatusCode> {
    let monitor = state.monitors.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let fresh = monitor.reset().await;
    Ok(Json(StateView::from(&fresh)))
}

/// Stream one `state` event per successful tick
pub async fn device_events(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let monitor = state.monitors.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let mut rx = monitor.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    let payload = StateEvent {
                        device_id: &update.device_id,
                        state: StateView::from(&update.state),
                        sample: &update.sample,
                    };
                    match Event::default().event("state").json_data(&payload) {
                        Ok(event) => yield Ok(event),
                        Err(e) => tracing::error!("Failed to encode state event: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event stream for {} skipped {} updates", id, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
