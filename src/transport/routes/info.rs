use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::debug;

use crate::{protocol::PlayerSnapshot, server::AppState};

pub async fn get_version() -> String {
    debug!("GET /version");
    env!("CARGO_PKG_VERSION").to_string()
}

/// GET /v1/sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<PlayerSnapshot>> {
    debug!("GET /v1/sessions");
    Json(state.registry.snapshots())
}
