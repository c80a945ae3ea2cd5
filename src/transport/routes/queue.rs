use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{ApiResult, player_error, session, session_or_create};
use crate::{
    protocol::{Enqueued, QueueSnapshot, Track, TrackInfo},
    server::AppState,
};

/// GET /v1/guilds/{guildId}/queue
pub async fn get_queue(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<QueueSnapshot>> {
    debug!("GET /v1/guilds/{}/queue", guild_id);
    Ok(Json(session(&state, &guild_id, uri.path())?.queue()))
}

/// POST /v1/guilds/{guildId}/queue
pub async fn enqueue(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(info): Json<TrackInfo>,
) -> ApiResult<(StatusCode, Json<Enqueued>)> {
    info!("POST /v1/guilds/{}/queue '{}'", guild_id, info.title);
    let player = session_or_create(&state, &guild_id, uri.path()).await?;
    let enqueued = player
        .enqueue(Track::new(info))
        .await
        .map_err(|e| player_error(&e, uri.path()))?;
    Ok((StatusCode::CREATED, Json(enqueued)))
}

/// DELETE /v1/guilds/{guildId}/queue
pub async fn clear_queue(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<Value>> {
    debug!("DELETE /v1/guilds/{}/queue", guild_id);
    let cleared = session(&state, &guild_id, uri.path())?.clear_queue();
    Ok(Json(json!({ "cleared": cleared })))
}

/// DELETE /v1/guilds/{guildId}/queue/{index}
pub async fn remove_from_queue(
    Path((guild_id, index)): Path<(String, usize)>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<TrackInfo>> {
    debug!("DELETE /v1/guilds/{}/queue/{}", guild_id, index);
    let player = session(&state, &guild_id, uri.path())?;
    player
        .remove_from_queue(index)
        .map(Json)
        .map_err(|e| player_error(&e, uri.path()))
}

/// POST /v1/guilds/{guildId}/queue/shuffle
pub async fn shuffle_queue(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<Value>> {
    debug!("POST /v1/guilds/{}/queue/shuffle", guild_id);
    let shuffled = session(&state, &guild_id, uri.path())?
        .shuffle_queue()
        .map_err(|e| player_error(&e, uri.path()))?;
    Ok(Json(json!({ "shuffled": shuffled })))
}
