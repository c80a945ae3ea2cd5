use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{ApiResult, player_error, session, session_or_create};
use crate::{
    common::types::{ChannelId, GuildId},
    protocol::{NowPlaying, PlayerSnapshot},
    server::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub channel_id: ChannelId,
    #[serde(default)]
    pub text_channel_id: Option<ChannelId>,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    /// `SS`, `MM:SS` or `HH:MM:SS`.
    pub position: String,
}

#[derive(Debug, Deserialize)]
pub struct LoopRequest {
    pub mode: String,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListenersRequest {
    pub count: usize,
}

/// GET /v1/guilds/{guildId}/player
pub async fn get_player(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<PlayerSnapshot> {
    debug!("GET /v1/guilds/{}/player", guild_id);
    // An unknown guild reads as an idle, disconnected session.
    let snapshot = match state.registry.get(&GuildId::from(guild_id.as_str())) {
        Some(player) => player.snapshot(),
        None => PlayerSnapshot::idle(
            GuildId::from(guild_id),
            state.config.player.default_volume,
            state.config.player.tts_volume,
        ),
    };
    Json(snapshot)
}

/// GET /v1/guilds/{guildId}/now-playing
pub async fn now_playing(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<NowPlaying>> {
    let player = session(&state, &guild_id, uri.path())?;
    player
        .now_playing()
        .map(Json)
        .map_err(|e| player_error(&e, uri.path()))
}

/// POST /v1/guilds/{guildId}/join
pub async fn join(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<JoinRequest>,
) -> ApiResult<Json<PlayerSnapshot>> {
    info!("POST /v1/guilds/{}/join {:?}", guild_id, body);
    let player = session_or_create(&state, &guild_id, uri.path()).await?;
    player
        .join(body.channel_id, body.text_channel_id)
        .await
        .map_err(|e| player_error(&e, uri.path()))?;
    Ok(Json(player.snapshot()))
}

/// POST /v1/guilds/{guildId}/leave
pub async fn leave(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    info!("POST /v1/guilds/{}/leave", guild_id);
    let player = session(&state, &guild_id, uri.path())?;
    player.leave().await.map_err(|e| player_error(&e, uri.path()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/guilds/{guildId}/pause
pub async fn pause(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    debug!("POST /v1/guilds/{}/pause", guild_id);
    let player = session(&state, &guild_id, uri.path())?;
    player.pause().map_err(|e| player_error(&e, uri.path()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/guilds/{guildId}/resume
pub async fn resume(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    debug!("POST /v1/guilds/{}/resume", guild_id);
    let player = session(&state, &guild_id, uri.path())?;
    player.resume().map_err(|e| player_error(&e, uri.path()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/guilds/{guildId}/skip
pub async fn skip(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    debug!("POST /v1/guilds/{}/skip", guild_id);
    let player = session(&state, &guild_id, uri.path())?;
    player.skip().await.map_err(|e| player_error(&e, uri.path()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/guilds/{guildId}/stop
pub async fn stop(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    debug!("POST /v1/guilds/{}/stop", guild_id);
    let player = session(&state, &guild_id, uri.path())?;
    player.stop().map_err(|e| player_error(&e, uri.path()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/guilds/{guildId}/seek
pub async fn seek(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<SeekRequest>,
) -> ApiResult<Json<Value>> {
    debug!("POST /v1/guilds/{}/seek to {}", guild_id, body.position);
    let player = session(&state, &guild_id, uri.path())?;
    let position = player
        .seek(&body.position)
        .await
        .map_err(|e| player_error(&e, uri.path()))?;
    Ok(Json(json!({ "position": position.as_secs() })))
}

/// PUT /v1/guilds/{guildId}/loop
pub async fn set_loop(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<LoopRequest>,
) -> ApiResult<Json<Value>> {
    debug!("PUT /v1/guilds/{}/loop {}", guild_id, body.mode);
    let player = session_or_create(&state, &guild_id, uri.path()).await?;
    let mode = player
        .set_loop_mode_str(&body.mode)
        .map_err(|e| player_error(&e, uri.path()))?;
    Ok(Json(json!({ "mode": mode })))
}

/// PUT /v1/guilds/{guildId}/volume
pub async fn set_volume(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<VolumeRequest>,
) -> ApiResult<Json<Value>> {
    debug!("PUT /v1/guilds/{}/volume {}", guild_id, body.volume);
    let player = session_or_create(&state, &guild_id, uri.path()).await?;
    let volume = player
        .set_volume(body.volume)
        .await
        .map_err(|e| player_error(&e, uri.path()))?;
    Ok(Json(json!({ "volume": volume })))
}

/// POST /v1/guilds/{guildId}/listeners
///
/// Reported by the platform adapter whenever the voice channel's human
/// member count changes.
pub async fn listeners(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<ListenersRequest>,
) -> ApiResult<StatusCode> {
    debug!("POST /v1/guilds/{}/listeners {}", guild_id, body.count);
    let player = session(&state, &guild_id, uri.path())?;
    player.on_listeners_changed(body.count);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/guilds/{guildId}/disconnected
pub async fn disconnected(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    info!("POST /v1/guilds/{}/disconnected", guild_id);
    let player = session(&state, &guild_id, uri.path())?;
    player.on_disconnected().await;
    Ok(StatusCode::NO_CONTENT)
}
