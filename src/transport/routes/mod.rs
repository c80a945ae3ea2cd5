//! REST handlers for the per-guild control surface.

pub mod info;
pub mod player;
pub mod queue;
pub mod speech;

use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    common::{ApiError, types::GuildId},
    player::{GuildPlayer, PlayerError},
    server::AppState,
    sources::ResolveError,
};

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Maps a scheduler rejection to its HTTP status.
pub fn player_error(err: &PlayerError, path: &str) -> ApiError {
    let message = err.to_string();
    match err {
        PlayerError::SeekBeyondDuration { .. }
        | PlayerError::InvalidTime(_)
        | PlayerError::InvalidVolume(_)
        | PlayerError::InvalidLoopMode(_)
        | PlayerError::InvalidQueueIndex(_) => ApiError::bad_request(message, path),
        PlayerError::QueueFull { .. }
        | PlayerError::NothingPlaying
        | PlayerError::NotPaused
        | PlayerError::AlreadyPaused
        | PlayerError::NotPlaying
        | PlayerError::QueueTooShort
        | PlayerError::NotConnected
        | PlayerError::Busy => ApiError::conflict(message, path),
        PlayerError::Resolve(ResolveError::Unavailable(_)) => ApiError::not_found(message, path),
        PlayerError::Resolve(_) | PlayerError::Producer(_) => {
            ApiError::new(502, "Bad Gateway", message, path)
        }
        PlayerError::Voice(_) | PlayerError::SessionLimit => ApiError::unavailable(message, path),
    }
}

/// Looks up an existing session.
pub(crate) fn session(state: &AppState, guild_id: &str, path: &str) -> ApiResult<Arc<GuildPlayer>> {
    state
        .registry
        .get(&GuildId::from(guild_id))
        .ok_or_else(|| ApiError::not_found(format!("Session not found: {}", guild_id), path))
}

/// Looks up a session, creating it on first use.
pub(crate) async fn session_or_create(
    state: &AppState,
    guild_id: &str,
    path: &str,
) -> ApiResult<Arc<GuildPlayer>> {
    state
        .registry
        .get_or_create(&GuildId::from(guild_id))
        .await
        .map_err(|e| player_error(&e, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceError;

    #[test]
    fn test_player_error_statuses() {
        let path = "/v1/guilds/1/seek";
        let cases = [
            (PlayerError::SeekBeyondDuration { duration: 10 }, 400),
            (PlayerError::InvalidVolume(300), 400),
            (PlayerError::QueueFull { max: 1 }, 409),
            (PlayerError::NotConnected, 409),
            (PlayerError::Busy, 409),
            (PlayerError::Resolve(ResolveError::Unavailable("gone".into())), 404),
            (PlayerError::Resolve(ResolveError::Timeout), 502),
            (PlayerError::Voice(VoiceError::Timeout), 503),
            (PlayerError::SessionLimit, 503),
        ];
        for (err, status) in cases {
            let api = player_error(&err, path);
            assert_eq!(api.status, status, "{:?}", err);
            assert_eq!(api.path, path);
            assert_eq!(api.message, err.to_string());
        }
    }

    #[test]
    fn test_api_error_response_status() {
        let response = ApiError::conflict("busy", "/x").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
