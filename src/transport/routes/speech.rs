use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ApiResult, player_error, session, session_or_create};
use crate::{common::ApiError, server::AppState};

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    /// Base64-encoded audio clip (WAV or any container the decoder probes).
    pub audio: String,
}

#[derive(Debug, Deserialize)]
pub struct TtsVolumeRequest {
    pub volume: i64,
}

fn decode_clip(encoded: &str, path: &str) -> ApiResult<Bytes> {
    let raw = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::bad_request(format!("invalid base64 audio: {}", e), path))?;
    if raw.is_empty() {
        return Err(ApiError::bad_request("audio clip is empty", path));
    }
    Ok(Bytes::from(raw))
}

/// POST /v1/guilds/{guildId}/speak
pub async fn speak(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<SpeakRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let clip = decode_clip(&body.audio, uri.path())?;
    debug!("POST /v1/guilds/{}/speak ({} bytes)", guild_id, clip.len());
    let player = session(&state, &guild_id, uri.path())?;
    let name = player
        .speak(clip)
        .await
        .map_err(|e| player_error(&e, uri.path()))?;
    Ok((StatusCode::CREATED, Json(json!({ "name": name }))))
}

/// DELETE /v1/guilds/{guildId}/speak
pub async fn skip_speech(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<Value>> {
    debug!("DELETE /v1/guilds/{}/speak", guild_id);
    let removed = session(&state, &guild_id, uri.path())?.skip_speech().await;
    Ok(Json(json!({ "removed": removed })))
}

/// PUT /v1/guilds/{guildId}/speak/volume
pub async fn set_tts_volume(
    Path(guild_id): Path<String>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<TtsVolumeRequest>,
) -> ApiResult<Json<Value>> {
    debug!("PUT /v1/guilds/{}/speak/volume {}", guild_id, body.volume);
    let player = session_or_create(&state, &guild_id, uri.path()).await?;
    let volume = player
        .set_tts_volume(body.volume)
        .await
        .map_err(|e| player_error(&e, uri.path()))?;
    Ok(Json(json!({ "volume": volume })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_clip() {
        let encoded = STANDARD.encode(b"RIFF....WAVE");
        assert_eq!(
            decode_clip(&encoded, "/p").expect("decodes").as_ref(),
            b"RIFF....WAVE"
        );
        assert_eq!(decode_clip("!!not base64", "/p").map_err(|e| e.status), Err(400));
        assert_eq!(decode_clip("", "/p").map_err(|e| e.status), Err(400));
    }
}
