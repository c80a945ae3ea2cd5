use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    common::{format_duration, progress_bar, types::GuildId},
    protocol::tracks::TrackInfo,
};

/// What happens to a track once it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Off,
    #[serde(rename = "one")]
    RepeatOne,
    #[serde(rename = "all")]
    RepeatAll,
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "disable" => Ok(Self::Off),
            "one" | "track" | "song" | "single" => Ok(Self::RepeatOne),
            "all" | "queue" => Ok(Self::RepeatAll),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::RepeatOne => "one",
            Self::RepeatAll => "all",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    #[serde(flatten)]
    pub track: TrackInfo,
    /// Position in whole seconds.
    pub position: u64,
    pub position_text: String,
    pub duration_text: String,
    pub progress: String,
}

impl NowPlaying {
    pub fn new(track: TrackInfo, position: u64) -> Self {
        let position = position.min(track.duration);
        Self {
            position_text: format_duration(position),
            duration_text: format_duration(track.duration),
            progress: progress_bar(position, track.duration, 20),
            position,
            track,
        }
    }
}

/// Read-only view of a session for the control surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub guild_id: GuildId,
    pub connected: bool,
    pub playing: bool,
    pub paused: bool,
    pub loading: bool,
    pub loop_mode: LoopMode,
    pub volume: u16,
    pub tts_volume: u16,
    pub queue_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<NowPlaying>,
    pub speech_clips: usize,
}

impl PlayerSnapshot {
    /// A session that has never been created.
    pub fn idle(guild_id: GuildId, volume: u16, tts_volume: u16) -> Self {
        Self {
            guild_id,
            connected: false,
            playing: false,
            paused: false,
            loading: false,
            loop_mode: LoopMode::Off,
            volume,
            tts_volume,
            queue_length: 0,
            now_playing: None,
            speech_clips: 0,
        }
    }
}

/// Result of adding a track to a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enqueued {
    #[serde(flatten)]
    pub track: TrackInfo,
    /// Queue length right after insertion.
    pub position: usize,
    /// Whether the track started playing immediately.
    pub started: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// 1-based, as accepted by queue removal.
    pub index: usize,
    #[serde(flatten)]
    pub track: TrackInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub tracks: Vec<QueueEntry>,
    pub total_duration: u64,
    pub total_duration_text: String,
}

impl QueueSnapshot {
    pub fn new(tracks: Vec<TrackInfo>) -> Self {
        let total_duration = tracks.iter().map(|t| t.duration).sum();
        Self {
            tracks: tracks
                .into_iter()
                .enumerate()
                .map(|(i, track)| QueueEntry { index: i + 1, track })
                .collect(),
            total_duration,
            total_duration_text: format_duration(total_duration),
        }
    }
}
