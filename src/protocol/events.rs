use serde::Serialize;

use crate::{common::types::GuildId, protocol::tracks::TrackInfo};

/// Status messages posted to a session's text channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notice {
    NowPlaying {
        #[serde(rename = "guildId")]
        guild_id: GuildId,
        track: TrackInfo,
    },
    QueueEnded {
        #[serde(rename = "guildId")]
        guild_id: GuildId,
    },
    PlaybackError {
        #[serde(rename = "guildId")]
        guild_id: GuildId,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        message: String,
    },
    AutoLeft {
        #[serde(rename = "guildId")]
        guild_id: GuildId,
    },
}

impl Notice {
    pub fn guild_id(&self) -> &GuildId {
        match self {
            Self::NowPlaying { guild_id, .. }
            | Self::QueueEnded { guild_id }
            | Self::PlaybackError { guild_id, .. }
            | Self::AutoLeft { guild_id } => guild_id,
        }
    }

    /// Chat-ready rendering.
    pub fn text(&self) -> String {
        match self {
            Self::NowPlaying { track, .. } => format!(
                "Now playing: {} [{}]",
                track.title,
                crate::common::format_duration(track.duration)
            ),
            Self::QueueEnded { .. } => "Queue finished.".to_string(),
            Self::PlaybackError {
                title: Some(title),
                message,
                ..
            } => format!("Could not play {}: {}", title, message),
            Self::PlaybackError { message, .. } => format!("Playback error: {}", message),
            Self::AutoLeft { .. } => {
                "Left the voice channel because nobody was listening.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_serialization_tag() {
        let notice = Notice::QueueEnded {
            guild_id: GuildId::from("42"),
        };
        let json = serde_json::to_value(&notice).expect("serializes");
        assert_eq!(json["type"], "queueEnded");
        assert_eq!(json["guildId"], "42");
        assert_eq!(notice.text(), "Queue finished.");
    }

    #[test]
    fn test_playback_error_text() {
        let notice = Notice::PlaybackError {
            guild_id: GuildId::from("1"),
            title: Some("Song".into()),
            message: "timed out".into(),
        };
        assert_eq!(notice.text(), "Could not play Song: timed out");
    }
}
