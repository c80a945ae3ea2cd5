use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the local voice transport delivers mixed frames.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Null,
    Wav,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VoiceConfig {
    #[serde(default)]
    pub sink: SinkKind,
    /// Directory receiving one `<guild>-<channel>-<ms>.wav` capture per connection.
    #[serde(default = "default_wav_dir")]
    pub wav_dir: PathBuf,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            wav_dir: default_wav_dir(),
        }
    }
}

fn default_wav_dir() -> PathBuf {
    PathBuf::from("captures")
}
