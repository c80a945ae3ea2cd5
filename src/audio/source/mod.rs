//! Turning a stream locator into decoded 48 kHz stereo PCM.
//!
//! ```text
//! src/audio/source/
//! ├── mod.rs      ← StreamLocator + media opening
//! ├── decode.rs   ← symphonia decode loop (runs on its own thread)
//! ├── music.rs    ← MusicProducer: frames from a live decode thread
//! ├── speech.rs   ← SpeechProducer: a fully decoded in-memory clip
//! └── factory.rs  ← ProducerFactory trait + SymphoniaFactory
//! ```

pub mod decode;
pub mod factory;
pub mod music;
pub mod speech;

pub use factory::{ProducerFactory, SymphoniaFactory};
pub use music::MusicProducer;
pub use speech::SpeechProducer;

use std::{io::Cursor, path::PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use symphonia::core::{io::MediaSource, probe::Hint};

use crate::audio::producer::ProducerError;

/// Where a resolved track's audio can be read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StreamLocator {
    File(PathBuf),
    Url(String),
}

impl StreamLocator {
    /// Container hint taken from the path or URL extension.
    pub fn hint(&self) -> Hint {
        let mut hint = Hint::new();
        let raw = match self {
            Self::File(path) => path.to_string_lossy().into_owned(),
            Self::Url(url) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
        };
        if let Some((_, ext)) = raw.rsplit_once('.') {
            if !ext.is_empty() && !ext.contains('/') {
                hint.with_extension(&ext.to_ascii_lowercase());
            }
        }
        hint
    }
}

impl std::fmt::Display for StreamLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Opens the locator as a symphonia media source. URLs are fetched in full.
pub async fn open_media(
    client: &reqwest::Client,
    locator: &StreamLocator,
) -> Result<Box<dyn MediaSource>, ProducerError> {
    match locator {
        StreamLocator::File(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| ProducerError::Io(format!("{}: {}", path.display(), e)))?;
            Ok(Box::new(file))
        }
        StreamLocator::Url(url) => {
            let body = client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ProducerError::Io(e.to_string()))?
                .bytes()
                .await
                .map_err(|e| ProducerError::Io(e.to_string()))?;
            Ok(Box::new(Cursor::new(body)))
        }
    }
}

/// Wraps an in-memory clip as a media source.
pub fn memory_media(clip: Bytes) -> Box<dyn MediaSource> {
    Box::new(Cursor::new(clip))
}

#[cfg(test)]
pub(crate) mod testing {
    use byteorder::{LittleEndian, WriteBytesExt};

    /// Minimal 16-bit PCM WAV file.
    pub fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.write_u32::<LittleEndian>(36 + data_len).ok();
        out.extend_from_slice(b"WAVEfmt ");
        out.write_u32::<LittleEndian>(16).ok();
        out.write_u16::<LittleEndian>(1).ok();
        out.write_u16::<LittleEndian>(channels).ok();
        out.write_u32::<LittleEndian>(sample_rate).ok();
        out.write_u32::<LittleEndian>(sample_rate * channels as u32 * 2).ok();
        out.write_u16::<LittleEndian>(channels * 2).ok();
        out.write_u16::<LittleEndian>(16).ok();
        out.extend_from_slice(b"data");
        out.write_u32::<LittleEndian>(data_len).ok();
        for &s in samples {
            out.write_i16::<LittleEndian>(s).ok();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(
            StreamLocator::Url("https://a.b/c.mp3".into()).to_string(),
            "https://a.b/c.mp3"
        );
        assert_eq!(
            StreamLocator::File(PathBuf::from("/music/a.flac")).to_string(),
            "file:/music/a.flac"
        );
    }

    #[tokio::test]
    async fn test_open_missing_file_is_io_error() {
        let client = reqwest::Client::new();
        let locator = StreamLocator::File(PathBuf::from("/nonexistent/voxmix/track.wav"));
        assert!(matches!(
            open_media(&client, &locator).await,
            Err(ProducerError::Io(_))
        ));
    }
}
