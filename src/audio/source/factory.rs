//! `ProducerFactory`: constructs producers for the scheduler.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use symphonia::core::probe::Hint;

use super::{
    MusicProducer, SpeechProducer, StreamLocator, decode, memory_media, open_media,
};
use crate::audio::producer::{AudioProducer, ProducerError};

#[async_trait]
pub trait ProducerFactory: Send + Sync {
    /// Starts decoding `locator` at `start`.
    async fn open_music(
        &self,
        label: &str,
        locator: &StreamLocator,
        start: Duration,
    ) -> Result<Box<dyn AudioProducer>, ProducerError>;

    /// Decodes an encoded clip (WAV and the other enabled containers).
    async fn open_speech(
        &self,
        label: &str,
        clip: Bytes,
    ) -> Result<Box<dyn AudioProducer>, ProducerError>;
}

pub struct SymphoniaFactory {
    client: reqwest::Client,
}

impl SymphoniaFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProducerFactory for SymphoniaFactory {
    async fn open_music(
        &self,
        label: &str,
        locator: &StreamLocator,
        start: Duration,
    ) -> Result<Box<dyn AudioProducer>, ProducerError> {
        let media = open_media(&self.client, locator).await?;
        let handle = decode::spawn_decoder(label, media, locator.hint(), start)?;
        Ok(Box::new(MusicProducer::new(label, handle)))
    }

    async fn open_speech(
        &self,
        label: &str,
        clip: Bytes,
    ) -> Result<Box<dyn AudioProducer>, ProducerError> {
        let pcm = tokio::task::spawn_blocking(move || {
            let mut hint = Hint::new();
            hint.with_extension("wav");
            decode::decode_to_vec(memory_media(clip), &hint)
        })
        .await
        .map_err(|e| ProducerError::Decode(e.to_string()))??;

        if pcm.is_empty() {
            return Err(ProducerError::Unsupported("clip contains no audio".into()));
        }
        Ok(Box::new(SpeechProducer::new(label, pcm)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{constants::FRAME_SIZE_SAMPLES, source::testing::wav_bytes};

    #[tokio::test]
    async fn test_open_speech_from_wav() {
        let factory = SymphoniaFactory::new(reqwest::Client::new());
        let wav = wav_bytes(48_000, 2, &[42; FRAME_SIZE_SAMPLES + 4]);
        let mut clip = factory
            .open_speech("tts_1", Bytes::from(wav))
            .await
            .expect("clip decodes");

        let mut out = [0i16; FRAME_SIZE_SAMPLES];
        assert_eq!(clip.read(&mut out), Ok(FRAME_SIZE_SAMPLES));
        assert_eq!(clip.read(&mut out), Ok(4));
        assert_eq!(clip.label(), "tts_1");
    }

    #[tokio::test]
    async fn test_open_speech_rejects_empty_clip() {
        let factory = SymphoniaFactory::new(reqwest::Client::new());
        assert!(factory.open_speech("tts_2", Bytes::new()).await.is_err());
    }
}
