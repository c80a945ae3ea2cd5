use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{FrameSink, NullSink, PacedTransport, VoiceConnector, VoiceError, VoiceTransport, WavSink};
use crate::{
    common::types::{ChannelId, GuildId, now_ms},
    configs::{SinkKind, VoiceConfig},
};

/// Builds [`PacedTransport`]s backed by the configured sink.
pub struct LocalConnector {
    config: VoiceConfig,
}

impl LocalConnector {
    pub fn new(config: VoiceConfig) -> Self {
        Self { config }
    }

    fn sink_for(&self, guild: &GuildId, channel: ChannelId) -> Result<Box<dyn FrameSink>, VoiceError> {
        match self.config.sink {
            SinkKind::Null => Ok(Box::new(NullSink::default())),
            SinkKind::Wav => {
                let path = self
                    .config
                    .wav_dir
                    .join(format!("{}-{}-{}.wav", guild, channel, now_ms()));
                let sink = WavSink::create(&path)
                    .map_err(|e| VoiceError::Connect(format!("{}: {}", path.display(), e)))?;
                info!("[{}] Capturing voice output to {}", guild, path.display());
                Ok(Box::new(sink))
            }
        }
    }
}

#[async_trait]
impl VoiceConnector for LocalConnector {
    async fn connect(
        &self,
        guild: &GuildId,
        channel: ChannelId,
    ) -> Result<Arc<dyn VoiceTransport>, VoiceError> {
        let sink = self.sink_for(guild, channel)?;
        info!("[{}] Voice connected to channel {}", guild, channel);
        Ok(Arc::new(PacedTransport::new(guild.clone(), sink)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wav_connector_creates_capture_file() {
        let dir = std::env::temp_dir().join(format!("voxmix-caps-{}", uuid::Uuid::new_v4()));
        let connector = LocalConnector::new(VoiceConfig {
            sink: SinkKind::Wav,
            wav_dir: dir.clone(),
        });
        let transport = connector
            .connect(&GuildId::from("7"), ChannelId(9))
            .await
            .expect("connects");
        assert!(transport.is_connected());
        transport.disconnect().await;

        let files: Vec<_> = std::fs::read_dir(&dir).expect("dir exists").collect();
        assert_eq!(files.len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }
}
