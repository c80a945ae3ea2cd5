//! Voice transport: the collaborator that consumes mixed frames at the
//! real-time cadence.
//!
//! The scheduler only sees the [`VoiceTransport`] / [`VoiceConnector`]
//! traits. [`PacedTransport`] is the local implementation: a paced pull loop
//! that hands every frame to a [`FrameSink`].

pub mod connector;
pub mod paced;
pub mod sink;

pub use connector::LocalConnector;
pub use paced::PacedTransport;
pub use sink::{FrameSink, NullSink, WavSink};

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    audio::{Mixer, MixerId},
    common::types::{ChannelId, GuildId},
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VoiceError {
    #[error("voice connection timed out")]
    Timeout,
    #[error("voice connection failed: {0}")]
    Connect(String),
}

/// Emitted by a transport's pull loop when it stops on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The mixer returned the empty sentinel (`error` is `None`) or the sink
    /// failed.
    Finished {
        mixer: MixerId,
        error: Option<String>,
    },
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// True while a pull loop is running (paused or not).
    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Mixer the running pull loop consumes from.
    fn current_mixer(&self) -> Option<MixerId>;

    /// Starts consuming from `mixer`. Replaces a loop on a different mixer;
    /// a no-op if already consuming this one.
    fn play(
        &self,
        mixer: Arc<Mixer>,
        events: flume::Sender<TransportEvent>,
    ) -> Result<(), VoiceError>;

    fn pause(&self);

    fn resume(&self);

    /// Ends the pull loop without a [`TransportEvent`].
    fn stop(&self);

    async fn disconnect(&self);
}

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild: &GuildId,
        channel: ChannelId,
    ) -> Result<Arc<dyn VoiceTransport>, VoiceError>;
}
