use std::{sync::Arc, time::Duration};

use tokio::time::Instant;

use super::{queue::TrackQueue, state::PlaybackClock};
use crate::{
    audio::{Mixer, MixerId},
    common::types::ChannelId,
    configs::PlayerConfig,
    protocol::{LoopMode, Track},
    voice::VoiceTransport,
};

/// Mutable state of one session.
///
/// Lives behind a short synchronous lock inside
/// [`GuildPlayer`](super::GuildPlayer); nothing holds it across an await.
pub struct GuildPlayback {
    pub queue: TrackQueue,
    pub current: Option<Arc<Track>>,
    pub loop_mode: LoopMode,

    pub playing: bool,
    pub paused: bool,
    pub seeking: bool,
    pub loading: bool,
    /// Set while a completion notification is driving an advance.
    pub advancing: bool,

    pub clock: PlaybackClock,
    /// Created on demand, torn down once no producers remain.
    pub mixer: Option<Arc<Mixer>>,
    /// Generation of the live `"music"` registration on `mixer`.
    pub music_generation: Option<u64>,
    pub transport: Option<Arc<dyn VoiceTransport>>,

    /// Music volume in percent.
    pub volume: u16,
    /// Speech-clip volume in percent.
    pub tts_volume: u16,

    pub voice_channel: Option<ChannelId>,
    pub text_channel: Option<ChannelId>,
    pub listeners: Option<usize>,

    /// Bumped by stop and leave so in-flight advances notice they are stale.
    pub epoch: u64,
    pub last_activity: Instant,
}

impl GuildPlayback {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            queue: TrackQueue::new(config.max_queue_size),
            current: None,
            loop_mode: LoopMode::Off,
            playing: false,
            paused: false,
            seeking: false,
            loading: false,
            advancing: false,
            clock: PlaybackClock::default(),
            mixer: None,
            music_generation: None,
            transport: None,
            volume: config.default_volume,
            tts_volume: config.tts_volume,
            voice_channel: None,
            text_channel: None,
            listeners: None,
            epoch: 0,
            last_activity: Instant::now(),
        }
    }

    /// Clears the current track and every playback flag except `advancing`.
    pub fn reset_playback(&mut self) {
        self.current = None;
        self.playing = false;
        self.paused = false;
        self.seeking = false;
        self.loading = false;
        self.music_generation = None;
        self.clock.reset();
    }

    pub fn position(&self) -> Duration {
        self.clock.position()
    }

    pub fn mixer_id(&self) -> Option<MixerId> {
        self.mixer.as_ref().map(|m| m.id())
    }

    pub fn connected_transport(&self) -> Option<Arc<dyn VoiceTransport>> {
        self.transport.clone().filter(|t| t.is_connected())
    }

    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    pub fn music_gain(&self) -> f32 {
        percent_to_gain(self.volume)
    }

    pub fn tts_gain(&self) -> f32 {
        percent_to_gain(self.tts_volume)
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

pub fn percent_to_gain(percent: u16) -> f32 {
    percent as f32 / 100.0
}
