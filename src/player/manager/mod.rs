//! Per-session scheduler.
//!
//! `GuildPlayer` owns one session's [`GuildPlayback`] and reacts to two
//! kinds of input:
//! - commands from the control surface (`commands.rs`);
//! - removal / transport-finished notifications, drained by a per-session
//!   event task (`events.rs`).
//!
//! Both funnel into [`GuildPlayer::advance`] (`advance.rs`).

mod advance;
mod commands;
mod events;

use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{context::GuildPlayback, notifier::StatusNotifier};
use crate::{
    audio::{MixerEvent, ProducerFactory},
    common::types::GuildId,
    configs::PlayerConfig,
    protocol::{Notice, NowPlaying, PlayerSnapshot},
    sources::TrackResolver,
    voice::{TransportEvent, VoiceConnector},
};

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct PlayerServices {
    pub resolver: Arc<dyn TrackResolver>,
    pub producers: Arc<dyn ProducerFactory>,
    pub connector: Arc<dyn VoiceConnector>,
    pub notifier: Arc<dyn StatusNotifier>,
}

pub struct GuildPlayer {
    pub guild_id: GuildId,
    config: PlayerConfig,
    services: PlayerServices,
    state: Mutex<GuildPlayback>,
    mixer_events: flume::Sender<MixerEvent>,
    transport_events: flume::Sender<TransportEvent>,
    /// Serializes join / leave on this session.
    connection: tokio::sync::Mutex<()>,
    auto_leave: Mutex<Option<JoinHandle<()>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    speech_seq: AtomicU64,
}

impl GuildPlayer {
    /// Must be called inside a tokio runtime: spawns the session's event task.
    pub fn new(guild_id: GuildId, config: PlayerConfig, services: PlayerServices) -> Arc<Self> {
        let (mixer_tx, mixer_rx) = flume::unbounded();
        let (transport_tx, transport_rx) = flume::unbounded();

        let player = Arc::new(Self {
            guild_id,
            state: Mutex::new(GuildPlayback::new(&config)),
            config,
            services,
            mixer_events: mixer_tx,
            transport_events: transport_tx,
            connection: tokio::sync::Mutex::new(()),
            auto_leave: Mutex::new(None),
            event_task: Mutex::new(None),
            speech_seq: AtomicU64::new(1),
        });

        let task = tokio::spawn(run_events(Arc::downgrade(&player), mixer_rx, transport_rx));
        *player.event_task.lock() = Some(task);
        player
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, GuildPlayback> {
        self.state.lock()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn is_playing(&self) -> bool {
        let st = self.state.lock();
        st.playing || st.loading
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().is_connected()
    }

    pub fn idle_for(&self) -> Duration {
        self.state.lock().last_activity.elapsed()
    }

    pub fn position(&self) -> Duration {
        self.state.lock().position()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let st = self.state.lock();
        let now_playing = st
            .current
            .as_ref()
            .filter(|_| st.playing)
            .map(|t| NowPlaying::new(t.info.clone(), st.position().as_secs()));
        let speech_clips = st.mixer.as_ref().map_or(0, |m| {
            m.producer_names()
                .iter()
                .filter(|n| n.starts_with(crate::audio::constants::SPEECH_SOURCE_PREFIX))
                .count()
        });

        PlayerSnapshot {
            guild_id: self.guild_id.clone(),
            connected: st.is_connected(),
            playing: st.playing,
            paused: st.paused,
            loading: st.loading,
            loop_mode: st.loop_mode,
            volume: st.volume,
            tts_volume: st.tts_volume,
            queue_length: st.queue.len(),
            now_playing,
            speech_clips,
        }
    }

    /// Posts to the session's text channel, giving up after the notify timeout.
    pub(crate) async fn notify(&self, notice: Notice) {
        let channel = self.state.lock().text_channel;
        let send = self.services.notifier.notify(channel, &notice);
        match tokio::time::timeout(self.config.notify_timeout(), send).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[{}] Failed to deliver notice: {}", self.guild_id, e),
            Err(_) => warn!("[{}] Notice delivery timed out", self.guild_id),
        }
    }

    fn next_speech_name(&self) -> String {
        format!(
            "{}{}",
            crate::audio::constants::SPEECH_SOURCE_PREFIX,
            self.speech_seq.fetch_add(1, Ordering::Relaxed)
        )
    }

    /// Stops playback, drops the connection and ends the event task.
    pub async fn destroy(&self) {
        if let Some(task) = self.auto_leave.lock().take() {
            task.abort();
        }
        self.teardown().await;
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
        debug!("[{}] Session destroyed", self.guild_id);
    }
}

impl Drop for GuildPlayer {
    fn drop(&mut self) {
        if let Some(task) = self.auto_leave.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
    }
}

enum SessionEvent {
    Mixer(MixerEvent),
    Transport(TransportEvent),
}

/// Drains removal and transport notifications one at a time, so a session
/// never handles two completions concurrently.
async fn run_events(
    player: Weak<GuildPlayer>,
    mixer_rx: flume::Receiver<MixerEvent>,
    transport_rx: flume::Receiver<TransportEvent>,
) {
    loop {
        let event = tokio::select! {
            Ok(event) = mixer_rx.recv_async() => SessionEvent::Mixer(event),
            Ok(event) = transport_rx.recv_async() => SessionEvent::Transport(event),
            else => break,
        };

        let Some(player) = player.upgrade() else {
            break;
        };
        match event {
            SessionEvent::Mixer(event) => player.on_mixer_event(event).await,
            SessionEvent::Transport(event) => player.on_transport_event(event).await,
        }
    }
}
