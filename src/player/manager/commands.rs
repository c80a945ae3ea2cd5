use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::GuildPlayer;
use crate::{
    audio::constants::{MUSIC_SOURCE, SPEECH_SOURCE_PREFIX},
    common::{parse_time, types::ChannelId},
    player::{context::percent_to_gain, error::PlayerError},
    protocol::{Enqueued, LoopMode, Notice, NowPlaying, QueueSnapshot, Track, TrackInfo},
    voice::VoiceError,
};

const MAX_VOLUME: i64 = 200;

fn validate_percent(percent: i64) -> Result<u16, PlayerError> {
    if (0..=MAX_VOLUME).contains(&percent) {
        Ok(percent as u16)
    } else {
        Err(PlayerError::InvalidVolume(percent))
    }
}

impl GuildPlayer {
    // ── Queue ────────────────────────────────────────────────────────────────

    /// Appends a track; starts it right away if the session is idle.
    pub async fn enqueue(self: &Arc<Self>, track: Track) -> Result<Enqueued, PlayerError> {
        let track = Arc::new(track);
        let (position, idle) = {
            let mut st = self.state();
            let max = st.queue.capacity();
            if st.queue.push(track.clone()).is_err() {
                return Err(PlayerError::QueueFull { max });
            }
            (st.queue.len(), !st.playing && !st.loading)
        };
        self.note_activity();
        debug!("[{}] Queued '{}' at {}", self.guild_id, track.title(), position);

        if idle {
            if let Err(e) = self.advance(Duration::ZERO).await {
                debug!("[{}] Could not start after enqueue: {}", self.guild_id, e);
            }
        }

        let started = self
            .state()
            .current
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(c, &track));
        Ok(Enqueued {
            track: track.info.clone(),
            position,
            started,
        })
    }

    pub fn queue(&self) -> QueueSnapshot {
        let st = self.state();
        QueueSnapshot::new(st.queue.iter().map(|t| t.info.clone()).collect())
    }

    /// Empties the queue without touching the current track.
    pub fn clear_queue(self: &Arc<Self>) -> usize {
        let cleared = self.state().queue.clear();
        self.note_activity();
        cleared
    }

    /// Removes the track at 1-based `index`.
    pub fn remove_from_queue(self: &Arc<Self>, index: usize) -> Result<TrackInfo, PlayerError> {
        let removed = {
            let mut st = self.state();
            index
                .checked_sub(1)
                .and_then(|i| st.queue.remove(i))
                .ok_or(PlayerError::InvalidQueueIndex(index))?
        };
        self.note_activity();
        Ok(removed.info.clone())
    }

    pub fn shuffle_queue(self: &Arc<Self>) -> Result<usize, PlayerError> {
        let len = {
            let mut st = self.state();
            if st.queue.len() < 2 {
                return Err(PlayerError::QueueTooShort);
            }
            st.queue.shuffle();
            st.queue.len()
        };
        self.note_activity();
        Ok(len)
    }

    // ── Transport control ────────────────────────────────────────────────────

    pub fn pause(self: &Arc<Self>) -> Result<(), PlayerError> {
        let transport = {
            let mut st = self.state();
            if !st.playing {
                return Err(PlayerError::NotPlaying);
            }
            if st.paused {
                return Err(PlayerError::AlreadyPaused);
            }
            st.paused = true;
            st.clock.pause();
            st.transport.clone()
        };
        if let Some(transport) = transport {
            transport.pause();
        }
        self.note_activity();
        Ok(())
    }

    pub fn resume(self: &Arc<Self>) -> Result<(), PlayerError> {
        let transport = {
            let mut st = self.state();
            if !st.paused {
                return Err(PlayerError::NotPaused);
            }
            st.paused = false;
            st.clock.resume();
            st.transport.clone()
        };
        if let Some(transport) = transport {
            transport.resume();
        }
        self.note_activity();
        Ok(())
    }

    /// Removes the music producer; the removal notification advances the
    /// queue.
    pub async fn skip(self: &Arc<Self>) -> Result<(), PlayerError> {
        let mixer = {
            let st = self.state();
            if !st.playing {
                return Err(PlayerError::NothingPlaying);
            }
            if st.seeking || st.loading || st.advancing {
                return Err(PlayerError::Busy);
            }
            st.mixer.clone()
        };
        self.note_activity();

        match mixer {
            Some(mixer) if mixer.remove(MUSIC_SOURCE).await => Ok(()),
            _ => Err(PlayerError::NothingPlaying),
        }
    }

    /// Clears the queue and discards the mixer. Loop mode is kept.
    pub fn stop(self: &Arc<Self>) -> Result<(), PlayerError> {
        let (mixer, transport) = {
            let mut st = self.state();
            let cleared = st.queue.clear();
            let active = st.current.is_some() || st.playing || st.loading || st.mixer.is_some();
            if !active && cleared == 0 {
                return Err(PlayerError::NothingPlaying);
            }
            st.epoch += 1;
            st.reset_playback();
            (st.mixer.take(), st.transport.clone())
        };

        if let Some(transport) = transport {
            transport.stop();
        }
        if let Some(mixer) = mixer {
            mixer.stop();
        }
        self.note_activity();
        info!("[{}] Playback stopped", self.guild_id);
        Ok(())
    }

    /// Parses `SS`, `MM:SS` or `HH:MM:SS` and seeks there.
    pub async fn seek(self: &Arc<Self>, input: &str) -> Result<Duration, PlayerError> {
        let secs = parse_time(input).ok_or_else(|| PlayerError::InvalidTime(input.to_string()))?;
        self.seek_to(Duration::from_secs(secs)).await
    }

    /// Restarts the current track at `offset`. Rejected without any state
    /// change when `offset` is at or past the track's end.
    pub async fn seek_to(self: &Arc<Self>, offset: Duration) -> Result<Duration, PlayerError> {
        let resume_transport = {
            let mut st = self.state();
            let Some(track) = st.current.clone().filter(|_| st.playing) else {
                return Err(PlayerError::NothingPlaying);
            };
            if st.seeking || st.loading || st.advancing {
                return Err(PlayerError::Busy);
            }
            let duration = track.duration_secs();
            if offset >= Duration::from_secs(duration) {
                return Err(PlayerError::SeekBeyondDuration { duration });
            }

            st.seeking = true;
            if st.paused {
                st.paused = false;
                st.clock.resume();
                st.transport.clone()
            } else {
                None
            }
        };
        if let Some(transport) = resume_transport {
            transport.resume();
        }
        self.note_activity();

        self.advance(offset).await?;
        Ok(offset)
    }

    pub fn set_loop_mode(self: &Arc<Self>, mode: LoopMode) -> LoopMode {
        self.state().loop_mode = mode;
        self.note_activity();
        mode
    }

    pub fn set_loop_mode_str(self: &Arc<Self>, raw: &str) -> Result<LoopMode, PlayerError> {
        let mode = raw
            .parse::<LoopMode>()
            .map_err(PlayerError::InvalidLoopMode)?;
        Ok(self.set_loop_mode(mode))
    }

    /// Music volume in percent (0-200).
    pub async fn set_volume(self: &Arc<Self>, percent: i64) -> Result<u16, PlayerError> {
        let volume = validate_percent(percent)?;
        let mixer = {
            let mut st = self.state();
            st.volume = volume;
            st.mixer.clone()
        };
        if let Some(mixer) = mixer {
            mixer.set_gain(MUSIC_SOURCE, percent_to_gain(volume)).await;
        }
        self.note_activity();
        Ok(volume)
    }

    /// Speech-clip volume in percent (0-200), applied to live clips too.
    pub async fn set_tts_volume(self: &Arc<Self>, percent: i64) -> Result<u16, PlayerError> {
        let volume = validate_percent(percent)?;
        let mixer = {
            let mut st = self.state();
            st.tts_volume = volume;
            st.mixer.clone()
        };
        if let Some(mixer) = mixer {
            for name in mixer.producer_names() {
                if name.starts_with(SPEECH_SOURCE_PREFIX) {
                    mixer.set_gain(&name, percent_to_gain(volume)).await;
                }
            }
        }
        self.note_activity();
        Ok(volume)
    }

    pub fn now_playing(&self) -> Result<NowPlaying, PlayerError> {
        let st = self.state();
        match &st.current {
            Some(track) if st.playing => Ok(NowPlaying::new(
                track.info.clone(),
                st.position().as_secs(),
            )),
            _ => Err(PlayerError::NothingPlaying),
        }
    }

    // ── Speech overlay ───────────────────────────────────────────────────────

    /// Overlays a clip on whatever is playing. Returns the clip's producer name.
    pub async fn speak(self: &Arc<Self>, clip: Bytes) -> Result<String, PlayerError> {
        let transport = self
            .state()
            .connected_transport()
            .ok_or(PlayerError::NotConnected)?;

        let name = self.next_speech_name();
        let producer = self.services.producers.open_speech(&name, clip).await?;

        let (mixer, gain) = {
            let mut st = self.state();
            (self.ensure_mixer(&mut st), st.tts_gain())
        };
        let (mixer, _) = self.register(mixer, &name, producer, gain).await?;
        transport.play(mixer, self.transport_events.clone())?;

        self.note_activity();
        debug!("[{}] Speaking {}", self.guild_id, name);
        Ok(name)
    }

    /// Removes every live speech clip.
    pub async fn skip_speech(self: &Arc<Self>) -> usize {
        let Some(mixer) = self.state().mixer.clone() else {
            return 0;
        };
        let mut removed = 0;
        for name in mixer.producer_names() {
            if name.starts_with(SPEECH_SOURCE_PREFIX) && mixer.remove(&name).await {
                removed += 1;
            }
        }
        self.note_activity();
        removed
    }

    // ── Connection ───────────────────────────────────────────────────────────

    /// Connects, or moves, to `channel`. Moving keeps the mixer playing on
    /// the new connection.
    pub async fn join(
        self: &Arc<Self>,
        channel: ChannelId,
        text_channel: Option<ChannelId>,
    ) -> Result<(), PlayerError> {
        {
            let _conn = self.connection.lock().await;
            {
                let mut st = self.state();
                if text_channel.is_some() {
                    st.text_channel = text_channel;
                }
                if st.is_connected() && st.voice_channel == Some(channel) {
                    return Ok(());
                }
            }

            let transport = tokio::time::timeout(
                self.config.connect_timeout(),
                self.services.connector.connect(&self.guild_id, channel),
            )
            .await
            .map_err(|_| VoiceError::Timeout)??;

            let (previous, mixer, paused) = {
                let mut st = self.state();
                let previous = st.transport.replace(transport.clone());
                st.voice_channel = Some(channel);
                (previous, st.mixer.clone(), st.paused)
            };
            if let Some(previous) = previous {
                previous.stop();
                previous.disconnect().await;
            }
            if let Some(mixer) = mixer.filter(|m| m.is_active()) {
                transport.play(mixer, self.transport_events.clone())?;
                if paused {
                    transport.pause();
                }
            }
            info!("[{}] Joined voice channel {}", self.guild_id, channel);
        }
        self.note_activity();

        let pending = {
            let st = self.state();
            !st.playing && !st.loading && !st.queue.is_empty()
        };
        if pending {
            if let Err(e) = self.advance(Duration::ZERO).await {
                debug!("[{}] Could not start queued tracks: {}", self.guild_id, e);
            }
        }
        Ok(())
    }

    pub async fn leave(self: &Arc<Self>) -> Result<(), PlayerError> {
        let _conn = self.connection.lock().await;
        self.cancel_auto_leave();
        if self.teardown().await {
            info!("[{}] Left voice", self.guild_id);
            Ok(())
        } else {
            Err(PlayerError::NotConnected)
        }
    }

    /// The platform dropped the voice connection; cleans up like `leave`.
    pub async fn on_disconnected(self: &Arc<Self>) {
        let _conn = self.connection.lock().await;
        self.cancel_auto_leave();
        if self.teardown().await {
            warn!("[{}] Voice connection lost", self.guild_id);
        }
    }

    /// Clears queue and playback, stops the mixer and disconnects.
    /// Returns whether a connection existed.
    pub(super) async fn teardown(&self) -> bool {
        let (mixer, transport) = {
            let mut st = self.state();
            st.epoch += 1;
            st.queue.clear();
            st.reset_playback();
            st.voice_channel = None;
            st.listeners = None;
            (st.mixer.take(), st.transport.take())
        };
        if let Some(mixer) = mixer {
            mixer.stop();
        }
        match transport {
            Some(transport) => {
                transport.stop();
                transport.disconnect().await;
                true
            }
            None => false,
        }
    }

    // ── Listeners / auto-leave ───────────────────────────────────────────────

    /// Arms the auto-leave countdown when nobody is listening, disarms it
    /// otherwise.
    pub fn on_listeners_changed(self: &Arc<Self>, count: usize) {
        let connected = {
            let mut st = self.state();
            st.listeners = Some(count);
            st.is_connected()
        };
        if count == 0 && connected {
            self.schedule_auto_leave();
        } else {
            self.cancel_auto_leave();
        }
    }

    /// Records activity. A pending auto-leave restarts its countdown.
    pub(super) fn note_activity(self: &Arc<Self>) {
        let empty_channel = {
            let mut st = self.state();
            st.touch();
            st.listeners == Some(0) && st.is_connected()
        };
        if empty_channel && self.auto_leave.lock().is_some() {
            self.schedule_auto_leave();
        }
    }

    fn schedule_auto_leave(self: &Arc<Self>) {
        let player = Arc::downgrade(self);
        let delay = self.config.auto_leave_timeout();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(player) = player.upgrade() else {
                return;
            };
            let still_empty = {
                let st = player.state();
                st.is_connected() && st.listeners == Some(0)
            };
            if !still_empty {
                return;
            }

            // Detach first so leave() does not abort this task.
            player.auto_leave.lock().take();
            info!("[{}] Nobody listening, leaving voice", player.guild_id);
            player
                .notify(Notice::AutoLeft {
                    guild_id: player.guild_id.clone(),
                })
                .await;
            if let Err(e) = player.leave().await {
                debug!("[{}] Auto-leave: {}", player.guild_id, e);
            }
        });

        if let Some(previous) = self.auto_leave.lock().replace(task) {
            previous.abort();
        }
        debug!(
            "[{}] Auto-leave in {}s",
            self.guild_id,
            self.config.auto_leave_timeout().as_secs()
        );
    }

    fn cancel_auto_leave(&self) {
        if let Some(task) = self.auto_leave.lock().take() {
            task.abort();
            debug!("[{}] Auto-leave cancelled", self.guild_id);
        }
    }
}
