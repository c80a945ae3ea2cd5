use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};

use super::GuildPlayer;
use crate::{
    audio::{AudioProducer, Mixer, StreamLocator, constants::MUSIC_SOURCE},
    player::error::PlayerError,
    protocol::{LoopMode, Notice, Track},
    sources::ResolveError,
};

enum Next {
    Play {
        track: Arc<Track>,
        epoch: u64,
        seeking: bool,
        /// Popped from the queue, as opposed to replaying `current`.
        from_queue: bool,
    },
    /// Already playing or loading.
    Busy,
    Disconnected,
    Ended {
        was_active: bool,
    },
}

/// Outcome of trying to start one track.
enum Start {
    Playing,
    /// Stop or leave happened while this attempt was suspended.
    Superseded,
}

impl GuildPlayer {
    /// Starts the next track.
    ///
    /// A no-op while something is playing or loading, unless a seek is in
    /// progress, in which case the current track restarts at `offset`.
    /// Tracks that fail to resolve or open are reported and skipped; the
    /// first such failure is returned after the queue has moved on.
    pub(crate) async fn advance(self: &Arc<Self>, offset: Duration) -> Result<(), PlayerError> {
        let mut offset = offset;
        let mut first_error = None;

        loop {
            let (track, epoch, seeking, from_queue) = match self.select_next() {
                Next::Play {
                    track,
                    epoch,
                    seeking,
                    from_queue,
                } => (track, epoch, seeking, from_queue),
                Next::Busy => return first_error.map_or(Ok(()), Err),
                Next::Disconnected => {
                    debug!("[{}] Not connected, leaving queue untouched", self.guild_id);
                    return first_error.map_or(Err(PlayerError::NotConnected), Err);
                }
                Next::Ended { was_active } => {
                    info!("[{}] Queue finished", self.guild_id);
                    if was_active || first_error.is_some() {
                        self.notify(Notice::QueueEnded {
                            guild_id: self.guild_id.clone(),
                        })
                        .await;
                    }
                    self.cleanup_idle_mixer();
                    return first_error.map_or(Ok(()), Err);
                }
            };

            match self.start_track(&track, epoch, offset).await {
                Ok(Start::Playing) => {
                    if !seeking {
                        info!("[{}] Now playing '{}'", self.guild_id, track.title());
                        self.notify(Notice::NowPlaying {
                            guild_id: self.guild_id.clone(),
                            track: track.info.clone(),
                        })
                        .await;
                    } else {
                        info!(
                            "[{}] Seeked '{}' to {}s",
                            self.guild_id,
                            track.title(),
                            offset.as_secs()
                        );
                    }
                    return first_error.map_or(Ok(()), Err);
                }
                Ok(Start::Superseded) => return first_error.map_or(Ok(()), Err),
                Err(PlayerError::NotConnected) => {
                    let mut st = self.state();
                    if st.epoch == epoch {
                        st.loading = false;
                        st.seeking = false;
                        // A replayed track stays current for the next join.
                        if from_queue {
                            st.current = None;
                            st.queue.push_front(track);
                        }
                    }
                    return Err(PlayerError::NotConnected);
                }
                Err(e) => {
                    error!("[{}] Failed to play '{}': {}", self.guild_id, track.title(), e);
                    self.notify(Notice::PlaybackError {
                        guild_id: self.guild_id.clone(),
                        title: Some(track.title().to_string()),
                        message: e.to_string(),
                    })
                    .await;

                    let stale_music = {
                        let mut st = self.state();
                        if st.epoch != epoch {
                            return first_error.map_or(Err(e), Err);
                        }
                        // Discard the offending track and move on.
                        st.reset_playback();
                        st.mixer.clone().filter(|_| seeking)
                    };
                    // A failed seek leaves the old producer running.
                    if let Some(mixer) = stale_music {
                        mixer.remove(MUSIC_SOURCE).await;
                    }

                    first_error.get_or_insert(e);
                    offset = Duration::ZERO;
                }
            }
        }
    }

    /// Picks what to play: the current track when seeking or repeating one,
    /// otherwise the queue head. Marks the session as loading.
    fn select_next(&self) -> Next {
        let mut st = self.state();
        if (st.playing || st.loading) && !st.seeking {
            return Next::Busy;
        }
        if !st.is_connected() {
            st.seeking = false;
            return Next::Disconnected;
        }

        let replay = st.seeking || (st.loop_mode == LoopMode::RepeatOne && st.current.is_some());
        let next = if replay {
            st.current.clone()
        } else {
            st.queue.pop_front()
        };

        match next {
            Some(track) => {
                st.current = Some(track.clone());
                st.loading = true;
                Next::Play {
                    track,
                    epoch: st.epoch,
                    seeking: st.seeking,
                    from_queue: !replay,
                }
            }
            None => {
                let was_active = st.current.is_some() || st.playing;
                st.reset_playback();
                Next::Ended { was_active }
            }
        }
    }

    async fn start_track(
        self: &Arc<Self>,
        track: &Arc<Track>,
        epoch: u64,
        offset: Duration,
    ) -> Result<Start, PlayerError> {
        let locator = self.locate(track).await?;
        if self.state().epoch != epoch {
            return Ok(Start::Superseded);
        }

        let producer = self
            .services
            .producers
            .open_music(track.title(), &locator, offset)
            .await?;

        let (mixer, gain, transport) = {
            let mut st = self.state();
            if st.epoch != epoch {
                drop(st);
                discard(producer);
                return Ok(Start::Superseded);
            }
            let Some(transport) = st.connected_transport() else {
                drop(st);
                discard(producer);
                return Err(PlayerError::NotConnected);
            };
            (self.ensure_mixer(&mut st), st.music_gain(), transport)
        };

        let (mixer, generation) = self.register(mixer, MUSIC_SOURCE, producer, gain).await?;

        transport.play(mixer.clone(), self.transport_events.clone())?;
        if transport.is_paused() {
            transport.resume();
        }

        let mut st = self.state();
        if st.epoch != epoch {
            // Stop already tore the mixer down.
            return Ok(Start::Superseded);
        }
        st.playing = true;
        st.paused = false;
        st.loading = false;
        st.seeking = false;
        st.music_generation = Some(generation);
        st.clock.start(offset);
        st.touch();
        Ok(Start::Playing)
    }

    /// Resolves once per track; later replays reuse the stored locator.
    async fn locate(&self, track: &Track) -> Result<StreamLocator, PlayerError> {
        if let Some(locator) = track.stream() {
            return Ok(locator.clone());
        }

        let resolved = tokio::time::timeout(
            self.config.resolve_timeout(),
            self.services.resolver.resolve(track),
        )
        .await
        .map_err(|_| ResolveError::Timeout)??;

        debug!(
            "[{}] '{}' resolved via {} to {}",
            self.guild_id,
            track.title(),
            self.services.resolver.name(),
            resolved
        );
        Ok(track.resolve_with(resolved).clone())
    }

    /// Current mixer, created if absent.
    pub(super) fn ensure_mixer(
        &self,
        st: &mut crate::player::context::GuildPlayback,
    ) -> Arc<Mixer> {
        st.mixer
            .get_or_insert_with(|| {
                let mixer = Arc::new(Mixer::new(self.mixer_events.clone()));
                debug!("[{}] Created {}", self.guild_id, mixer.id());
                mixer
            })
            .clone()
    }

    /// Adds `producer` to `mixer` and returns the mixer it landed on with the
    /// registration's generation. If that mixer was stopped in the meantime
    /// (idle teardown), retries once on the session's fresh mixer.
    pub(super) async fn register(
        &self,
        mixer: Arc<Mixer>,
        name: &str,
        producer: Box<dyn AudioProducer>,
        gain: f32,
    ) -> Result<(Arc<Mixer>, u64), PlayerError> {
        let producer = match mixer.add(name, producer, gain).await {
            Ok(generation) => return Ok((mixer, generation)),
            Err(producer) => producer,
        };

        warn!("[{}] {} was stopped, retrying on a new mixer", self.guild_id, mixer.id());
        let fresh = {
            let mut st = self.state();
            if st.mixer.as_ref().is_some_and(|m| Arc::ptr_eq(m, &mixer)) {
                st.mixer = None;
            }
            self.ensure_mixer(&mut st)
        };
        match fresh.add(name, producer, gain).await {
            Ok(generation) => Ok((fresh, generation)),
            Err(producer) => {
                discard(producer);
                Err(PlayerError::Busy)
            }
        }
    }

    /// Tears the mixer down once music has ended and no speech clip remains.
    pub(crate) fn cleanup_idle_mixer(&self) {
        let mixer = {
            let mut st = self.state();
            if st.playing || st.loading {
                return;
            }
            match &st.mixer {
                Some(mixer) if !mixer.has_producers() => st.mixer.take(),
                _ => None,
            }
        };

        if let Some(mixer) = mixer {
            debug!("[{}] Tearing down idle {}", self.guild_id, mixer.id());
            mixer.stop();
        }
    }
}

fn discard(mut producer: Box<dyn AudioProducer>) {
    producer.cleanup();
}
