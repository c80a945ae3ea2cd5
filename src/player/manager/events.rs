use std::sync::Arc;

use tracing::{debug, warn};

use super::GuildPlayer;
use crate::{
    audio::{
        MixerEvent, MixerId, RemovalReason,
        constants::{MUSIC_SOURCE, SPEECH_SOURCE_PREFIX},
    },
    protocol::{LoopMode, Notice},
    voice::TransportEvent,
};

impl GuildPlayer {
    pub(super) async fn on_mixer_event(self: &Arc<Self>, event: MixerEvent) {
        if event.name == MUSIC_SOURCE {
            self.on_music_finished(event.mixer, event.generation, event.reason).await;
        } else if event.name.starts_with(SPEECH_SOURCE_PREFIX) {
            if let RemovalReason::Failed(e) = &event.reason {
                warn!("[{}] Speech clip {} failed: {}", self.guild_id, event.name, e);
            }
            let current = self.state().mixer_id() == Some(event.mixer);
            if current {
                self.cleanup_idle_mixer();
            }
        }
    }

    pub(super) async fn on_transport_event(self: &Arc<Self>, event: TransportEvent) {
        let TransportEvent::Finished { mixer, error } = event;
        let dead_mixer = {
            let mut st = self.state();
            if st.mixer_id() != Some(mixer) {
                debug!("[{}] Ignoring transport end for stale {}", self.guild_id, mixer);
                return;
            }
            st.mixer.take()
        };
        if let Some(dead) = dead_mixer {
            dead.stop();
        }

        let reason = match error {
            Some(message) => RemovalReason::Failed(crate::audio::ProducerError::Io(message)),
            None => RemovalReason::Finished,
        };
        self.complete_music(mixer, None, reason).await;
    }

    /// The `"music"` producer left `mixer`, by finishing, failing or being
    /// removed (skip).
    async fn on_music_finished(
        self: &Arc<Self>,
        mixer: MixerId,
        generation: u64,
        reason: RemovalReason,
    ) {
        self.complete_music(mixer, Some(generation), reason).await;
    }

    /// Applies loop mode to the finished track and advances, at most once per
    /// end of playback.
    ///
    /// `generation` is `None` when the transport reported the end; the caller
    /// has already detached the mixer.
    async fn complete_music(
        self: &Arc<Self>,
        mixer: MixerId,
        generation: Option<u64>,
        reason: RemovalReason,
    ) {
        let failed_title = {
            let mut st = self.state();
            if st.seeking || st.advancing || !st.playing {
                debug!(
                    "[{}] Ignoring music end on {} (seeking={}, advancing={}, playing={})",
                    self.guild_id, mixer, st.seeking, st.advancing, st.playing
                );
                return;
            }
            if let Some(generation) = generation {
                if st.mixer_id() != Some(mixer) {
                    warn!("[{}] Ignoring music end from stale {}", self.guild_id, mixer);
                    return;
                }
                // A producer replaced by a seek can report after the seek settled.
                if st.music_generation != Some(generation) {
                    debug!(
                        "[{}] Ignoring music end of replaced producer #{} on {}",
                        self.guild_id, generation, mixer
                    );
                    return;
                }
            }

            st.advancing = true;
            let finished = st.current.take();
            let failed_title = match &reason {
                RemovalReason::Failed(_) => finished.as_ref().map(|t| t.title().to_string()),
                _ => None,
            };
            // Skips never repeat the skipped track; failed tracks are dropped.
            match (st.loop_mode, finished, &reason) {
                (LoopMode::RepeatOne, Some(track), RemovalReason::Finished) => {
                    st.current = Some(track);
                }
                (LoopMode::RepeatAll, Some(track), RemovalReason::Finished | RemovalReason::Removed) => {
                    st.queue.push_back_force(track);
                }
                _ => {}
            }
            st.playing = false;
            st.paused = false;
            st.music_generation = None;
            st.clock.reset();
            failed_title
        };

        if let RemovalReason::Failed(e) = &reason {
            let title = failed_title;
            self.notify(Notice::PlaybackError {
                guild_id: self.guild_id.clone(),
                title,
                message: e.to_string(),
            })
            .await;
        }

        let result = self.advance(std::time::Duration::ZERO).await;
        self.state().advancing = false;
        if let Err(e) = result {
            debug!("[{}] Advance after track end: {}", self.guild_id, e);
        }
    }
}
