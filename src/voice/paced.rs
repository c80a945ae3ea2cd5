//! `PacedTransport`: local voice transport.
//!
//! One pull loop per played mixer, ticking every [`FRAME_DURATION_MS`].
//! Missed ticks are skipped rather than bursted, so a stalled runtime never
//! drains the mixer faster than real time.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{FrameSink, TransportEvent, VoiceError, VoiceTransport};
use crate::{
    audio::{
        Mixer, MixerId,
        constants::{FRAME_DURATION_MS, SILENCE_FRAME},
    },
    common::types::GuildId,
};

type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

struct PullLoop {
    mixer: MixerId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PacedTransport {
    guild: GuildId,
    sink: SharedSink,
    paused: Arc<AtomicBool>,
    connected: AtomicBool,
    current: Mutex<Option<PullLoop>>,
}

impl PacedTransport {
    pub fn new(guild: GuildId, sink: Box<dyn FrameSink>) -> Self {
        Self {
            guild,
            sink: Arc::new(Mutex::new(sink)),
            paused: Arc::new(AtomicBool::new(false)),
            connected: AtomicBool::new(true),
            current: Mutex::new(None),
        }
    }

    fn cancel_current(&self) {
        if let Some(running) = self.current.lock().take() {
            running.cancel.cancel();
        }
    }
}

#[async_trait]
impl VoiceTransport for PacedTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn is_playing(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn current_mixer(&self) -> Option<MixerId> {
        self.current
            .lock()
            .as_ref()
            .filter(|r| !r.handle.is_finished())
            .map(|r| r.mixer)
    }

    fn play(
        &self,
        mixer: Arc<Mixer>,
        events: flume::Sender<TransportEvent>,
    ) -> Result<(), VoiceError> {
        if !self.is_connected() {
            return Err(VoiceError::Connect("transport is disconnected".into()));
        }

        let mut current = self.current.lock();
        if let Some(running) = current.as_ref() {
            if running.mixer == mixer.id() && !running.handle.is_finished() {
                return Ok(());
            }
        }
        if let Some(previous) = current.take() {
            previous.cancel.cancel();
        }

        self.paused.store(false, Ordering::Release);
        let cancel = CancellationToken::new();
        let mixer_id = mixer.id();
        let handle = tokio::spawn(pull_loop(
            self.guild.clone(),
            mixer,
            self.sink.clone(),
            self.paused.clone(),
            cancel.clone(),
            events,
        ));

        *current = Some(PullLoop {
            mixer: mixer_id,
            cancel,
            handle,
        });
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    fn stop(&self) {
        self.cancel_current();
        self.paused.store(false, Ordering::Release);
    }

    async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        self.stop();
        if let Err(e) = self.sink.lock().finish() {
            error!("[{}] Failed to finalize voice sink: {}", self.guild, e);
        }
        info!("[{}] Voice transport disconnected", self.guild);
    }
}

impl Drop for PacedTransport {
    fn drop(&mut self) {
        self.cancel_current();
    }
}

async fn pull_loop(
    guild: GuildId,
    mixer: Arc<Mixer>,
    sink: SharedSink,
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: flume::Sender<TransportEvent>,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut frame = SILENCE_FRAME;
    let mut frames_sent: u64 = 0;
    debug!("[{}] Pull loop started on {}", guild, mixer.id());

    let error = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[{}] Pull loop on {} cancelled after {} frames", guild, mixer.id(), frames_sent);
                return;
            }
            _ = interval.tick() => {
                if paused.load(Ordering::Acquire) {
                    continue;
                }
                if !mixer.pull(&mut frame) {
                    break None;
                }
                if let Err(e) = sink.lock().write_frame(&frame) {
                    error!("[{}] Voice sink failed: {}", guild, e);
                    break Some(e.to_string());
                }
                frames_sent += 1;
            }
        }
    };

    debug!(
        "[{}] Pull loop on {} finished after {} frames",
        guild,
        mixer.id(),
        frames_sent
    );
    let _ = events.send(TransportEvent::Finished {
        mixer: mixer.id(),
        error,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::producer::testing::ConstProducer, voice::sink::testing::MemorySink};

    fn setup() -> (PacedTransport, MemorySink, Arc<Mixer>) {
        let sink = MemorySink::default();
        let transport = PacedTransport::new(GuildId::from("g"), Box::new(sink.clone()));
        let (tx, _rx) = flume::unbounded();
        (transport, sink, Arc::new(Mixer::new(tx)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulls_at_frame_cadence_until_mixer_stops() {
        let (transport, sink, mixer) = setup();
        let (producer, _) = ConstProducer::new(5, 1000);
        mixer.add("music", Box::new(producer), 1.0).await.ok();

        let (events_tx, events_rx) = flume::unbounded();
        transport.play(mixer.clone(), events_tx).expect("plays");
        assert_eq!(transport.current_mixer(), Some(mixer.id()));

        tokio::time::sleep(Duration::from_millis(FRAME_DURATION_MS * 10)).await;
        let pulled = sink.heads.lock().len();
        assert!((10..=11).contains(&pulled), "pulled {}", pulled);
        assert!(sink.heads.lock().iter().all(|&s| s == 5));

        mixer.stop();
        let event = events_rx.recv_async().await.expect("finished event");
        assert_eq!(
            event,
            TransportEvent::Finished {
                mixer: mixer.id(),
                error: None
            }
        );
        tokio::task::yield_now().await;
        assert!(!transport.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_consumption() {
        let (transport, sink, mixer) = setup();
        let (events_tx, _events_rx) = flume::unbounded();
        transport.play(mixer.clone(), events_tx).expect("plays");

        tokio::time::sleep(Duration::from_millis(100)).await;
        transport.pause();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let frozen = sink.heads.lock().len();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.heads.lock().len(), frozen);
        assert!(transport.is_playing());

        transport.resume();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.heads.lock().len() > frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_sends_no_event_and_disconnect_refuses_play() {
        let (transport, _sink, mixer) = setup();
        let (events_tx, events_rx) = flume::unbounded();
        transport.play(mixer.clone(), events_tx.clone()).expect("plays");
        transport.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events_rx.try_recv().is_err());
        assert!(!transport.is_playing());

        transport.disconnect().await;
        assert!(!transport.is_connected());
        assert!(transport.play(mixer, events_tx).is_err());
    }
}
