//! `Mixer`: name-keyed multi-producer PCM mixer.
//!
//! The map of producers is shared between two contexts:
//! - the real-time pull loop, which calls [`Mixer::pull`] every 20 ms;
//! - the scheduling side, which adds, removes and re-gains producers.
//!
//! Both go through one short `parking_lot` lock that is held only to snapshot
//! or edit the map, never across a producer read. Scheduling-side edits are
//! additionally serialized against each other by an async lock the pull path
//! never touches.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::audio::{
    constants::{FRAME_SIZE_BYTES, FRAME_SIZE_SAMPLES, Frame},
    producer::{AudioProducer, ProducerCell, ProducerError},
};

/// Identity token of a mixer instance. Notifications carry it so a stale
/// mixer's events can be told apart from the session's current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MixerId(u64);

impl MixerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for MixerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mixer#{}", self.0)
    }
}

/// Why a producer left the mixer.
#[derive(Debug, Clone, PartialEq)]
pub enum RemovalReason {
    /// Returned an empty or short frame.
    Finished,
    /// `read` failed; handled like completion.
    Failed(ProducerError),
    /// Explicit [`Mixer::remove`].
    Removed,
}

/// Per-name removal notification.
#[derive(Debug, Clone)]
pub struct MixerEvent {
    pub mixer: MixerId,
    pub name: String,
    /// Registration the event belongs to, as returned by [`Mixer::add`].
    pub generation: u64,
    pub reason: RemovalReason,
}

struct Entry {
    producer: Arc<ProducerCell>,
    gain: f32,
    generation: u64,
}

struct Live {
    name: Arc<str>,
    cell: Arc<ProducerCell>,
    gain: f32,
    generation: u64,
}

pub struct Mixer {
    id: MixerId,
    entries: Mutex<HashMap<Arc<str>, Entry>>,
    ops: tokio::sync::Mutex<()>,
    active: AtomicBool,
    generations: AtomicU64,
    events: flume::Sender<MixerEvent>,
}

impl Mixer {
    /// `events` receives one [`MixerEvent`] per removed producer. Sending never
    /// blocks, so the pull loop can emit from the real-time thread.
    pub fn new(events: flume::Sender<MixerEvent>) -> Self {
        Self {
            id: MixerId::next(),
            entries: Mutex::new(HashMap::new()),
            ops: tokio::sync::Mutex::new(()),
            active: AtomicBool::new(true),
            generations: AtomicU64::new(0),
            events,
        }
    }

    pub fn id(&self) -> MixerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mixes one frame into `out`.
    ///
    /// Returns `false` once the mixer is stopped; that is the "no more audio"
    /// signal for the voice transport and `out` is left untouched.
    pub fn pull(&self, out: &mut Frame) -> bool {
        if !self.is_active() {
            return false;
        }

        let snapshot: Vec<Live> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .map(|(name, e)| Live {
                    name: name.clone(),
                    cell: e.producer.clone(),
                    gain: e.gain,
                    generation: e.generation,
                })
                .collect()
        };

        let mut acc = [0i32; FRAME_SIZE_SAMPLES];
        let mut scratch = [0i16; FRAME_SIZE_SAMPLES];
        let mut finished: Vec<(Live, RemovalReason)> = Vec::new();

        for live in snapshot {
            scratch.fill(0);
            match live.cell.read(&mut scratch) {
                Ok(0) => finished.push((live, RemovalReason::Finished)),
                Ok(n) => {
                    accumulate(&mut acc, &scratch, live.gain);
                    if n < FRAME_SIZE_SAMPLES {
                        finished.push((live, RemovalReason::Finished));
                    }
                }
                Err(e) => {
                    warn!("{}: producer '{}' failed during read: {}", self.id, live.name, e);
                    finished.push((live, RemovalReason::Failed(e)));
                }
            }
        }

        for (dst, &sum) in out.iter_mut().zip(acc.iter()) {
            *dst = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }

        if !finished.is_empty() {
            self.retire(finished);
        }

        true
    }

    /// [`pull`](Self::pull) as little-endian bytes: exactly
    /// [`FRAME_SIZE_BYTES`] or `None`.
    pub fn pull_bytes(&self) -> Option<Vec<u8>> {
        let mut frame = [0i16; FRAME_SIZE_SAMPLES];
        if !self.pull(&mut frame) {
            return None;
        }
        let mut bytes = Vec::with_capacity(FRAME_SIZE_BYTES);
        for sample in frame {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Some(bytes)
    }

    /// Drops finished producers, but only those still registered under the
    /// same name: a producer replaced mid-frame (seek) must not take its
    /// replacement with it.
    fn retire(&self, finished: Vec<(Live, RemovalReason)>) {
        let mut removed = Vec::with_capacity(finished.len());
        {
            let mut entries = self.entries.lock();
            for (live, reason) in finished {
                let still_registered = entries
                    .get(&live.name)
                    .is_some_and(|e| Arc::ptr_eq(&e.producer, &live.cell));
                if still_registered {
                    entries.remove(&live.name);
                    removed.push((live, reason));
                }
            }
        }

        for (live, reason) in removed {
            live.cell.cleanup();
            self.notify(&live.name, live.generation, reason);
        }
    }

    /// Registers `producer` under `name`, replacing and cleaning up any
    /// producer already there, and returns the registration's generation.
    /// A stopped mixer hands the producer back.
    pub async fn add(
        &self,
        name: impl Into<String>,
        producer: Box<dyn AudioProducer>,
        gain: f32,
    ) -> Result<u64, Box<dyn AudioProducer>> {
        let _guard = self.ops.lock().await;
        if !self.is_active() {
            return Err(producer);
        }

        let name: Arc<str> = Arc::from(name.into());
        let cell = Arc::new(ProducerCell::new(producer));
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.entries.lock().insert(
            name.clone(),
            Entry {
                producer: cell,
                gain: gain.max(0.0),
                generation,
            },
        );

        if let Some(old) = previous {
            debug!("{}: replacing producer '{}'", self.id, name);
            old.producer.cleanup();
        } else {
            debug!("{}: added producer '{}'", self.id, name);
        }
        Ok(generation)
    }

    /// Removes and cleans up `name`. Fires the removal notification once,
    /// after every lock has been released. Returns whether it was present.
    pub async fn remove(&self, name: &str) -> bool {
        let removed = {
            let _guard = self.ops.lock().await;
            let removed = self.entries.lock().remove(name);
            if let Some(entry) = &removed {
                entry.producer.cleanup();
            }
            removed
        };

        match removed {
            Some(entry) => {
                debug!("{}: removed producer '{}'", self.id, name);
                self.notify(name, entry.generation, RemovalReason::Removed);
                true
            }
            None => false,
        }
    }

    /// Negative gains clamp to zero. Applies from the next pull.
    pub async fn set_gain(&self, name: &str, gain: f32) -> bool {
        let _guard = self.ops.lock().await;
        match self.entries.lock().get_mut(name) {
            Some(entry) => {
                entry.gain = gain.max(0.0);
                true
            }
            None => false,
        }
    }

    pub fn gain(&self, name: &str) -> Option<f32> {
        self.entries.lock().get(name).map(|e| e.gain)
    }

    /// Marks the mixer inactive and cleans up every producer. No removal
    /// notifications are sent; every later pull returns `false`.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
        let drained: Vec<Entry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        debug!("{}: stopped with {} producer(s)", self.id, drained.len());
        for entry in drained {
            entry.producer.cleanup();
        }
    }

    pub fn has_producers(&self) -> bool {
        !self.entries.lock().is_empty()
    }

    pub fn producer_names(&self) -> Vec<String> {
        self.entries.lock().keys().map(|k| k.to_string()).collect()
    }

    fn notify(&self, name: &str, generation: u64, reason: RemovalReason) {
        let event = MixerEvent {
            mixer: self.id,
            name: name.to_string(),
            generation,
            reason,
        };
        if self.events.send(event).is_err() {
            debug!("{}: removal of '{}' had no listener", self.id, name);
        }
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        if self.is_active() {
            self.stop();
        }
    }
}

fn accumulate(acc: &mut [i32], samples: &[i16], gain: f32) {
    if (gain - 1.0).abs() < f32::EPSILON {
        for (a, &s) in acc.iter_mut().zip(samples) {
            *a += s as i32;
        }
    } else {
        for (a, &s) in acc.iter_mut().zip(samples) {
            *a += (s as f32 * gain).round() as i32;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::Ordering, mpsc};

    use super::*;
    use crate::audio::producer::testing::ConstProducer;

    fn mixer() -> (Arc<Mixer>, flume::Receiver<MixerEvent>) {
        let (tx, rx) = flume::unbounded();
        (Arc::new(Mixer::new(tx)), rx)
    }

    fn pull(m: &Mixer) -> Option<Frame> {
        let mut frame = [0i16; FRAME_SIZE_SAMPLES];
        m.pull(&mut frame).then_some(frame)
    }

    #[tokio::test]
    async fn test_pull_is_full_frame_or_nothing() {
        let (m, _rx) = mixer();
        assert_eq!(m.pull_bytes().map(|b| b.len()), Some(FRAME_SIZE_BYTES));

        let (p, _) = ConstProducer::new(100, 1);
        assert!(m.add("music", Box::new(p), 1.0).await.is_ok());
        assert_eq!(m.pull_bytes().map(|b| b.len()), Some(FRAME_SIZE_BYTES));
        assert!(m.remove("music").await);
        assert_eq!(m.pull_bytes().map(|b| b.len()), Some(FRAME_SIZE_BYTES));

        m.stop();
        assert!(m.pull_bytes().is_none());
    }

    #[tokio::test]
    async fn test_sum_saturates_instead_of_averaging() {
        let (m, _rx) = mixer();
        let (a, _) = ConstProducer::new(30_000, 4);
        let (b, _) = ConstProducer::new(30_000, 4);
        m.add("a", Box::new(a), 1.0).await.ok();
        m.add("b", Box::new(b), 1.0).await.ok();

        let frame = pull(&m).expect("frame");
        assert!(frame.iter().all(|&s| s == i16::MAX));

        let (m, _rx) = mixer();
        let (a, _) = ConstProducer::new(-30_000, 4);
        let (b, _) = ConstProducer::new(-30_000, 4);
        m.add("a", Box::new(a), 1.0).await.ok();
        m.add("b", Box::new(b), 1.0).await.ok();
        let frame = pull(&m).expect("frame");
        assert!(frame.iter().all(|&s| s == i16::MIN));
    }

    #[tokio::test]
    async fn test_gain_is_rounded_per_sample() {
        let (m, _rx) = mixer();
        let (a, _) = ConstProducer::new(1001, 2);
        m.add("a", Box::new(a), 0.5).await.ok();
        let frame = pull(&m).expect("frame");
        assert!(frame.iter().all(|&s| s == 501));

        assert!(m.set_gain("a", -3.0).await);
        assert_eq!(m.gain("a"), Some(0.0));
        let frame = pull(&m).expect("frame");
        assert!(frame.iter().all(|&s| s == 0));
    }

    #[tokio::test]
    async fn test_finished_producer_is_removed_and_reported_once() {
        let (m, rx) = mixer();
        let (a, cleanups) = ConstProducer::new(10, 2);
        m.add("music", Box::new(a), 1.0).await.ok();

        assert!(pull(&m).is_some_and(|f| f[0] == 10));
        assert!(pull(&m).is_some_and(|f| f[0] == 10));
        // Third read is empty: silence this frame, removal afterwards.
        assert!(pull(&m).is_some_and(|f| f.iter().all(|&s| s == 0)));
        assert!(pull(&m).is_some());

        assert!(!m.has_producers());
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        let events: Vec<MixerEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "music");
        assert_eq!(events[0].mixer, m.id());
        assert_eq!(events[0].reason, RemovalReason::Finished);
    }

    #[tokio::test]
    async fn test_short_frame_is_padded_then_retired() {
        let (m, rx) = mixer();
        let (mut a, _) = ConstProducer::new(5, 0);
        a.partial_tail = Some(100);
        m.add("tts_1", Box::new(a), 1.0).await.ok();

        let frame = pull(&m).expect("frame");
        assert!(frame[..100].iter().all(|&s| s == 5));
        assert!(frame[100..].iter().all(|&s| s == 0));
        assert!(!m.has_producers());
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_read_is_reported_as_failure() {
        let (m, rx) = mixer();
        let (mut a, cleanups) = ConstProducer::new(5, 10);
        a.fail = true;
        m.add("music", Box::new(a), 1.0).await.ok();

        let frame = pull(&m).expect("frame");
        assert!(frame.iter().all(|&s| s == 0));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        let event = rx.try_recv().expect("event");
        assert!(matches!(event.reason, RemovalReason::Failed(_)));
    }

    #[tokio::test]
    async fn test_remove_cleans_up_once_and_silences_output() {
        let (m, rx) = mixer();
        let (a, cleanups) = ConstProducer::new(1234, 100);
        m.add("music", Box::new(a), 1.0).await.ok();
        assert!(pull(&m).is_some_and(|f| f[0] == 1234));

        assert!(m.remove("music").await);
        assert!(!m.remove("music").await);

        for _ in 0..3 {
            assert!(pull(&m).is_some_and(|f| f.iter().all(|&s| s == 0)));
        }
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        let events: Vec<MixerEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, RemovalReason::Removed);
    }

    #[tokio::test]
    async fn test_replacement_during_read_keeps_new_producer() {
        struct Gated {
            reading: mpsc::Sender<()>,
            go: mpsc::Receiver<()>,
            cleanups: Arc<std::sync::atomic::AtomicUsize>,
        }

        impl AudioProducer for Gated {
            fn read(&mut self, _out: &mut [i16]) -> Result<usize, ProducerError> {
                let _ = self.reading.send(());
                let _ = self.go.recv();
                Ok(0)
            }

            fn cleanup(&mut self) {
                self.cleanups.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (m, rx) = mixer();
        let (reading_tx, reading_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel();
        let old_cleanups = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let old = Gated {
            reading: reading_tx,
            go: go_rx,
            cleanups: old_cleanups.clone(),
        };
        m.add("music", Box::new(old), 1.0).await.ok();

        let puller = {
            let m = m.clone();
            std::thread::spawn(move || pull(&m))
        };
        reading_rx.recv().expect("old producer is being read");

        let (new, new_cleanups) = ConstProducer::new(77, 10);
        m.add("music", Box::new(new), 1.0).await.ok();
        go_tx.send(()).expect("release old producer");
        puller.join().expect("pull thread");

        assert_eq!(old_cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(new_cleanups.load(Ordering::SeqCst), 0);
        assert!(m.has_producers());
        assert_eq!(rx.try_iter().count(), 0);
        assert!(pull(&m).is_some_and(|f| f[0] == 77));
    }

    #[tokio::test]
    async fn test_events_carry_the_registration_generation() {
        let (m, rx) = mixer();
        let (a, _) = ConstProducer::new(1, 1);
        let first = m.add("music", Box::new(a), 1.0).await.ok().expect("added");
        let (b, _) = ConstProducer::new(2, 1);
        let second = m.add("music", Box::new(b), 1.0).await.ok().expect("added");
        assert_ne!(first, second);

        // The replaced registration never reports; the live one does.
        assert!(pull(&m).is_some_and(|f| f[0] == 2));
        assert!(pull(&m).is_some());
        let events: Vec<MixerEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].generation, second);

        let (c, _) = ConstProducer::new(3, 10);
        let third = m.add("music", Box::new(c), 1.0).await.ok().expect("added");
        assert!(m.remove("music").await);
        let event = rx.try_recv().expect("event");
        assert_eq!(event.generation, third);
        assert_eq!(event.reason, RemovalReason::Removed);
    }

    #[tokio::test]
    async fn test_stop_cleans_everything_silently() {
        let (m, rx) = mixer();
        let (a, ca) = ConstProducer::new(1, 10);
        let (b, cb) = ConstProducer::new(1, 10);
        m.add("music", Box::new(a), 1.0).await.ok();
        m.add("tts_1", Box::new(b), 1.0).await.ok();

        m.stop();
        assert!(pull(&m).is_none());
        assert!(!m.has_producers());
        assert_eq!(ca.load(Ordering::SeqCst), 1);
        assert_eq!(cb.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_iter().count(), 0);

        let (c, cc) = ConstProducer::new(1, 10);
        assert!(m.add("music", Box::new(c), 1.0).await.is_err());
        assert_eq!(cc.load(Ordering::SeqCst), 0);
    }
}
