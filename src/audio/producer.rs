//! The capability every audio source fed into the [`Mixer`](crate::audio::Mixer)
//! implements, plus the wrapper that guarantees single cleanup.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProducerError {
    #[error("decode error: {0}")]
    Decode(String),
    #[error("i/o error: {0}")]
    Io(String),
    #[error("unsupported stream: {0}")]
    Unsupported(String),
}

/// Pull-based PCM source.
///
/// `read` fills `out` (one interleaved stereo frame) and returns how many
/// samples it wrote. `Ok(0)` means the producer is finished; a short count is
/// a final partial frame. Errors are treated as completion by the mixer.
pub trait AudioProducer: Send {
    fn read(&mut self, out: &mut [i16]) -> Result<usize, ProducerError>;

    /// Releases decode threads, buffers and similar resources.
    fn cleanup(&mut self);

    /// Short label for logs.
    fn label(&self) -> &str {
        "producer"
    }
}

/// Shared slot holding a registered producer.
///
/// The mixer's pull path reads through it from the real-time thread while the
/// scheduling side may clean it up. Neither side ever waits on the other:
/// a cleanup requested mid-read is finished by the reader once its read
/// returns. The producer's own cleanup runs exactly once.
pub struct ProducerCell {
    inner: Mutex<Box<dyn AudioProducer>>,
    requested: AtomicBool,
    cleaned: AtomicBool,
}

impl ProducerCell {
    pub fn new(producer: Box<dyn AudioProducer>) -> Self {
        Self {
            inner: Mutex::new(producer),
            requested: AtomicBool::new(false),
            cleaned: AtomicBool::new(false),
        }
    }

    /// Never blocks: if the slot is busy being cleaned up, this frame is silent.
    pub fn read(&self, out: &mut [i16]) -> Result<usize, ProducerError> {
        if self.requested.load(Ordering::SeqCst) {
            self.finish_cleanup();
            return Ok(0);
        }
        let result = match self.inner.try_lock() {
            Some(mut producer) => producer.read(out).map(|n| n.min(out.len())),
            None => {
                out.fill(0);
                Ok(out.len())
            }
        };
        // A cleanup may have been requested while this read held the slot.
        self.finish_cleanup();
        result
    }

    /// Requests cleanup without blocking. Returns `true` for the first
    /// request; later calls are no-ops.
    pub fn cleanup(&self) -> bool {
        if self.requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.finish_cleanup();
        true
    }

    /// Whether the producer's own cleanup has run.
    pub fn is_cleaned(&self) -> bool {
        self.cleaned.load(Ordering::SeqCst)
    }

    /// Runs a requested cleanup if the slot is free. Whoever holds the slot
    /// calls this again on release, so a request is never lost.
    fn finish_cleanup(&self) {
        if !self.requested.load(Ordering::SeqCst) || self.cleaned.load(Ordering::SeqCst) {
            return;
        }
        if let Some(mut producer) = self.inner.try_lock() {
            if !self.cleaned.swap(true, Ordering::SeqCst) {
                tracing::debug!("Cleaning up producer '{}'", producer.label());
                producer.cleanup();
            }
        }
    }
}

impl Drop for ProducerCell {
    fn drop(&mut self) {
        self.requested.store(true, Ordering::SeqCst);
        if !self.cleaned.swap(true, Ordering::SeqCst) {
            self.inner.get_mut().cleanup();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::{AudioProducer, ProducerError};

    /// Emits `frames` full frames of a constant sample value, then finishes.
    pub struct ConstProducer {
        pub value: i16,
        pub frames: usize,
        pub partial_tail: Option<usize>,
        pub fail: bool,
        pub cleanups: Arc<AtomicUsize>,
    }

    impl ConstProducer {
        pub fn new(value: i16, frames: usize) -> (Self, Arc<AtomicUsize>) {
            let cleanups = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    value,
                    frames,
                    partial_tail: None,
                    fail: false,
                    cleanups: cleanups.clone(),
                },
                cleanups,
            )
        }
    }

    impl AudioProducer for ConstProducer {
        fn read(&mut self, out: &mut [i16]) -> Result<usize, ProducerError> {
            if self.fail {
                return Err(ProducerError::Decode("broken pipe".into()));
            }
            if self.frames == 0 {
                if let Some(n) = self.partial_tail.take() {
                    out[..n].fill(self.value);
                    return Ok(n);
                }
                return Ok(0);
            }
            self.frames -= 1;
            out.fill(self.value);
            Ok(out.len())
        }

        fn cleanup(&mut self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }

        fn label(&self) -> &str {
            "const"
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::{testing::ConstProducer, *};

    #[test]
    fn test_cleanup_runs_once() {
        let (producer, cleanups) = ConstProducer::new(1, 10);
        let cell = ProducerCell::new(Box::new(producer));

        assert!(cell.cleanup());
        assert!(!cell.cleanup());
        drop(cell);

        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_cleans_up_uncleaned_producer() {
        let (producer, cleanups) = ConstProducer::new(1, 10);
        drop(ProducerCell::new(Box::new(producer)));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cleanup_during_read_is_finished_by_reader() {
        let (producer, cleanups) = ConstProducer::new(7, 10);
        let cell = ProducerCell::new(Box::new(producer));

        // The slot is held as if a read were in progress.
        let busy = cell.inner.lock();
        assert!(cell.cleanup());
        assert!(!cell.cleanup());
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);
        assert!(!cell.is_cleaned());
        drop(busy);

        let mut buf = [0i16; 8];
        assert_eq!(cell.read(&mut buf), Ok(0));
        assert!(cell.is_cleaned());
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        drop(cell);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pending_cleanup_runs_on_drop() {
        let (producer, cleanups) = ConstProducer::new(7, 10);
        let cell = ProducerCell::new(Box::new(producer));
        let busy = cell.inner.lock();
        cell.cleanup();
        drop(busy);
        drop(cell);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_read_after_cleanup_reports_finished() {
        let (producer, _) = ConstProducer::new(7, 10);
        let cell = ProducerCell::new(Box::new(producer));
        let mut buf = [0i16; 8];

        assert_eq!(cell.read(&mut buf), Ok(8));
        cell.cleanup();
        assert_eq!(cell.read(&mut buf), Ok(0));
    }
}
