//! `MusicProducer`: producer over a live decode thread.

use std::sync::{Arc, atomic::Ordering};

use flume::TryRecvError;

use super::decode::DecodeHandle;
use crate::audio::{
    constants::STARTUP_GRACE_FRAMES,
    producer::{AudioProducer, ProducerError},
};

pub struct MusicProducer {
    label: String,
    decoder: DecodeHandle,
    grace_left: u32,
    started: bool,
}

impl MusicProducer {
    pub fn new(label: impl Into<String>, decoder: DecodeHandle) -> Self {
        Self {
            label: label.into(),
            decoder,
            grace_left: STARTUP_GRACE_FRAMES,
            started: false,
        }
    }

    fn take_failure(&self) -> Option<ProducerError> {
        self.decoder.failure.lock().take()
    }
}

impl AudioProducer for MusicProducer {
    fn read(&mut self, out: &mut [i16]) -> Result<usize, ProducerError> {
        match self.decoder.frames.try_recv() {
            Ok(chunk) => {
                self.started = true;
                let n = chunk.len().min(out.len());
                out[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(TryRecvError::Empty) => {
                // Decoder alive but behind: hold the slot with silence.
                if !self.started {
                    if self.grace_left == 0 {
                        return Err(ProducerError::Decode(format!(
                            "no audio from '{}' within startup grace",
                            self.label
                        )));
                    }
                    self.grace_left -= 1;
                }
                out.fill(0);
                Ok(out.len())
            }
            Err(TryRecvError::Disconnected) => match self.take_failure() {
                Some(e) => Err(e),
                None => Ok(0),
            },
        }
    }

    fn cleanup(&mut self) {
        self.decoder.stop.store(true, Ordering::Release);
        // Unblocks a decoder waiting on a full buffer.
        let _ = self.decoder.frames.drain();
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for MusicProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicProducer")
            .field("label", &self.label)
            .field("started", &self.started)
            .field("stopped", &self.decoder.stop.load(Ordering::Relaxed))
            .finish()
    }
}
