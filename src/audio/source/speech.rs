//! `SpeechProducer`: short clip held fully in memory.

use crate::audio::producer::{AudioProducer, ProducerError};

/// Plays back already-decoded 48 kHz stereo PCM once.
pub struct SpeechProducer {
    label: String,
    pcm: Vec<i16>,
    pos: usize,
}

impl SpeechProducer {
    pub fn new(label: impl Into<String>, pcm: Vec<i16>) -> Self {
        Self {
            label: label.into(),
            pcm,
            pos: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.pcm.len() - self.pos
    }
}

impl AudioProducer for SpeechProducer {
    fn read(&mut self, out: &mut [i16]) -> Result<usize, ProducerError> {
        let n = self.remaining().min(out.len());
        out[..n].copy_from_slice(&self.pcm[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn cleanup(&mut self) {
        self.pcm = Vec::new();
        self.pos = 0;
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_whole_then_partial_then_nothing() {
        let mut clip = SpeechProducer::new("tts_1", vec![3; 10]);
        let mut out = [0i16; 4];
        assert_eq!(clip.read(&mut out), Ok(4));
        assert_eq!(clip.read(&mut out), Ok(4));
        assert_eq!(clip.read(&mut out), Ok(2));
        assert_eq!(clip.read(&mut out), Ok(0));
    }
}
