//! `LinearResampler`: linear-interpolation resampler for interleaved i16.
//!
//! Decoded blocks arrive one at a time, so the last input frame of each
//! block is carried over to interpolate across the boundary.

pub struct LinearResampler {
    /// Source / target ratio (< 1.0 upsamples, > 1.0 downsamples).
    step: f64,
    /// Fractional read position relative to the current block.
    /// `-1.0..0.0` addresses the carried-over frame.
    pos: f64,
    carry: Vec<i16>,
    channels: usize,
}

impl LinearResampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            step: source_rate.max(1) as f64 / target_rate.max(1) as f64,
            pos: 0.0,
            carry: vec![0; channels],
            channels,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        (self.step - 1.0).abs() < f64::EPSILON
    }

    /// Resamples `input` and appends the result to `output`.
    pub fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
        let frames = input.len() / self.channels;
        if frames == 0 {
            return;
        }
        if self.is_passthrough() {
            output.extend_from_slice(&input[..frames * self.channels]);
            return;
        }

        let sample = |frame: isize, c: usize| -> f64 {
            if frame < 0 {
                self.carry[c] as f64
            } else {
                input[frame as usize * self.channels + c] as f64
            }
        };

        // Interpolating between frame `i` and `i + 1` needs `i + 1` in this block.
        while self.pos < (frames - 1) as f64 {
            let base = self.pos.floor();
            let frac = self.pos - base;
            let i = base as isize;
            for c in 0..self.channels {
                let a = sample(i, c);
                let b = sample(i + 1, c);
                let v = a + (b - a) * frac;
                output.push(v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
            }
            self.pos += self.step;
        }

        self.pos -= frames as f64;
        let last = (frames - 1) * self.channels;
        self.carry.copy_from_slice(&input[last..last + self.channels]);
    }

    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.carry.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_copies_input() {
        let mut r = LinearResampler::new(48_000, 48_000, 2);
        let mut out = Vec::new();
        r.process(&[1, 2, 3, 4], &mut out);
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_upsampling_roughly_preserves_duration() {
        let mut r = LinearResampler::new(24_000, 48_000, 1);
        let mut out = Vec::new();
        for _ in 0..10 {
            r.process(&[100; 480], &mut out);
        }
        // 4800 input samples at 2× should yield ~9600 output samples.
        assert!((out.len() as i64 - 9600).abs() <= 2, "got {}", out.len());
        assert!(out[10..].iter().all(|&s| s == 100));
    }

    #[test]
    fn test_downsampling_interpolates_ramp() {
        let mut r = LinearResampler::new(96_000, 48_000, 1);
        let input: Vec<i16> = (0..100).collect();
        let mut out = Vec::new();
        r.process(&input, &mut out);
        assert_eq!(&out[..4], &[0, 2, 4, 6]);
    }
}
