//! Symphonia decode loop.
//!
//! Produces interleaved stereo i16 at [`TARGET_SAMPLE_RATE`] in chunks of
//! [`FRAME_SIZE_SAMPLES`]; only the last chunk of a stream may be shorter.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, SeekMode, SeekTo},
    io::{MediaSource, MediaSourceStream},
    meta::MetadataOptions,
    probe::Hint,
    units::Time,
};
use tracing::{debug, info, warn};

use crate::audio::{
    constants::{DECODE_BUFFER_FRAMES, FRAME_SIZE_SAMPLES, MIXER_CHANNELS, TARGET_SAMPLE_RATE},
    producer::ProducerError,
    resample::LinearResampler,
};

/// Receiving half of a running decode thread.
pub struct DecodeHandle {
    pub frames: flume::Receiver<Vec<i16>>,
    /// Set by the thread before it disconnects `frames` on failure.
    pub failure: Arc<Mutex<Option<ProducerError>>>,
    pub stop: Arc<AtomicBool>,
}

/// Starts decoding `media` on a dedicated thread, skipping to `start`.
pub fn spawn_decoder(
    label: &str,
    media: Box<dyn MediaSource>,
    hint: Hint,
    start: Duration,
) -> Result<DecodeHandle, ProducerError> {
    let (tx, rx) = flume::bounded::<Vec<i16>>(DECODE_BUFFER_FRAMES);
    let failure = Arc::new(Mutex::new(None));
    let stop = Arc::new(AtomicBool::new(false));

    let thread_failure = failure.clone();
    let thread_stop = stop.clone();
    let thread_label = label.to_string();

    thread::Builder::new()
        .name(format!("decode-{}", label.chars().take(24).collect::<String>()))
        .spawn(move || {
            info!("Decoding '{}' from {:?}", thread_label, start);
            let result = decode(media, &hint, start, &thread_stop, |chunk| {
                send_chunk(&tx, chunk, &thread_stop)
            });
            match result {
                Ok(()) => debug!("Decoder for '{}' finished", thread_label),
                Err(e) if thread_stop.load(Ordering::Acquire) => {
                    debug!("Decoder for '{}' stopped: {}", thread_label, e)
                }
                Err(e) => {
                    warn!("Decoder for '{}' failed: {}", thread_label, e);
                    *thread_failure.lock() = Some(e);
                }
            }
            drop(tx);
        })
        .map_err(|e| ProducerError::Io(e.to_string()))?;

    Ok(DecodeHandle {
        frames: rx,
        failure,
        stop,
    })
}

/// Decodes a whole clip into memory.
pub fn decode_to_vec(media: Box<dyn MediaSource>, hint: &Hint) -> Result<Vec<i16>, ProducerError> {
    let mut pcm = Vec::new();
    let never = AtomicBool::new(false);
    decode(media, hint, Duration::ZERO, &never, |chunk| {
        pcm.extend_from_slice(&chunk);
        true
    })?;
    Ok(pcm)
}

/// Blocks while the buffer is full, waking up to honour `stop`.
fn send_chunk(tx: &flume::Sender<Vec<i16>>, chunk: Vec<i16>, stop: &AtomicBool) -> bool {
    let mut chunk = chunk;
    loop {
        match tx.send_timeout(chunk, Duration::from_millis(100)) {
            Ok(()) => return true,
            Err(flume::SendTimeoutError::Timeout(back)) => {
                if stop.load(Ordering::Acquire) {
                    return false;
                }
                chunk = back;
            }
            Err(flume::SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// Core loop. `emit` returning `false` ends decoding early without error.
fn decode(
    media: Box<dyn MediaSource>,
    hint: &Hint,
    start: Duration,
    stop: &AtomicBool,
    mut emit: impl FnMut(Vec<i16>) -> bool,
) -> Result<(), ProducerError> {
    let mss = MediaSourceStream::new(media, Default::default());
    let probed = symphonia::default::get_probe()
        .format(hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| ProducerError::Unsupported(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ProducerError::Unsupported("no audio track".into()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| ProducerError::Unsupported(e.to_string()))?;
    let source_rate = params
        .sample_rate
        .ok_or_else(|| ProducerError::Unsupported("unknown sample rate".into()))?;

    // Packets ending before this timestamp are dropped after a coarse seek.
    let mut skip_until = None;
    if !start.is_zero() {
        let target = Time::new(start.as_secs(), start.subsec_nanos() as f64 / 1e9);
        let seeked = format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time: target,
                    track_id: Some(track_id),
                },
            )
            .map_err(|e| ProducerError::Decode(format!("seek to {:?} failed: {}", start, e)))?;
        decoder.reset();
        skip_until = Some(seeked.required_ts);
    }

    let mut resampler = LinearResampler::new(source_rate, TARGET_SAMPLE_RATE, MIXER_CHANNELS);
    let mut sample_buf: Option<SampleBuffer<i16>> = None;
    let mut stereo = Vec::new();
    let mut pending: Vec<i16> = Vec::with_capacity(FRAME_SIZE_SAMPLES * 2);

    loop {
        if stop.load(Ordering::Acquire) {
            return Ok(());
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(ProducerError::Io(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }
        if let Some(ts) = skip_until {
            if packet.ts() + packet.dur() <= ts {
                continue;
            }
            skip_until = None;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(ProducerError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let needed = decoded.capacity() * channels;
        if sample_buf.as_ref().is_none_or(|b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        to_stereo(buf.samples(), channels, &mut stereo);
        resampler.process(&stereo, &mut pending);

        while pending.len() >= FRAME_SIZE_SAMPLES {
            let chunk: Vec<i16> = pending.drain(..FRAME_SIZE_SAMPLES).collect();
            if !emit(chunk) {
                return Ok(());
            }
        }
    }

    if !pending.is_empty() {
        emit(pending);
    }
    Ok(())
}

/// Mono is duplicated; anything wider keeps its first two channels.
fn to_stereo(samples: &[i16], channels: usize, out: &mut Vec<i16>) {
    out.clear();
    match channels {
        1 => {
            for &s in samples {
                out.push(s);
                out.push(s);
            }
        }
        2 => out.extend_from_slice(samples),
        n => {
            for frame in samples.chunks_exact(n) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::{memory_media, testing::wav_bytes};

    fn wav_hint() -> Hint {
        let mut hint = Hint::new();
        hint.with_extension("wav");
        hint
    }

    #[test]
    fn test_to_stereo_layouts() {
        let mut out = Vec::new();
        to_stereo(&[1, 2], 1, &mut out);
        assert_eq!(out, vec![1, 1, 2, 2]);
        to_stereo(&[1, 2, 3, 4, 5, 6], 3, &mut out);
        assert_eq!(out, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_decode_mono_wav_to_stereo_frames() {
        // 0.05 s of mono 48 kHz = 2400 frames -> 4800 interleaved stereo samples.
        let wav = wav_bytes(48_000, 1, &[500; 2400]);
        let pcm = decode_to_vec(memory_media(wav.into()), &wav_hint()).expect("decodes");
        assert_eq!(pcm.len(), 4800);
        assert!(pcm.iter().all(|&s| s == 500));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let garbage = vec![0u8; 64];
        assert!(decode_to_vec(memory_media(garbage.into()), &Hint::new()).is_err());
    }

    #[test]
    fn test_decoder_thread_streams_chunks() {
        let wav = wav_bytes(48_000, 2, &[7; 48_000]);
        let handle = spawn_decoder("t", memory_media(wav.into()), wav_hint(), Duration::ZERO)
            .expect("spawns");
        let chunks: Vec<Vec<i16>> = handle.frames.iter().collect();
        let total: usize = chunks.iter().map(Vec::len).sum();
        assert_eq!(total, 48_000);
        assert!(chunks[..chunks.len() - 1]
            .iter()
            .all(|c| c.len() == FRAME_SIZE_SAMPLES));
        assert!(handle.failure.lock().is_none());
    }
}
