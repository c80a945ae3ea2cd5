//! Central constants for the audio path.
//!
//! Frame geometry is fixed: 20 ms of 48 kHz, 16-bit, interleaved stereo PCM.

// ── Sample / PCM ─────────────────────────────────────────────────────────────

/// Output sample rate handed to the voice transport (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

/// Interleaved channel count used throughout the mixer.
pub const MIXER_CHANNELS: usize = 2;

/// Samples per channel in one 20 ms frame.
pub const SAMPLES_PER_CHANNEL: usize = 960;

/// Interleaved samples in one frame (960 × 2).
pub const FRAME_SIZE_SAMPLES: usize = SAMPLES_PER_CHANNEL * MIXER_CHANNELS;

/// Bytes in one frame (1920 samples × 2 bytes).
pub const FRAME_SIZE_BYTES: usize = FRAME_SIZE_SAMPLES * 2;

/// Wall-clock duration of one frame.
pub const FRAME_DURATION_MS: u64 = 20;

/// One frame of interleaved stereo PCM.
pub type Frame = [i16; FRAME_SIZE_SAMPLES];

/// A frame of digital silence.
pub const SILENCE_FRAME: Frame = [0; FRAME_SIZE_SAMPLES];

// ── Producers ────────────────────────────────────────────────────────────────

/// Name under which a session's music producer is registered.
pub const MUSIC_SOURCE: &str = "music";

/// Prefix of speech-clip producer names.
pub const SPEECH_SOURCE_PREFIX: &str = "tts_";

/// Frames a music producer keeps emitting silence while its decoder has not
/// produced audio yet (250 × 20 ms = 5 s).
pub const STARTUP_GRACE_FRAMES: u32 = 250;

/// Decoded frames buffered between the decode thread and the producer (~2 s).
pub const DECODE_BUFFER_FRAMES: usize = 100;
