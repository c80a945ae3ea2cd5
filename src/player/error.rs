use crate::{audio::ProducerError, sources::ResolveError, voice::VoiceError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    #[error("the queue is full (max {max} tracks)")]
    QueueFull { max: usize },
    #[error("nothing is playing")]
    NothingPlaying,
    #[error("playback is not paused")]
    NotPaused,
    #[error("playback is already paused")]
    AlreadyPaused,
    #[error("nothing is playing right now")]
    NotPlaying,
    #[error("cannot seek beyond the track length ({duration}s)")]
    SeekBeyondDuration { duration: u64 },
    #[error("invalid time '{0}', use SS, MM:SS or HH:MM:SS")]
    InvalidTime(String),
    #[error("volume must be between 0 and 200, got {0}")]
    InvalidVolume(i64),
    #[error("invalid loop mode '{0}', use off, one or all")]
    InvalidLoopMode(String),
    #[error("no track at queue position {0}")]
    InvalidQueueIndex(usize),
    #[error("need at least 2 tracks in the queue to shuffle")]
    QueueTooShort,
    #[error("not connected to a voice channel")]
    NotConnected,
    #[error("another playback change is in progress")]
    Busy,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Producer(#[from] ProducerError),
    #[error(transparent)]
    Voice(#[from] VoiceError),
    #[error("session limit reached")]
    SessionLimit,
}
