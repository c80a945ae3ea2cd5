use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{audio::StreamLocator, common::types::UserId};

/// Metadata of a track as supplied by whoever enqueued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub title: String,
    /// Length in whole seconds.
    pub duration: u64,
    /// Reference the resolver turns into a stream (page URL, file path, ...).
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<UserId>,
}

/// A queued track. Immutable apart from its stream locator, which is set once
/// on first resolution and reused by later replays (loop, seek).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: Uuid,
    #[serde(flatten)]
    pub info: TrackInfo,
    #[serde(skip)]
    stream: OnceLock<StreamLocator>,
}

impl Track {
    pub fn new(info: TrackInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            info,
            stream: OnceLock::new(),
        }
    }

    /// A track whose stream is already known, skipping resolution.
    pub fn with_stream(info: TrackInfo, stream: StreamLocator) -> Self {
        let track = Self::new(info);
        let _ = track.stream.set(stream);
        track
    }

    pub fn stream(&self) -> Option<&StreamLocator> {
        self.stream.get()
    }

    /// Stores the resolved locator unless one was stored first, returning
    /// whichever won.
    pub fn resolve_with(&self, stream: StreamLocator) -> &StreamLocator {
        self.stream.get_or_init(|| stream)
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn duration_secs(&self) -> u64 {
        self.info.duration
    }
}
