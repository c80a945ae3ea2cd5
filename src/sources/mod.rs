//! Track resolution: turning a [`Track`](crate::protocol::Track) reference
//! into a playable [`StreamLocator`].

pub mod direct;

pub use direct::DirectResolver;

use async_trait::async_trait;

use crate::{audio::StreamLocator, protocol::Track};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("resolution timed out")]
    Timeout,
    #[error("track unavailable: {0}")]
    Unavailable(String),
    #[error("http error: {0}")]
    Http(String),
}

/// The only contact point with the search / resolution subsystem.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    async fn resolve(&self, track: &Track) -> Result<StreamLocator, ResolveError>;
}
