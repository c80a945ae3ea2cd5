pub mod context;
pub mod error;
pub mod manager;
pub mod notifier;
pub mod queue;
pub mod state;

pub use context::GuildPlayback;
pub use error::PlayerError;
pub use manager::{GuildPlayer, PlayerServices};
pub use notifier::{LogNotifier, StatusNotifier};
pub use queue::TrackQueue;
pub use state::PlaybackClock;
