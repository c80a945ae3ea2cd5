pub mod events;
pub mod player;
pub mod tracks;

pub use events::Notice;
pub use player::{Enqueued, LoopMode, NowPlaying, PlayerSnapshot, QueueEntry, QueueSnapshot};
pub use tracks::{Track, TrackInfo};
