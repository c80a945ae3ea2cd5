pub mod mixer;

pub use mixer::{Mixer, MixerEvent, MixerId, RemovalReason};
