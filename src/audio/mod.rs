pub mod constants;
pub mod mix;
pub mod producer;
pub mod resample;
pub mod source;

pub use mix::{Mixer, MixerEvent, MixerId, RemovalReason};
pub use producer::{AudioProducer, ProducerCell, ProducerError};
pub use source::{ProducerFactory, StreamLocator, SymphoniaFactory};
