//! PCM sample-rate conversion for decoded streams.

pub mod linear;

pub use linear::LinearResampler;
