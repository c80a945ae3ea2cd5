pub mod errors;
pub mod logger;
pub mod timefmt;
pub mod types;

pub use errors::*;
pub use timefmt::*;
pub use types::*;
