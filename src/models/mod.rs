pub mod events;
pub mod token;

pub use events::{PriceUpdate, UpdateKind, VolumeSpike};
pub use token::Token;
