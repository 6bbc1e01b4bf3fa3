mod chain;
mod channel;
mod presets;
mod vector;

pub use chain::{FilterChain, FilterOp};
pub use channel::{Channel, ChannelRange};
pub use presets::{find_preset, Preset, PRESETS};
pub use vector::FilterVector;
