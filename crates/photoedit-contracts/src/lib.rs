pub mod chat;
pub mod errors;
pub mod events;
pub mod filters;
pub mod notices;
pub mod summary;

pub use errors::{EditorError, EditorResult};
