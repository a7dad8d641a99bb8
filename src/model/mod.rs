//! Model module - room playback state and data types
//!
//! It is organized into submodules by responsibility:
//!
//! - `types`: Value types shared with the room (songs, roles)
//! - `playback`: The playback state machine and per-song bookkeeping
//! - `store`: The dispatch-only store owning the playback aggregate

mod playback;
mod store;
mod types;

pub use playback::{reduce, Action, DriftTracker, PlaybackState, RetryBudget};
pub use store::PlaybackStore;
pub use types::{
    AppContext, Artist, ImageVariant, Role, Song, SourceVariant, PLACEHOLDER_ARTWORK,
};
