//! Collaborative listening client core.
//!
//! Keeps a local media pipeline (audio plus optional synchronized
//! video surfaces) in step with a shared room playback state: one
//! admin drives seeks and playback, everyone else follows. The hard
//! parts live in the controller (command paths, skip/retry policy,
//! admin gate) and the progress synchronizer (position broadcasts,
//! engaged-listening analytics, audio/video drift correction).

pub mod controller;
pub mod driver;
pub mod logging;
pub mod media_session;
pub mod model;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod transport;
