#![forbid(unsafe_code)]

pub mod identity;
pub mod model;
pub mod time;
pub mod tracker;

pub use time::Clock;
pub use tracker::{Effect, Timer, TrackerInput, TrackerPhase, WatchTracker};
