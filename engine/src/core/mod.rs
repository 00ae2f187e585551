//! Core primitives: simulated time and the engine clock

pub mod time;

pub use time::{Clock, SimTime};
