//! Orchestrator - the engine state machine and dispatch loop
//!
//! See `engine.rs` for the run loop, `observer.rs` for observation callbacks
//! and `error.rs` for the error taxonomy.

pub mod engine;
pub mod error;
pub mod observer;

pub use engine::{
    AbortReason, Engine, EngineConfig, EngineState, EngineStatus, RunOutcome, RunReport,
};
pub use error::{EngineError, EventError};
pub use observer::Observer;
