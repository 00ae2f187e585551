//! Finsim Core - Discrete-Event Engine
//!
//! Deterministic event engine used as the substrate for probabilistic
//! business and financial simulations. A Monte Carlo driver builds one
//! `Engine` per trial, seeds it with events, runs it and reads back the
//! outcome and the model.
//!
//! # Architecture
//!
//! - **core**: Simulated time and the engine clock
//! - **events**: Event capability, scheduling context, pending-event queue
//! - **models**: Dispatch records and the replay trace
//! - **orchestrator**: Engine state machine, dispatch loop, errors, observers
//! - **rng**: Deterministic per-trial random streams
//!
//! # Critical Invariants
//!
//! 1. Simulated time never moves backwards
//! 2. Dispatch order is a total order on `(time, priority, submission)`
//! 3. Identical seeding produces identical dispatch traces
//! 4. Only an abort discards pending events

// Module declarations
pub mod core;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod rng;

// Re-exports for convenience
pub use crate::core::time::{Clock, SimTime};
pub use events::{
    Context, ControlSignal, Event, EventKey, EventQueue, FnEvent, Outcome, Priority,
    QueuedEvent, ScheduledEvent, SignalKind, DEFAULT_PRIORITY,
};
pub use models::{Dispatch, DispatchRecord, DispatchTrace};
pub use orchestrator::{
    AbortReason, Engine, EngineConfig, EngineError, EngineState, EngineStatus, EventError,
    Observer, RunOutcome, RunReport,
};
pub use rng::{derive_trial_seed, TrialRng};
