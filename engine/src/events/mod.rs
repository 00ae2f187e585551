//! Events: the schedulable capability, its scheduling handle and the queue
//!
//! - **types**: `Event` trait, `ScheduledEvent`, `Outcome`, `ControlSignal`
//! - **context**: `Context` handed to a firing event
//! - **queue**: `EventQueue`, the deterministic min-heap of pending events

pub mod context;
pub mod queue;
pub mod types;

pub use context::Context;
pub use queue::{EventKey, EventQueue, QueuedEvent};
pub use types::{
    ControlSignal, Event, FnEvent, Outcome, Priority, ScheduledEvent, SignalKind,
    DEFAULT_PRIORITY,
};
