//! Error types for the event engine
//!
//! `EngineError` covers what the engine reports to its callers. Scheduling
//! into the past and popping an empty queue are local: the failed call
//! changes nothing. `EventError` is what an event body hands back when its
//! own logic fails. The engine never retries one; it turns it into an abort.

use crate::core::time::SimTime;
use crate::orchestrator::engine::EngineState;
use thiserror::Error;

/// Errors surfaced by the engine and its event queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("cannot schedule event at {requested}: current time is {current}")]
    InvalidSchedule { requested: SimTime, current: SimTime },

    #[error("event queue is empty")]
    EmptyQueue,

    #[error("no pending events left to dispatch")]
    QueueExhausted,

    #[error("engine has terminated in state {state}")]
    EngineTerminated { state: EngineState },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("dispatch trace recording is not enabled")]
    TraceNotEnabled,
}

/// Failure raised by an event body
///
/// Any of these escaping `Event::fire` aborts the run with the error text as
/// the abort reason.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("{0}")]
    Failed(String),

    /// A follow-on event was rejected by the scheduling handle
    #[error(transparent)]
    Schedule(#[from] EngineError),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl EventError {
    pub fn failed(message: impl Into<String>) -> Self {
        EventError::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_schedule_display() {
        let e = EngineError::InvalidSchedule {
            requested: SimTime::new(3),
            current: SimTime::new(10),
        };
        let msg = e.to_string();
        assert!(msg.contains("t=3"), "{}", msg);
        assert!(msg.contains("t=10"), "{}", msg);
    }

    #[test]
    fn test_terminated_display_names_state() {
        let e = EngineError::EngineTerminated {
            state: EngineState::Aborted,
        };
        assert_eq!(e.to_string(), "engine has terminated in state Aborted");
    }

    #[test]
    fn test_event_error_from_engine_error() {
        let e: EventError = EngineError::EmptyQueue.into();
        assert!(matches!(e, EventError::Schedule(EngineError::EmptyQueue)));
        assert_eq!(e.to_string(), "event queue is empty");
    }

    #[test]
    fn test_event_error_from_boxed_source() {
        let source: Box<dyn std::error::Error + Send + Sync> = "ledger out of balance".into();
        let e = EventError::from(source);
        assert_eq!(e.to_string(), "ledger out of balance");
    }
}
