//! Per-dispatch result records
//!
//! A `Dispatch` is what `Engine::step` returns and what observers receive:
//! which event fired, when, what it produced and what it asked the engine to
//! do. `DispatchRecord` is the same information without the payload, small
//! and serializable, for traces.

use crate::core::time::SimTime;
use crate::events::queue::EventKey;
use crate::events::types::{Priority, SignalKind};
use serde::{Deserialize, Serialize};

/// Result of dispatching a single event
///
/// `payload` is `None` when the body failed (error or panic) instead of
/// returning an outcome; such a dispatch always carries `SignalKind::Abort`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch<R> {
    /// Position of this dispatch in the engine's lifetime, starting at 0
    pub index: u64,
    pub key: EventKey,
    pub name: String,
    pub payload: Option<R>,
    /// Effective signal. `Continue` with a non-empty yield is reported as
    /// `Schedule`.
    pub signal: SignalKind,
    /// Number of follow-on events inserted into the queue
    pub scheduled: usize,
}

impl<R> Dispatch<R> {
    pub fn time(&self) -> SimTime {
        self.key.time
    }

    pub fn priority(&self) -> Priority {
        self.key.priority
    }

    pub fn is_terminal(&self) -> bool {
        self.signal.is_terminal()
    }

    pub fn record(&self) -> DispatchRecord {
        DispatchRecord {
            index: self.index,
            time: self.key.time,
            priority: self.key.priority,
            tie_break: self.key.tie_break,
            name: self.name.clone(),
            signal: self.signal,
            scheduled: self.scheduled,
        }
    }
}

/// Payload-free, serializable summary of a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub index: u64,
    pub time: SimTime,
    pub priority: Priority,
    pub tie_break: u64,
    pub name: String,
    pub signal: SignalKind,
    pub scheduled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_drops_payload_keeps_key() {
        let dispatch = Dispatch {
            index: 4,
            key: EventKey {
                time: SimTime::new(12),
                priority: 2,
                tie_break: 9,
                seq: 9,
            },
            name: "interest-accrual".to_string(),
            payload: Some(1_250_i64),
            signal: SignalKind::Schedule,
            scheduled: 1,
        };

        let record = dispatch.record();
        assert_eq!(record.index, 4);
        assert_eq!(record.time, SimTime::new(12));
        assert_eq!(record.priority, 2);
        assert_eq!(record.tie_break, 9);
        assert_eq!(record.name, "interest-accrual");
        assert_eq!(record.scheduled, 1);
        assert!(!dispatch.is_terminal());
    }
}
