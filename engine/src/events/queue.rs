//! Pending-event queue
//!
//! A `BinaryHeap` with reversed ordering acts as a min-heap keyed by
//! `(time, priority, tie_break, seq)`. `seq` is the queue's own insertion
//! counter and is unique, so the order is total: two runs that submit the
//! same events in the same order dispatch them in the same order.

use crate::core::time::SimTime;
use crate::events::types::{Event, Priority, ScheduledEvent};
use crate::orchestrator::error::EngineError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// Full ordering key of a queued event (field order is comparison order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub time: SimTime,
    pub priority: Priority,
    pub tie_break: u64,
    /// Insertion sequence, unique per queue
    pub seq: u64,
}

/// An event sitting in the queue
pub struct QueuedEvent<M, R> {
    key: EventKey,
    body: Box<dyn Event<M, R>>,
}

impl<M, R> QueuedEvent<M, R> {
    /// Full ordering key assigned at insertion
    pub fn key(&self) -> EventKey {
        self.key
    }

    pub fn time(&self) -> SimTime {
        self.key.time
    }

    pub fn name(&self) -> &str {
        self.body.name()
    }

    pub(crate) fn into_parts(self) -> (EventKey, Box<dyn Event<M, R>>) {
        (self.key, self.body)
    }
}

impl<M, R> fmt::Debug for QueuedEvent<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedEvent")
            .field("name", &self.name())
            .field("key", &self.key)
            .finish()
    }
}

impl<M, R> PartialEq for QueuedEvent<M, R> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<M, R> Eq for QueuedEvent<M, R> {}

/// Reversed so `BinaryHeap` pops the smallest key first.
impl<M, R> Ord for QueuedEvent<M, R> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(&self.key)
    }
}

impl<M, R> PartialOrd for QueuedEvent<M, R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered multiset of pending events
pub struct EventQueue<M, R> {
    heap: BinaryHeap<QueuedEvent<M, R>>,
    /// Submission counter; also the default tie-break
    next_seq: u64,
}

impl<M, R> EventQueue<M, R> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Insert `event`, rejecting anything scheduled before `now`
    ///
    /// # Arguments
    /// * `event` - Event to enqueue; an unset tie-break takes the submission counter
    /// * `now` - Current simulated time
    ///
    /// # Returns
    /// The event's full ordering key
    ///
    /// A rejected insert leaves the queue, including its submission counter,
    /// exactly as it was.
    pub fn insert(
        &mut self,
        event: ScheduledEvent<M, R>,
        now: SimTime,
    ) -> Result<EventKey, EngineError> {
        if event.time < now {
            return Err(EngineError::InvalidSchedule {
                requested: event.time,
                current: now,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let key = EventKey {
            time: event.time,
            priority: event.priority,
            tie_break: event.tie_break.unwrap_or(seq),
            seq,
        };
        self.heap.push(QueuedEvent {
            key,
            body: event.body,
        });
        Ok(key)
    }

    /// Remove and return the event with the smallest key
    pub fn pop_minimum(&mut self) -> Result<QueuedEvent<M, R>, EngineError> {
        self.heap.pop().ok_or(EngineError::EmptyQueue)
    }

    /// The event `pop_minimum` would return, without removing it
    pub fn peek_minimum(&self) -> Option<&QueuedEvent<M, R>> {
        self.heap.peek()
    }

    /// Scheduled time of the next event, if any
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(QueuedEvent::time)
    }

    /// Whether no events are pending
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Tie-break the next insert without a pinned one will receive
    pub fn next_tie_break(&self) -> u64 {
        self.next_seq
    }

    /// Keys of every pending event, in dispatch order
    pub fn pending_keys(&self) -> Vec<EventKey> {
        let mut keys: Vec<EventKey> = self.heap.iter().map(QueuedEvent::key).collect();
        keys.sort_unstable();
        keys
    }

    /// Drop every pending event, returning how many were discarded
    ///
    /// The submission counter keeps running so keys stay unique.
    pub fn clear(&mut self) -> usize {
        let discarded = self.heap.len();
        self.heap.clear();
        discarded
    }
}

impl<M, R> Default for EventQueue<M, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, R> fmt::Debug for EventQueue<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.heap.len())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}
