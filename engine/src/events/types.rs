//! Event capability, control signals and dispatch outcomes
//!
//! An event is anything that can be fired once at its scheduled time. Firing
//! hands back an `Outcome`: the event's own result payload plus a
//! `ControlSignal` telling the engine what to do next.
//!
//! # Design Principles
//!
//! 1. **Fire once**: `fire` consumes the boxed event, so a popped event cannot
//!    be invoked a second time
//! 2. **No re-entrancy**: follow-on events are buffered and inserted by the
//!    engine after the body returns
//! 3. **Explicit control**: stop and abort are values, not unwinding

use crate::core::time::SimTime;
use crate::events::context::Context;
use crate::orchestrator::error::EventError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Explicit ordering override among events at the same time (lower first)
pub type Priority = i32;

/// Priority given to events that do not set one
pub const DEFAULT_PRIORITY: Priority = 0;

/// The capability every schedulable unit of work provides
///
/// `M` is the model the engine carries (ledgers, balances, whatever the
/// scenario mutates) and `R` is the per-event result payload handed to
/// reporting consumers.
pub trait Event<M, R> {
    /// Label used in logs, traces and abort reasons
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Execute the event at `ctx.now()`
    ///
    /// Follow-on events go through `ctx.schedule*`; an `Err` aborts the run.
    fn fire(self: Box<Self>, ctx: &mut Context<'_, M, R>) -> Result<Outcome<M, R>, EventError>;
}

/// Event backed by a one-shot closure
pub struct FnEvent<F> {
    name: String,
    body: F,
}

impl<F> FnEvent<F> {
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<M, R, F> Event<M, R> for FnEvent<F>
where
    F: FnOnce(&mut Context<'_, M, R>) -> Result<Outcome<M, R>, EventError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(self: Box<Self>, ctx: &mut Context<'_, M, R>) -> Result<Outcome<M, R>, EventError> {
        (self.body)(ctx)
    }
}

impl<F> fmt::Debug for FnEvent<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEvent").field("name", &self.name).finish()
    }
}

/// An event body together with when it should fire
///
/// `tie_break` is normally left unset; the queue then fills it with its
/// submission counter, which makes equal-time, equal-priority events
/// dispatch first-in first-out.
///
/// # Example
/// ```
/// use finsim_core_rs::{Outcome, ScheduledEvent, SimTime};
///
/// let event: ScheduledEvent<(), ()> =
///     ScheduledEvent::from_fn(SimTime::new(5), "month-end", |_ctx| Ok(Outcome::done()))
///         .with_priority(-1);
///
/// assert_eq!(event.time(), SimTime::new(5));
/// assert_eq!(event.priority(), -1);
/// assert_eq!(event.name(), "month-end");
/// ```
pub struct ScheduledEvent<M, R> {
    pub(crate) time: SimTime,
    pub(crate) priority: Priority,
    pub(crate) tie_break: Option<u64>,
    pub(crate) body: Box<dyn Event<M, R>>,
}

impl<M, R> ScheduledEvent<M, R> {
    pub fn new<E>(time: SimTime, event: E) -> Self
    where
        E: Event<M, R> + 'static,
    {
        Self::boxed(time, Box::new(event))
    }

    pub fn boxed(time: SimTime, body: Box<dyn Event<M, R>>) -> Self {
        Self {
            time,
            priority: DEFAULT_PRIORITY,
            tie_break: None,
            body,
        }
    }

    /// Wrap a closure as an event
    pub fn from_fn<F>(time: SimTime, name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&mut Context<'_, M, R>) -> Result<Outcome<M, R>, EventError> + 'static,
    {
        Self::new(time, FnEvent::new(name, body))
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Pin the secondary ordering key instead of taking the submission counter
    pub fn with_tie_break(mut self, tie_break: u64) -> Self {
        self.tie_break = Some(tie_break);
        self
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn tie_break(&self) -> Option<u64> {
        self.tie_break
    }

    pub fn name(&self) -> &str {
        self.body.name()
    }
}

impl<M, R> fmt::Debug for ScheduledEvent<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("name", &self.name())
            .field("time", &self.time)
            .field("priority", &self.priority)
            .field("tie_break", &self.tie_break)
            .finish()
    }
}

/// Directive an event hands back to the engine
pub enum ControlSignal<M, R> {
    /// Nothing special; keep draining
    Continue,
    /// Enqueue these events after anything scheduled through the context
    Schedule(Vec<ScheduledEvent<M, R>>),
    /// Finish the run gracefully. Events yielded by this same dispatch are
    /// discarded; events already queued stay queued but are not dispatched.
    Stop,
    /// Terminate immediately, discard all pending events and report the reason
    Abort(String),
}

impl<M, R> ControlSignal<M, R> {
    pub fn kind(&self) -> SignalKind {
        match self {
            ControlSignal::Continue => SignalKind::Continue,
            ControlSignal::Schedule(_) => SignalKind::Schedule,
            ControlSignal::Stop => SignalKind::Stop,
            ControlSignal::Abort(_) => SignalKind::Abort,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

impl<M, R> fmt::Debug for ControlSignal<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlSignal::Continue => write!(f, "Continue"),
            ControlSignal::Schedule(events) => f.debug_tuple("Schedule").field(events).finish(),
            ControlSignal::Stop => write!(f, "Stop"),
            ControlSignal::Abort(reason) => f.debug_tuple("Abort").field(reason).finish(),
        }
    }
}

/// Payload-free view of a `ControlSignal`, as recorded for each dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Continue,
    Schedule,
    Stop,
    Abort,
}

impl SignalKind {
    pub fn is_terminal(self) -> bool {
        matches!(self, SignalKind::Stop | SignalKind::Abort)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalKind::Continue => "continue",
            SignalKind::Schedule => "schedule",
            SignalKind::Stop => "stop",
            SignalKind::Abort => "abort",
        };
        f.write_str(label)
    }
}

/// What a fired event returns: its result payload and a control signal
#[derive(Debug)]
pub struct Outcome<M, R> {
    pub payload: R,
    pub signal: ControlSignal<M, R>,
}

impl<M, R> Outcome<M, R> {
    pub fn proceed(payload: R) -> Self {
        Self {
            payload,
            signal: ControlSignal::Continue,
        }
    }

    pub fn stop(payload: R) -> Self {
        Self {
            payload,
            signal: ControlSignal::Stop,
        }
    }

    pub fn abort(payload: R, reason: impl Into<String>) -> Self {
        Self {
            payload,
            signal: ControlSignal::Abort(reason.into()),
        }
    }

    pub fn schedule(payload: R, events: Vec<ScheduledEvent<M, R>>) -> Self {
        Self {
            payload,
            signal: ControlSignal::Schedule(events),
        }
    }
}

impl<M> Outcome<M, ()> {
    /// Unit-payload `Continue`
    pub fn done() -> Self {
        Self::proceed(())
    }
}
