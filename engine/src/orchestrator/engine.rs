//! Event engine - clock, queue and dispatch loop
//!
//! The engine owns simulated time and the pending-event queue. It pops the
//! earliest event, advances the clock to it, fires it, inserts whatever the
//! event yielded and applies the returned control signal. One event body
//! runs at a time, to completion.
//!
//! # Lifecycle
//!
//! ```text
//!            run()/step()                  queue empty / Stop
//!   Idle ─────────────────▶ Running ───────────────────────────▶ Stopped
//!                            │  ▲  │
//!          horizon reached   │  │  │  Abort / body error / panic
//!             ┌──────────────┘  │  └──────────────────────────▶ Aborted
//!             ▼                 │
//!          Paused ──────────────┘ run()/step()
//! ```
//!
//! A run that starts with nothing queued goes straight to `Stopped`.
//! `Stopped` and `Aborted` are terminal. A trial that needs to run again
//! builds a fresh engine.
//!
//! # Critical Invariants
//!
//! 1. The clock never moves backwards
//! 2. Events with equal `(time, priority)` dispatch in submission order
//! 3. Every event is fired at most once
//! 4. Only an abort discards queued work

use crate::core::time::{Clock, SimTime};
use crate::events::context::Context;
use crate::events::queue::{EventKey, EventQueue, QueuedEvent};
use crate::events::types::{ControlSignal, Event, Outcome, ScheduledEvent, SignalKind};
use crate::models::dispatch::Dispatch;
use crate::models::trace::DispatchTrace;
use crate::orchestrator::error::{EngineError, EventError};
use crate::orchestrator::observer::Observer;
use crate::rng::TrialRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use uuid::Uuid;

// ============================================================================
// Configuration
// ============================================================================

/// Engine configuration
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes.
///
/// # Example
/// ```
/// use finsim_core_rs::{EngineConfig, SimTime};
///
/// let config = EngineConfig::from_json(r#"{"name": "loan-book", "ticks_per_day": 24}"#).unwrap();
/// assert_eq!(config.name, "loan-book");
/// assert_eq!(config.epoch, SimTime::ZERO);
/// assert!(config.catch_panics);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Label used in logs and `Display`
    pub name: String,
    /// Clock value at the start of the trial
    pub epoch: SimTime,
    /// Attach a business-day calendar with this many ticks per day
    pub ticks_per_day: Option<u64>,
    /// Seed for the trial's `TrialRng`
    pub rng_seed: u64,
    /// Keep a `DispatchTrace` of every dispatch
    pub record_trace: bool,
    /// Turn a panicking event body into an abort instead of unwinding
    /// through the engine. When off, the engine still aborts, then resumes
    /// the panic.
    pub catch_panics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed".to_string(),
            epoch: SimTime::ZERO,
            ticks_per_day: None,
            rng_seed: 0,
            record_trace: false,
            catch_panics: true,
        }
    }
}

impl EngineConfig {
    /// Default configuration with the given engine name
    ///
    /// # Example
    /// ```
    /// use finsim_core_rs::EngineConfig;
    ///
    /// let config = EngineConfig::named("mortgage-book");
    /// assert_eq!(config.name, "mortgage-book");
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Check the settings an engine cannot run with
    ///
    /// Rejects a zero-length business day and a blank name.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.ticks_per_day == Some(0) {
            return Err(EngineError::InvalidConfig(
                "ticks_per_day must be positive".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("config parse failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Hex SHA-256 of the configuration
    ///
    /// Two trials with the same fingerprint ran under the same settings.
    pub fn fingerprint(&self) -> Result<String, EngineError> {
        let json = serde_json::to_string(self)
            .map_err(|e| EngineError::Serialization(format!("config serialization failed: {}", e)))?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineState {
    /// Constructed, no run started
    Idle,
    /// Draining the queue
    Running,
    /// Halted at a `run_until` horizon; can be resumed
    Paused,
    /// Finished gracefully (terminal)
    Stopped,
    /// Terminated by an abort (terminal)
    Aborted,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Stopped | EngineState::Aborted)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngineState::Idle => "Idle",
            EngineState::Running => "Running",
            EngineState::Paused => "Paused",
            EngineState::Stopped => "Stopped",
            EngineState::Aborted => "Aborted",
        };
        f.write_str(label)
    }
}

/// Current lifecycle state with the message that explains it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub message: String,
}

/// Why a run was aborted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortReason {
    /// The reason exactly as the event supplied it (or the error text)
    pub reason: String,
    /// Name of the event whose dispatch aborted the run
    pub event: String,
    pub at: SimTime,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (event '{}' at {})", self.reason, self.event, self.at)
    }
}

/// How a call to `run`/`run_until` ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The queue drained naturally
    Exhausted,
    /// An event returned `Stop`
    Stopped { event: String, at: SimTime },
    /// The next event lies beyond the horizon; it is still queued
    Paused { until: SimTime },
    Aborted(AbortReason),
}

impl RunOutcome {
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            RunOutcome::Aborted(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, RunOutcome::Aborted(_))
    }
}

/// Everything a single `run`/`run_until` call dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport<R> {
    pub outcome: RunOutcome,
    pub dispatches: Vec<Dispatch<R>>,
    pub started_at: SimTime,
    pub finished_at: SimTime,
}

impl<R> RunReport<R> {
    pub fn dispatched(&self) -> usize {
        self.dispatches.len()
    }

    /// Result payloads in dispatch order (failed bodies have none)
    pub fn payloads(&self) -> impl Iterator<Item = &R> {
        self.dispatches.iter().filter_map(|d| d.payload.as_ref())
    }

    pub fn times(&self) -> Vec<SimTime> {
        self.dispatches.iter().map(Dispatch::time).collect()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Discrete-event engine for one simulation trial
///
/// `M` is the model event bodies mutate; `R` is the per-event result payload.
///
/// # Example
/// ```
/// use finsim_core_rs::{Engine, EngineState, Outcome, SimTime};
///
/// // Model: running balance in cents. Payload: balance after each event.
/// let mut engine: Engine<i64, i64> = Engine::new(0);
///
/// engine
///     .schedule_fn(SimTime::new(1), "salary", |ctx| {
///         *ctx.model_mut() += 250_000;
///         ctx.schedule_fn(SimTime::new(3), "rent", |ctx| {
///             *ctx.model_mut() -= 120_000;
///             Ok(Outcome::proceed(*ctx.model()))
///         })?;
///         Ok(Outcome::proceed(*ctx.model()))
///     })
///     .unwrap();
///
/// let report = engine.run().unwrap();
/// assert_eq!(report.payloads().copied().collect::<Vec<_>>(), vec![250_000, 130_000]);
/// assert_eq!(engine.state(), EngineState::Stopped);
/// assert_eq!(engine.current_time(), SimTime::new(3));
/// ```
pub struct Engine<M = (), R = ()> {
    id: Uuid,
    config: EngineConfig,
    clock: Clock,
    queue: EventQueue<M, R>,
    status: EngineStatus,
    abort: Option<AbortReason>,
    model: M,
    rng: TrialRng,
    observers: Vec<Box<dyn Observer<R>>>,
    trace: Option<DispatchTrace>,
    dispatched: u64,
}

impl<M, R> Engine<M, R> {
    /// Create an engine with the default configuration
    pub fn new(model: M) -> Self {
        Self::build(EngineConfig::default(), model)
    }

    /// Create an engine from a validated configuration
    pub fn with_config(config: EngineConfig, model: M) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::build(config, model))
    }

    fn build(config: EngineConfig, model: M) -> Self {
        let clock = match config.ticks_per_day {
            Some(tpd) => Clock::with_calendar(config.epoch, tpd),
            None => Clock::new(config.epoch),
        };
        let engine = Self {
            id: Uuid::new_v4(),
            clock,
            queue: EventQueue::new(),
            status: EngineStatus {
                state: EngineState::Idle,
                message: "Initialized".to_string(),
            },
            abort: None,
            model,
            rng: TrialRng::new(config.rng_seed),
            observers: Vec::new(),
            trace: config.record_trace.then(DispatchTrace::new),
            dispatched: 0,
            config,
        };
        tracing::debug!(
            engine = %engine.config.name,
            id = %engine.id,
            epoch = %engine.clock.epoch(),
            "engine initialized"
        );
        engine
    }

    /// Register an observer (builder form)
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: Observer<R> + 'static,
    {
        self.observers.push(Box::new(observer));
        self
    }

    /// Register an observer on an existing engine
    pub fn add_observer<O>(&mut self, observer: O)
    where
        O: Observer<R> + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Unique id of this engine instance, used in log output
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configured engine name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current simulated time
    #[inline]
    pub fn current_time(&self) -> SimTime {
        self.clock.now()
    }

    /// The engine clock, for calendar queries
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.status.state
    }

    /// Whether the engine is in `state`
    pub fn is_state(&self, state: EngineState) -> bool {
        self.status.state == state
    }

    /// Lifecycle state together with its explanatory message
    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    /// Latest status message
    pub fn message(&self) -> &str {
        &self.status.message
    }

    /// Set once the engine has aborted
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        self.abort.as_ref()
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Ordering keys of every queued event, in dispatch order
    pub fn pending_keys(&self) -> Vec<EventKey> {
        self.queue.pending_keys()
    }

    /// Time of the next queued event, if any
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek_time()
    }

    /// Total events dispatched over the engine's lifetime
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// The model event bodies mutate
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the model between runs
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Consume the engine and hand back the model for aggregation
    pub fn into_model(self) -> M {
        self.model
    }

    /// The trial's random stream, as seeded from `EngineConfig::rng_seed`
    pub fn rng(&self) -> &TrialRng {
        &self.rng
    }

    /// Dispatch trace of the engine's lifetime
    ///
    /// Fails with `TraceNotEnabled` unless `EngineConfig::record_trace` is set.
    pub fn trace(&self) -> Result<&DispatchTrace, EngineError> {
        self.trace.as_ref().ok_or(EngineError::TraceNotEnabled)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Submit an event to the queue
    ///
    /// Fails with `InvalidSchedule` if the event lies before the current
    /// time and with `EngineTerminated` once the engine has stopped or
    /// aborted. A failed call changes nothing.
    pub fn schedule(&mut self, event: ScheduledEvent<M, R>) -> Result<EventKey, EngineError> {
        self.ensure_live()?;
        let key = self.queue.insert(event, self.clock.now())?;
        tracing::trace!(
            engine = %self.config.name,
            time = %key.time,
            priority = key.priority,
            tie_break = key.tie_break,
            "event scheduled"
        );
        Ok(key)
    }

    /// Schedule `event` at `time` with the default priority
    pub fn schedule_at<E>(&mut self, time: SimTime, event: E) -> Result<EventKey, EngineError>
    where
        E: Event<M, R> + 'static,
    {
        self.schedule(ScheduledEvent::new(time, event))
    }

    /// Schedule a closure as an event named `name`
    ///
    /// # Arguments
    /// * `time` - When the closure fires; must not precede `current_time()`
    /// * `name` - Label used in logs, traces and abort reasons
    /// * `body` - One-shot event body
    pub fn schedule_fn<F>(
        &mut self,
        time: SimTime,
        name: impl Into<String>,
        body: F,
    ) -> Result<EventKey, EngineError>
    where
        F: FnOnce(&mut Context<'_, M, R>) -> Result<Outcome<M, R>, EventError> + 'static,
    {
        self.schedule(ScheduledEvent::from_fn(time, name, body))
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Dispatch exactly one event
    ///
    /// Fails with `QueueExhausted` when nothing is pending; the engine state
    /// is left as it was. Terminal signals are applied before returning, so
    /// check `state()` afterwards.
    pub fn step(&mut self) -> Result<Dispatch<R>, EngineError> {
        self.ensure_live()?;
        let entry = self
            .queue
            .pop_minimum()
            .map_err(|_| EngineError::QueueExhausted)?;
        if self.status.state != EngineState::Running {
            let message = format!("Stepping from {}", self.clock.now());
            self.transition(EngineState::Running, message);
        }
        Ok(self.dispatch(entry))
    }

    /// Run until the queue is empty or a terminal signal is processed
    pub fn run(&mut self) -> Result<RunReport<R>, EngineError> {
        self.run_with(None)
    }

    /// Run, but leave any event later than `until` queued
    ///
    /// Events at exactly `until` are dispatched. If the run reaches the
    /// horizon the engine is `Paused` and the clock stays at the last
    /// dispatched event.
    pub fn run_until(&mut self, until: SimTime) -> Result<RunReport<R>, EngineError> {
        self.run_with(Some(until))
    }

    fn run_with(&mut self, until: Option<SimTime>) -> Result<RunReport<R>, EngineError> {
        self.ensure_live()?;

        let started_at = self.clock.now();
        if self.queue.is_empty() {
            let message = format!("Simulation finished at {}", started_at);
            self.transition(EngineState::Stopped, message);
            return Ok(RunReport {
                outcome: RunOutcome::Exhausted,
                dispatches: Vec::new(),
                started_at,
                finished_at: started_at,
            });
        }

        let horizon = until.map_or_else(|| "never".to_string(), |t| t.to_string());
        self.transition(EngineState::Running, format!("Stopping at {}", horizon));

        let mut dispatches = Vec::new();
        let outcome = loop {
            let next = match self.queue.peek_time() {
                Some(time) => time,
                None => {
                    let message = format!("Simulation finished at {}", self.clock.now());
                    self.transition(EngineState::Stopped, message);
                    break RunOutcome::Exhausted;
                }
            };

            if let Some(limit) = until {
                if next > limit {
                    let message = format!(
                        "Simulation horizon {} reached; next event at {}",
                        limit, next
                    );
                    self.transition(EngineState::Paused, message);
                    break RunOutcome::Paused { until: limit };
                }
            }

            let entry = self.queue.pop_minimum()?;
            dispatches.push(self.dispatch(entry));

            match (self.status.state, &self.abort, dispatches.last()) {
                (EngineState::Aborted, Some(reason), _) => {
                    break RunOutcome::Aborted(reason.clone());
                }
                (EngineState::Stopped, _, Some(last)) => {
                    break RunOutcome::Stopped {
                        event: last.name.clone(),
                        at: last.time(),
                    };
                }
                _ => {}
            }
        };

        Ok(RunReport {
            outcome,
            dispatches,
            started_at,
            finished_at: self.clock.now(),
        })
    }

    /// Fire one popped event and apply everything it asked for
    fn dispatch(&mut self, entry: QueuedEvent<M, R>) -> Dispatch<R> {
        let (key, body) = entry.into_parts();
        self.clock.advance_to(key.time);
        let index = self.dispatched;
        self.dispatched += 1;
        let name = body.name().to_string();

        tracing::debug!(
            engine = %self.config.name,
            event = %name,
            time = %key.time,
            priority = key.priority,
            tie_break = key.tie_break,
            "dispatching event"
        );

        let mut ctx = Context::new(&self.clock, &mut self.model, &mut self.rng);
        let fired = panic::catch_unwind(AssertUnwindSafe(|| body.fire(&mut ctx)));
        let mut yielded = ctx.into_yielded();

        let fired = match fired {
            Ok(result) => result,
            Err(cause) if self.config.catch_panics => {
                Err(EventError::Panicked(panic_message(cause.as_ref())))
            }
            Err(cause) => {
                // The engine must be terminal before the panic leaves it.
                let reason = EventError::Panicked(panic_message(cause.as_ref())).to_string();
                let (state, message) = self.abort_with(reason, &name, key.time);
                self.transition(state, message);
                panic::resume_unwind(cause);
            }
        };

        let (payload, signal) = match fired {
            Ok(Outcome { payload, signal }) => (Some(payload), signal),
            Err(err) => (None, ControlSignal::Abort(err.to_string())),
        };

        let mut kind = signal.kind();
        let mut scheduled = 0;
        let next_state = match signal {
            ControlSignal::Stop => {
                tracing::info!(
                    engine = %self.config.name,
                    event = %name,
                    discarded_yields = yielded.len(),
                    still_queued = self.queue.len(),
                    "stop requested"
                );
                Some((
                    EngineState::Stopped,
                    format!("Simulation was stopped by event {} at {}", name, key.time),
                ))
            }
            ControlSignal::Abort(reason) => Some(self.abort_with(reason, &name, key.time)),
            other => {
                if let ControlSignal::Schedule(extra) = other {
                    yielded.extend(extra);
                }
                match self.enqueue_yielded(yielded) {
                    Ok(inserted) => {
                        scheduled = inserted;
                        if inserted > 0 {
                            kind = SignalKind::Schedule;
                        }
                        None
                    }
                    Err(err) => {
                        kind = SignalKind::Abort;
                        Some(self.abort_with(err.to_string(), &name, key.time))
                    }
                }
            }
        };

        let dispatch = Dispatch {
            index,
            key,
            name,
            payload,
            signal: kind,
            scheduled,
        };

        if let Some(trace) = self.trace.as_mut() {
            trace.record(dispatch.record());
        }
        if let Some((state, message)) = next_state {
            self.transition(state, message);
        }
        for observer in self.observers.iter_mut() {
            observer.on_dispatch(&dispatch);
        }

        dispatch
    }

    fn enqueue_yielded(&mut self, events: Vec<ScheduledEvent<M, R>>) -> Result<usize, EngineError> {
        let now = self.clock.now();
        let mut inserted = 0;
        for event in events {
            self.queue.insert(event, now)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Discard all pending work and record why; returns the transition to apply
    fn abort_with(&mut self, reason: String, event: &str, at: SimTime) -> (EngineState, String) {
        let discarded = self.queue.clear();
        tracing::warn!(
            engine = %self.config.name,
            id = %self.id,
            event = %event,
            %at,
            discarded,
            "run aborted: {}",
            reason
        );
        let message = format!(
            "Simulation was aborted by event {} at {}: {}",
            event, at, reason
        );
        self.abort = Some(AbortReason {
            reason,
            event: event.to_string(),
            at,
        });
        (EngineState::Aborted, message)
    }

    fn transition(&mut self, to: EngineState, message: String) {
        let from = self.status.state;
        let at = self.clock.now();
        tracing::info!(
            engine = %self.config.name,
            id = %self.id,
            %from,
            %to,
            %at,
            "{}",
            message
        );
        self.status = EngineStatus { state: to, message };
        for observer in self.observers.iter_mut() {
            observer.on_transition(from, to, at);
        }
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.status.state.is_terminal() {
            return Err(EngineError::EngineTerminated {
                state: self.status.state,
            });
        }
        Ok(())
    }
}

impl<M: Default, R> Default for Engine<M, R> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<M, R> fmt::Display for Engine<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Engine({}) - {} events - Status: '{}'",
            self.config.name,
            self.queue.len(),
            self.status.state
        )
    }
}

impl<M, R> fmt::Debug for Engine<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("state", &self.status.state)
            .field("now", &self.clock.now())
            .field("pending", &self.queue.len())
            .field("dispatched", &self.dispatched)
            .finish()
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
