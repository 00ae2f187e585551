//! Scheduling handle passed to an executing event
//!
//! The context exposes the advanced clock, the engine's model and RNG, and a
//! buffer for follow-on events. Every follow-on event is checked against the
//! current time the moment it is scheduled, so an event body learns about a
//! bad time straight away. The buffer is handed back to the engine only
//! after the body returns.

use crate::core::time::{Clock, SimTime};
use crate::events::types::{Event, Outcome, ScheduledEvent};
use crate::orchestrator::error::{EngineError, EventError};
use crate::rng::TrialRng;

pub struct Context<'a, M, R> {
    clock: &'a Clock,
    model: &'a mut M,
    rng: &'a mut TrialRng,
    yielded: Vec<ScheduledEvent<M, R>>,
}

impl<'a, M, R> Context<'a, M, R> {
    pub(crate) fn new(clock: &'a Clock, model: &'a mut M, rng: &'a mut TrialRng) -> Self {
        Self {
            clock,
            model,
            rng,
            yielded: Vec::new(),
        }
    }

    /// Current simulated time (the scheduled time of the firing event)
    #[inline]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Read-only view of the clock, for calendar queries
    pub fn clock(&self) -> &Clock {
        self.clock
    }

    pub fn model(&self) -> &M {
        &*self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut *self.model
    }

    /// The trial's seeded random stream
    pub fn rng(&mut self) -> &mut TrialRng {
        &mut *self.rng
    }

    /// Yield a follow-on event
    ///
    /// Fails with `InvalidSchedule` if the event lies before `now()`. An
    /// event at exactly `now()` is accepted and fires after the current one.
    pub fn schedule(&mut self, event: ScheduledEvent<M, R>) -> Result<(), EngineError> {
        let now = self.now();
        if event.time < now {
            return Err(EngineError::InvalidSchedule {
                requested: event.time,
                current: now,
            });
        }
        self.yielded.push(event);
        Ok(())
    }

    pub fn schedule_at<E>(&mut self, time: SimTime, event: E) -> Result<(), EngineError>
    where
        E: Event<M, R> + 'static,
    {
        self.schedule(ScheduledEvent::new(time, event))
    }

    /// Yield `event` to fire `delay` ticks from now
    pub fn schedule_after<E>(&mut self, delay: u64, event: E) -> Result<(), EngineError>
    where
        E: Event<M, R> + 'static,
    {
        let time = self.after(delay)?;
        self.schedule(ScheduledEvent::new(time, event))
    }

    pub fn schedule_fn<F>(
        &mut self,
        time: SimTime,
        name: impl Into<String>,
        body: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&mut Context<'_, M, R>) -> Result<Outcome<M, R>, EventError> + 'static,
    {
        self.schedule(ScheduledEvent::from_fn(time, name, body))
    }

    /// Number of follow-on events yielded so far by this dispatch
    pub fn yielded(&self) -> usize {
        self.yielded.len()
    }

    pub(crate) fn into_yielded(self) -> Vec<ScheduledEvent<M, R>> {
        self.yielded
    }

    fn after(&self, delay: u64) -> Result<SimTime, EngineError> {
        let now = self.now();
        now.after(delay).ok_or(EngineError::InvalidSchedule {
            requested: SimTime::new(u64::MAX),
            current: now,
        })
    }
}
