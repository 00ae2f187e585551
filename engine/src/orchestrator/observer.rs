//! Observation callbacks
//!
//! Reporting consumers (ledgers, metrics collectors) register an `Observer`
//! when they build the engine. The engine calls it after every dispatch and
//! on every lifecycle transition. Observers only watch: they cannot
//! schedule events or alter the run.

use crate::core::time::SimTime;
use crate::models::dispatch::Dispatch;
use crate::orchestrator::engine::EngineState;

pub trait Observer<R> {
    /// Called once per dispatched event, after its signal has been applied
    ///
    /// A `Stop` or `Abort` has already been reported through
    /// `on_transition` by the time this runs.
    fn on_dispatch(&mut self, dispatch: &Dispatch<R>);

    /// Called whenever the engine changes (or re-enters) a lifecycle state
    fn on_transition(&mut self, _from: EngineState, _to: EngineState, _at: SimTime) {}
}

/// Any `FnMut(&Dispatch<R>)` closure observes dispatches.
impl<R, F> Observer<R> for F
where
    F: FnMut(&Dispatch<R>),
{
    fn on_dispatch(&mut self, dispatch: &Dispatch<R>) {
        (self)(dispatch)
    }
}
