//! Dispatch ordering tests
//!
//! Events come out in `(time, priority, submission)` order, yields at the
//! current time fire before anything later, and ties are first-in first-out.

use finsim_core_rs::{Engine, Outcome, Priority, ScheduledEvent, SimTime};
use proptest::prelude::*;

type Fired = Vec<(u64, String)>;

fn recorder(time: u64, name: impl Into<String>) -> ScheduledEvent<Fired, ()> {
    let name = name.into();
    let label = name.clone();
    ScheduledEvent::<Fired, ()>::from_fn(SimTime::new(time), name, move |ctx| {
        let now = ctx.now().ticks();
        ctx.model_mut().push((now, label));
        Ok(Outcome::done())
    })
}

fn fired_names(engine: &Engine<Fired, ()>) -> Vec<&str> {
    engine.model().iter().map(|(_, n)| n.as_str()).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_mixed_times_dispatch_sorted_with_fifo_ties() {
    let mut engine: Engine<Fired, ()> = Engine::new(Vec::new());
    engine.schedule(recorder(5, "e5")).unwrap();
    engine.schedule(recorder(3, "e3-first")).unwrap();
    engine.schedule(recorder(3, "e3-second")).unwrap();
    engine.schedule(recorder(7, "e7")).unwrap();

    let report = engine.run().unwrap();

    assert_eq!(
        report.times(),
        vec![
            SimTime::new(3),
            SimTime::new(3),
            SimTime::new(5),
            SimTime::new(7)
        ]
    );
    assert_eq!(fired_names(&engine), vec!["e3-first", "e3-second", "e5", "e7"]);
    assert_eq!(engine.current_time(), SimTime::new(7));
}

#[test]
fn test_same_time_yield_fires_before_later_event() {
    let mut engine: Engine<Fired, ()> = Engine::new(Vec::new());
    engine
        .schedule_fn(SimTime::new(2), "parent", |ctx| {
            ctx.model_mut().push((2, "parent".to_string()));
            ctx.schedule(recorder(2, "child"))?;
            Ok(Outcome::done())
        })
        .unwrap();
    engine.schedule(recorder(3, "later")).unwrap();

    engine.run().unwrap();

    assert_eq!(
        engine.model(),
        &vec![
            (2, "parent".to_string()),
            (2, "child".to_string()),
            (3, "later".to_string()),
        ]
    );
}

#[test]
fn test_same_time_yield_queues_behind_existing_ties() {
    let mut engine: Engine<Fired, ()> = Engine::new(Vec::new());
    engine
        .schedule_fn(SimTime::new(4), "parent", |ctx| {
            ctx.schedule(recorder(4, "child"))?;
            Ok(Outcome::done())
        })
        .unwrap();
    engine.schedule(recorder(4, "sibling")).unwrap();

    engine.run().unwrap();
    assert_eq!(fired_names(&engine), vec!["sibling", "child"]);
}

#[test]
fn test_lower_priority_value_dispatches_first() {
    let mut engine: Engine<Fired, ()> = Engine::new(Vec::new());
    engine.schedule(recorder(10, "default")).unwrap();
    engine
        .schedule(recorder(10, "settlement").with_priority(-5))
        .unwrap();
    engine.schedule(recorder(10, "reporting").with_priority(5)).unwrap();
    engine.schedule(recorder(9, "earlier").with_priority(100)).unwrap();

    engine.run().unwrap();
    assert_eq!(
        fired_names(&engine),
        vec!["earlier", "settlement", "default", "reporting"]
    );
}

#[test]
fn test_pending_keys_predict_dispatch_order() {
    let mut engine: Engine<Fired, ()> = Engine::new(Vec::new());
    for (t, name) in [(8, "h"), (1, "a"), (8, "i"), (4, "d")] {
        engine.schedule(recorder(t, name)).unwrap();
    }

    let predicted: Vec<SimTime> = engine.pending_keys().iter().map(|k| k.time).collect();
    let report = engine.run().unwrap();
    assert_eq!(report.times(), predicted);
}

#[test]
fn test_clock_follows_dispatch_not_scheduling() {
    let mut engine: Engine<Fired, ()> = Engine::new(Vec::new());
    engine.schedule(recorder(50, "far")).unwrap();
    assert_eq!(engine.current_time(), SimTime::ZERO);

    engine.schedule(recorder(20, "near")).unwrap();
    let first = engine.step().unwrap();
    assert_eq!(first.time(), SimTime::new(20));
    assert_eq!(engine.current_time(), SimTime::new(20));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_dispatch_times_never_decrease(
        times in prop::collection::vec(0u64..1_000, 1..60),
    ) {
        let mut engine: Engine<Fired, ()> = Engine::new(Vec::new());
        for (i, t) in times.iter().enumerate() {
            engine.schedule(recorder(*t, format!("e{}", i))).unwrap();
        }

        let report = engine.run().unwrap();
        let dispatched = report.times();

        prop_assert_eq!(dispatched.len(), times.len());
        prop_assert!(dispatched.windows(2).all(|w| w[0] <= w[1]));

        let mut expected = times.clone();
        expected.sort_unstable();
        let dispatched: Vec<u64> = dispatched.iter().map(|t| t.ticks()).collect();
        prop_assert_eq!(dispatched, expected);
    }

    #[test]
    fn prop_distinct_time_priority_pairs_strictly_increase(
        pairs in prop::collection::btree_set((0u64..50, -5i32..5), 1..40),
    ) {
        let mut engine: Engine<Vec<(u64, Priority)>, ()> = Engine::new(Vec::new());
        // Submit in reverse so submission order disagrees with key order.
        for (t, p) in pairs.iter().rev().copied() {
            engine
                .schedule(
                    ScheduledEvent::<Vec<(u64, Priority)>, ()>::from_fn(SimTime::new(t), "pair", move |ctx| {
                        ctx.model_mut().push((t, p));
                        Ok(Outcome::done())
                    })
                    .with_priority(p),
                )
                .unwrap();
        }

        engine.run().unwrap();

        let fired = engine.model();
        prop_assert!(fired.windows(2).all(|w| w[0] < w[1]));
        let expected: Vec<(u64, Priority)> = pairs.into_iter().collect();
        prop_assert_eq!(fired, &expected);
    }

    #[test]
    fn prop_equal_keys_fire_in_submission_order(
        time in 0u64..100,
        priority in -3i32..3,
        count in 1usize..30,
    ) {
        let mut engine: Engine<Fired, ()> = Engine::new(Vec::new());
        for i in 0..count {
            engine
                .schedule(recorder(time, format!("{}", i)).with_priority(priority))
                .unwrap();
        }

        engine.run().unwrap();

        let order: Vec<usize> = engine
            .model()
            .iter()
            .map(|(_, n)| n.parse().unwrap())
            .collect();
        prop_assert_eq!(order, (0..count).collect::<Vec<_>>());
    }
}
