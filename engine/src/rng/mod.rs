//! Deterministic random number generation
//!
//! Every engine owns one seeded `TrialRng`. Event bodies draw from it through
//! their `Context`, so a trial replays exactly when its seed and its seeding
//! sequence are the same. Distributions are left to the caller.

mod xorshift;

pub use xorshift::{derive_trial_seed, TrialRng};
