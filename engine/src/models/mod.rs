//! Records produced by the engine for observers and replay checks

pub mod dispatch;
pub mod trace;

// Re-exports
pub use dispatch::{Dispatch, DispatchRecord};
pub use trace::DispatchTrace;
