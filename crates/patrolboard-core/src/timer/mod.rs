//! Operator-driven countdown timer.

pub mod engine;

pub use engine::{CountdownEngine, TimerCommand, TimerHandle, TimerPhase, TimerSnapshot};
