//! Countdown timer engine.
//!
//! One long-lived tick task per engine. Commands arrive on a channel and
//! interrupt the current wait; an uninterrupted one-second wait decrements
//! the remaining time. Replacing the countdown goes through the same task,
//! so two tick loops can never overlap.
//!
//! ## State transitions
//!
//! ```text
//! Inactive -> Running <-> Paused
//!                |
//!                v
//!            Finished -> (Start | Reset)
//! ```
//!
//! The engine owns the countdown side of the display: it renders exactly one
//! frame per elapsed wait and per state-changing command, and renders
//! nothing while Inactive.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::display::DisplaySink;

const TICK: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Inactive,
    Running,
    Paused,
    Finished,
}

/// Shared view of the countdown, readable from any task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub remaining_secs: u32,
}

/// Commands routed in from the push channel (or any other operator input).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Replace any in-flight countdown. Durations <= 0 clamp to zero and
    /// land directly in Finished.
    Start { duration_secs: i64 },
    Pause,
    Resume,
    Reset,
}

/// Cloneable command/query handle, safe to hand to the message handler.
#[derive(Clone)]
pub struct TimerHandle {
    tx: mpsc::UnboundedSender<TimerCommand>,
    shared: Arc<Mutex<TimerSnapshot>>,
}

impl TimerHandle {
    /// Non-blocking. Commands sent after shutdown are dropped.
    pub fn command(&self, cmd: TimerCommand) {
        let _ = self.tx.send(cmd);
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        *self.shared.lock().unwrap()
    }

    pub fn phase(&self) -> TimerPhase {
        self.snapshot().phase
    }
}

/// Countdown engine: owns the tick task.
pub struct CountdownEngine {
    handle: TimerHandle,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CountdownEngine {
    /// Spawn the tick task. The engine renders countdown frames through
    /// `display` and never fails.
    pub fn spawn(display: Arc<dyn DisplaySink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let shared = Arc::new(Mutex::new(TimerSnapshot {
            phase: TimerPhase::Inactive,
            remaining_secs: 0,
        }));
        let task = tokio::spawn(tick_loop(rx, stop_rx, shared.clone(), display));
        Self {
            handle: TimerHandle { tx, shared },
            stop_tx,
            task,
        }
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }

    pub fn command(&self, cmd: TimerCommand) {
        self.handle.command(cmd);
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.handle.snapshot()
    }

    pub fn phase(&self) -> TimerPhase {
        self.handle.phase()
    }

    /// Stop the tick task and wait for it, bounded. Outstanding handles stay
    /// valid but their commands are dropped.
    pub async fn shutdown(self) {
        let CountdownEngine {
            handle,
            stop_tx,
            mut task,
        } = self;
        drop(handle);
        let _ = stop_tx.send(true);
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            debug!("countdown task did not stop within grace period; aborting");
            task.abort();
        }
    }
}

async fn tick_loop(
    mut rx: mpsc::UnboundedReceiver<TimerCommand>,
    mut stop_rx: watch::Receiver<bool>,
    shared: Arc<Mutex<TimerSnapshot>>,
    display: Arc<dyn DisplaySink>,
) {
    loop {
        if *stop_rx.borrow() {
            break;
        }
        let phase = shared.lock().unwrap().phase;
        let cmd = match phase {
            // Display belongs to the poll side; just wait for a command.
            TimerPhase::Inactive => tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => Some(cmd),
                    None => break,
                },
                _ = stop_rx.changed() => continue,
            },
            // Bounded wait so commands are observed within a second.
            _ => tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => Some(cmd),
                    None => break,
                },
                _ = stop_rx.changed() => continue,
                _ = tokio::time::sleep(TICK) => None,
            },
        };

        match cmd {
            Some(cmd) => {
                if apply(&shared, cmd) {
                    render_unless_inactive(&shared, &display);
                }
            }
            // A full wait elapsed without interruption.
            None => {
                elapse(&shared);
                render_unless_inactive(&shared, &display);
            }
        }
    }
}

/// Apply a command; returns whether it changed state.
fn apply(shared: &Mutex<TimerSnapshot>, cmd: TimerCommand) -> bool {
    let mut snap = shared.lock().unwrap();
    match cmd {
        TimerCommand::Start { duration_secs } => {
            let clamped = duration_secs.max(0) as u32;
            debug!(duration_secs = clamped, "countdown start");
            *snap = if clamped == 0 {
                TimerSnapshot {
                    phase: TimerPhase::Finished,
                    remaining_secs: 0,
                }
            } else {
                TimerSnapshot {
                    phase: TimerPhase::Running,
                    remaining_secs: clamped,
                }
            };
            true
        }
        TimerCommand::Pause => {
            if snap.phase == TimerPhase::Running {
                snap.phase = TimerPhase::Paused;
                true
            } else {
                false
            }
        }
        TimerCommand::Resume => {
            if snap.phase == TimerPhase::Paused {
                snap.phase = TimerPhase::Running;
                true
            } else {
                false
            }
        }
        TimerCommand::Reset => {
            let changed = snap.phase != TimerPhase::Inactive;
            *snap = TimerSnapshot {
                phase: TimerPhase::Inactive,
                remaining_secs: 0,
            };
            changed
        }
    }
}

/// One uninterrupted second passed: decrement while Running, finish at zero.
fn elapse(shared: &Mutex<TimerSnapshot>) {
    let mut snap = shared.lock().unwrap();
    if snap.phase == TimerPhase::Running {
        snap.remaining_secs = snap.remaining_secs.saturating_sub(1);
        if snap.remaining_secs == 0 {
            snap.phase = TimerPhase::Finished;
        }
    }
}

fn render_unless_inactive(shared: &Mutex<TimerSnapshot>, display: &Arc<dyn DisplaySink>) {
    let snap = *shared.lock().unwrap();
    if snap.phase != TimerPhase::Inactive {
        display.render_countdown(snap.remaining_secs, snap.phase == TimerPhase::Paused);
    }
}
