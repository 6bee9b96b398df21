//! Core library for the patrol scoreboard sync service.
//!
//! Keeps a physical scoreboard display in step with a scoring service:
//! cache-aware polling over HTTP, a push channel for server-initiated
//! refreshes and countdown control, and the orchestrator that arbitrates
//! the two over a single display.

pub mod api;
pub mod backoff;
pub mod config;
pub mod display;
pub mod error;
pub mod orchestrator;
pub mod poll;
pub mod realtime;
pub mod timer;
pub mod wake;

pub use api::{
    DeviceApiClient, FetchFailure, FetchOutcome, PatrolScore, RateLimitState, ScoreSnapshot,
    TokenStore,
};
pub use backoff::ReconnectBackoff;
pub use config::BoardConfig;
pub use display::DisplaySink;
pub use error::{ApiError, ConfigError, CoreError, RealtimeError, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig, Reauthenticator, ScoreSource};
pub use poll::{PollScheduler, SchedulerEffect};
pub use realtime::{
    ConnectionState, RealtimeConnection, RealtimeMessage, RealtimeTransport, WsTransport,
};
pub use timer::{CountdownEngine, TimerCommand, TimerHandle, TimerPhase, TimerSnapshot};
pub use wake::WakeSignal;
