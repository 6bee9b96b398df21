//! Display sink seam.
//!
//! The core never renders pixels itself; it pushes frames through this
//! trait. Exactly one component may write at a time: the orchestrator
//! renders scores only while the countdown is Inactive, and the countdown
//! engine never renders scores, so the single-writer invariant holds by
//! construction.

use crate::api::types::{PatrolScore, RateLimitState};

/// Side-effect-only display. Implementations must be quick and must not
/// block: both the orchestrator loop and the timer tick loop call in.
pub trait DisplaySink: Send + Sync {
    /// Push a score frame, with the throttling indicator, whether the push
    /// channel is live, and the bar-graph windowing offset.
    fn render_scores(
        &self,
        patrols: &[PatrolScore],
        rate_limit: RateLimitState,
        realtime_connected: bool,
        score_offset: u32,
    );

    /// Push a countdown frame.
    fn render_countdown(&self, remaining_seconds: u32, paused: bool);
}
