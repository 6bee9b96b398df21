//! Reconnect backoff policy for the realtime channel.
//!
//! Exponential growth with a small uniform jitter so a fleet of boards does
//! not reconnect in lockstep after a server restart. This policy only
//! produces delays; it never fails.

use rand::Rng;
use std::time::Duration;

const BASE_MS: u64 = 2_000;
const MAX_MS: u64 = 60_000;
const JITTER_CAP_MS: u64 = 1_000;

/// Maps a consecutive-failure attempt counter to a retry delay.
///
/// `delay = min(2s * 2^attempt, 60s)` plus a uniformly random jitter in
/// `[0, min(1s, delay / 10))`. The caller owns the attempt counter and
/// resets it to zero after any successful connection, so transient blips
/// recover fast while true outages back off.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectBackoff {
    jittered: bool,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self { jittered: true }
    }

    /// Deterministic variant for tests.
    pub fn unjittered() -> Self {
        Self { jittered: false }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = if attempt >= 32 {
            MAX_MS
        } else {
            BASE_MS.saturating_mul(1 << attempt).min(MAX_MS)
        };
        let jitter_cap = JITTER_CAP_MS.min(base_ms / 10);
        let jitter_ms = if self.jittered && jitter_cap > 0 {
            rand::thread_rng().gen_range(0..jitter_cap)
        } else {
            0
        };
        Duration::from_millis(base_ms + jitter_ms)
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}
