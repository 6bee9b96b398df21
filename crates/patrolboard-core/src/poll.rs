//! Poll scheduler: decides when the next score fetch happens.
//!
//! The schedule is recomputed after every fetch attempt. Successes poll
//! shortly after the server's cache expiry; each failure category has a
//! fixed rescheduling action. A pending wake signal always overrides the
//! computed time.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::debug;

use crate::api::types::{FetchFailure, FetchOutcome, PatrolScore, RateLimitState};

/// Slack added after the server's cache expiry before polling again.
const CACHE_EXPIRY_SLACK_SECS: i64 = 7;
/// Retry delay after losing the section (auth is also invalidated).
const SECTION_RETRY_SECS: i64 = 5;
/// Retry horizon while the section has no active term.
const OUT_OF_TERM_RETRY_HOURS: i64 = 24;
/// Retry horizon while the upstream service blocks the adapter.
const SERVICE_BLOCKED_RETRY_HOURS: i64 = 1;
/// Pause before resuming the loop after a user-level block.
const BLOCK_GRACE: Duration = Duration::from_secs(2);
/// Minimum delay before retrying a transient failure. The schedule itself
/// is left unchanged; this floor only prevents busy-retrying.
const TRANSIENT_FLOOR_SECS: i64 = 2;

/// Bar capacity of the physical display; scores above it shift the window.
const BAR_CAPACITY: i64 = 240;
const OFFSET_HEADROOM: i64 = 200;

/// What the orchestrator must do after recording an outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerEffect {
    /// The outcome implies the bearer token is no longer valid.
    pub auth_invalidated: bool,
    /// Pause this long before the next loop iteration.
    pub grace: Option<Duration>,
}

/// Cache-aware poll schedule.
#[derive(Debug)]
pub struct PollScheduler {
    /// `None` means poll immediately.
    next_poll_at: Option<DateTime<Utc>>,
    /// Floor applied after transient failures; wake signals override it.
    not_before: Option<DateTime<Utc>>,
    rate_limit_state: RateLimitState,
    score_offset: u32,
    offset_initialized: bool,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            next_poll_at: None,
            not_before: None,
            rate_limit_state: RateLimitState::None,
            score_offset: 0,
            offset_initialized: false,
        }
    }

    /// Whether a fetch should run now. A pending wake signal forces an
    /// immediate fetch regardless of the computed time.
    pub fn due(&self, now: DateTime<Utc>, wake_pending: bool) -> bool {
        if wake_pending {
            return true;
        }
        if let Some(floor) = self.not_before {
            if now < floor {
                return false;
            }
        }
        match self.next_poll_at {
            None => true,
            Some(at) => now >= at,
        }
    }

    /// Mark a refetch in flight so the display's status indicator can show
    /// it. Only meaningful once a first snapshot has been rendered.
    pub fn begin_fetch(&mut self) {
        if self.offset_initialized {
            self.rate_limit_state = RateLimitState::Loading;
        }
    }

    /// Force the next `due` check to fire (used after re-authentication).
    pub fn force_immediate(&mut self) {
        self.next_poll_at = None;
        self.not_before = None;
    }

    /// Feed one fetch outcome back into the schedule.
    pub fn record(&mut self, outcome: &FetchOutcome, now: DateTime<Utc>) -> SchedulerEffect {
        self.not_before = None;
        match outcome {
            FetchOutcome::Success(snap) => {
                self.next_poll_at =
                    Some(snap.cache_expires_at + ChronoDuration::seconds(CACHE_EXPIRY_SLACK_SECS));
                self.rate_limit_state = snap.rate_limit_state;
                self.update_offset(&snap.patrols);
                debug!(next_poll_at = ?self.next_poll_at, "score fetch succeeded");
                SchedulerEffect::default()
            }
            FetchOutcome::Failure(FetchFailure::AuthExpired) => SchedulerEffect {
                auth_invalidated: true,
                grace: None,
            },
            FetchOutcome::Failure(FetchFailure::SectionUnavailable) => {
                self.next_poll_at = Some(now + ChronoDuration::seconds(SECTION_RETRY_SECS));
                SchedulerEffect {
                    auth_invalidated: true,
                    grace: None,
                }
            }
            FetchOutcome::Failure(FetchFailure::NotInActiveTerm) => {
                self.next_poll_at = Some(now + ChronoDuration::hours(OUT_OF_TERM_RETRY_HOURS));
                SchedulerEffect::default()
            }
            FetchOutcome::Failure(FetchFailure::TemporaryBlock { until }) => {
                self.next_poll_at = Some(*until);
                self.rate_limit_state = RateLimitState::UserBlocked;
                SchedulerEffect {
                    auth_invalidated: false,
                    grace: Some(BLOCK_GRACE),
                }
            }
            FetchOutcome::Failure(FetchFailure::ServiceBlocked) => {
                self.next_poll_at = Some(now + ChronoDuration::hours(SERVICE_BLOCKED_RETRY_HOURS));
                self.rate_limit_state = RateLimitState::ServiceBlocked;
                SchedulerEffect::default()
            }
            FetchOutcome::Failure(FetchFailure::Transient) => {
                // Schedule unchanged; just avoid busy-retrying.
                self.not_before = Some(now + ChronoDuration::seconds(TRANSIENT_FLOOR_SECS));
                SchedulerEffect::default()
            }
        }
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        self.rate_limit_state
    }

    pub fn score_offset(&self) -> u32 {
        self.score_offset
    }

    pub fn next_poll_at(&self) -> Option<DateTime<Utc>> {
        self.next_poll_at
    }

    /// Broken-axis windowing for the bar display. The offset is set when the
    /// leading score first exceeds the bar capacity and only recomputed when
    /// a score overflows the current window.
    fn update_offset(&mut self, patrols: &[PatrolScore]) {
        let Some(max) = patrols.iter().map(|p| p.score).max() else {
            return;
        };
        if !self.offset_initialized {
            self.score_offset = if max > BAR_CAPACITY {
                (max - OFFSET_HEADROOM).max(0) as u32
            } else {
                0
            };
            self.offset_initialized = true;
        } else if patrols
            .iter()
            .any(|p| p.score - self.score_offset as i64 > BAR_CAPACITY)
        {
            self.score_offset = (max - OFFSET_HEADROOM).max(0) as u32;
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}
