//! Wire and domain types for the scoring service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One patrol and its score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatrolScore {
    pub id: String,
    pub name: String,
    pub score: i64,
}

/// Server-reported throttling level. Affects both the display indicator
/// and the reschedule policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RateLimitState {
    #[default]
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "DEGRADED")]
    Degraded,
    #[serde(rename = "USER_TEMPORARY_BLOCK")]
    UserBlocked,
    #[serde(rename = "SERVICE_BLOCKED")]
    ServiceBlocked,
    /// Client-side marker while a refetch is in flight.
    #[serde(rename = "LOADING")]
    Loading,
}

impl std::fmt::Display for RateLimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "ok"),
            Self::Degraded => write!(f, "degraded"),
            Self::UserBlocked => write!(f, "rate-limited"),
            Self::ServiceBlocked => write!(f, "service-blocked"),
            Self::Loading => write!(f, "loading"),
        }
    }
}

/// A successful score fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreSnapshot {
    pub patrols: Vec<PatrolScore>,
    #[serde(default)]
    pub from_cache: bool,
    /// Server-provided staleness horizon; the scheduler polls shortly after
    /// this passes.
    pub cache_expires_at: DateTime<Utc>,
    #[serde(default)]
    pub rate_limit_state: RateLimitState,
}

/// Categorized fetch failures. These are schedule inputs, not errors:
/// every one of them maps to a deterministic rescheduling action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// Bearer token rejected; re-authentication required.
    AuthExpired,
    /// The section disappeared from the account; also invalidates auth.
    SectionUnavailable,
    /// The section has no active term right now.
    NotInActiveTerm,
    /// User-level rate limit; the server says when it lifts.
    TemporaryBlock { until: DateTime<Utc> },
    /// Upstream service blocked the adapter entirely.
    ServiceBlocked,
    /// Anything else: network trouble, malformed body, unexpected status.
    Transient,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthExpired => write!(f, "auth expired"),
            Self::SectionUnavailable => write!(f, "section unavailable"),
            Self::NotInActiveTerm => write!(f, "not in active term"),
            Self::TemporaryBlock { until } => write!(f, "blocked until {until}"),
            Self::ServiceBlocked => write!(f, "service blocked"),
            Self::Transient => write!(f, "transient failure"),
        }
    }
}

/// Outcome of one fetch attempt, fed back into the poll scheduler.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(ScoreSnapshot),
    Failure(FetchFailure),
}
