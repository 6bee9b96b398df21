//! Scoring-service API: reqwest client, device flow, token persistence.

pub mod client;
pub mod token_store;
pub mod types;

pub use client::{DeviceApiClient, DeviceAuthorization, TokenGrant};
pub use token_store::TokenStore;
pub use types::{FetchFailure, FetchOutcome, PatrolScore, RateLimitState, ScoreSnapshot};
