//! HTTP client for the scoring service.
//!
//! Two halves: the OAuth device flow (authorize, token polling) and the
//! authenticated score fetch. The score fetch never returns an error; every
//! failure maps into the `FetchFailure` taxonomy so the scheduler can act
//! on it.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{FetchFailure, FetchOutcome, ScoreSnapshot};
use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SCOPE: &str = "section:member:read";
/// Fallback block length when a 429 carries no usable timestamp.
const DEFAULT_BLOCK_SECS: i64 = 1800;

/// Device-authorization response.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    pub interval: u64,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    blocked_until: Option<DateTime<Utc>>,
    #[serde(default)]
    retry_after: Option<i64>,
}

/// Client for the scoring service's device adapter API.
pub struct DeviceApiClient {
    base_url: String,
    client_id: String,
    http: reqwest::Client,
}

impl DeviceApiClient {
    pub fn new(base_url: &str, client_id: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            http,
        })
    }

    // ── Score fetch ──────────────────────────────────────────────────

    /// Fetch current patrol scores. Infallible by contract: failures come
    /// back as categorized `FetchFailure` values.
    pub async fn fetch_scores(&self, bearer: &str) -> FetchOutcome {
        let url = format!("{}/api/v1/patrols", self.base_url);
        let response = match self.http.get(&url).bearer_auth(bearer).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "score request failed");
                return FetchOutcome::Failure(FetchFailure::Transient);
            }
        };

        let status = response.status().as_u16();
        match status {
            200 => match response.json::<ScoreSnapshot>().await {
                Ok(snap) => {
                    debug!(
                        patrols = snap.patrols.len(),
                        from_cache = snap.from_cache,
                        "received patrol scores"
                    );
                    FetchOutcome::Success(snap)
                }
                Err(e) => {
                    warn!(error = %e, "malformed score response");
                    FetchOutcome::Failure(FetchFailure::Transient)
                }
            },
            400 => {
                let body = error_body(response).await;
                if body.error == "section_not_found" {
                    warn!(message = %body.message, "section not found");
                    FetchOutcome::Failure(FetchFailure::SectionUnavailable)
                } else {
                    warn!(error = %body.error, "unexpected 400 from score endpoint");
                    FetchOutcome::Failure(FetchFailure::Transient)
                }
            }
            401 => FetchOutcome::Failure(FetchFailure::AuthExpired),
            409 => {
                let body = error_body(response).await;
                if body.error == "not_in_term" {
                    FetchOutcome::Failure(FetchFailure::NotInActiveTerm)
                } else {
                    warn!(error = %body.error, "unexpected 409 from score endpoint");
                    FetchOutcome::Failure(FetchFailure::Transient)
                }
            }
            429 => {
                let body = error_body(response).await;
                let until = body.blocked_until.unwrap_or_else(|| {
                    Utc::now()
                        + ChronoDuration::seconds(body.retry_after.unwrap_or(DEFAULT_BLOCK_SECS))
                });
                warn!(%until, "user temporarily blocked");
                FetchOutcome::Failure(FetchFailure::TemporaryBlock { until })
            }
            503 => {
                let body = error_body(response).await;
                warn!(message = %body.message, "service blocked");
                FetchOutcome::Failure(FetchFailure::ServiceBlocked)
            }
            other => {
                warn!(status = other, "unexpected status from score endpoint");
                FetchOutcome::Failure(FetchFailure::Transient)
            }
        }
    }

    // ── Device flow ──────────────────────────────────────────────────

    /// Request a device code to start the authorization flow.
    pub async fn request_device_code(&self, scope: &str) -> Result<DeviceAuthorization, ApiError> {
        let url = format!("{}/device/authorize", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "scope": scope,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Protocol(format!(
                "device authorize returned {}",
                response.status()
            )));
        }
        response
            .json::<DeviceAuthorization>()
            .await
            .map_err(|e| ApiError::Protocol(e.to_string()))
    }

    /// Poll the token endpoint once.
    pub async fn poll_for_token(&self, device_code: &str) -> Result<TokenGrant, ApiError> {
        let url = format!("{}/device/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "grant_type": "urn:ietf:params:oauth:grant-type:device_code",
                "device_code": device_code,
                "client_id": self.client_id,
            }))
            .send()
            .await?;

        if response.status().as_u16() == 400 {
            let body = error_body(response).await;
            return Err(match body.error.as_str() {
                "authorization_pending" => ApiError::AuthorizationPending,
                "access_denied" => ApiError::AccessDenied,
                "expired_token" => ApiError::CodeExpired,
                other => ApiError::Token(other.to_string()),
            });
        }
        if !response.status().is_success() {
            return Err(ApiError::Protocol(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| ApiError::Protocol(e.to_string()))
    }

    /// Full device flow: request a code, surface it through `on_code`, then
    /// poll at the server-provided interval until approval or expiry.
    pub async fn authenticate<F>(&self, on_code: F) -> Result<TokenGrant, ApiError>
    where
        F: Fn(&DeviceAuthorization),
    {
        let auth = self.request_device_code(DEFAULT_SCOPE).await?;
        on_code(&auth);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(auth.expires_in);
        let interval = Duration::from_secs(auth.interval.max(1));
        loop {
            tokio::time::sleep(interval).await;
            if tokio::time::Instant::now() >= deadline {
                return Err(ApiError::CodeExpired);
            }
            match self.poll_for_token(&auth.device_code).await {
                Ok(grant) => return Ok(grant),
                Err(ApiError::AuthorizationPending) => {
                    debug!("waiting for user authorization");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn error_body(response: reqwest::Response) -> ErrorBody {
    response.json::<ErrorBody>().await.unwrap_or_default()
}
