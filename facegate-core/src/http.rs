//! Shared JSON-over-HTTP client with transient-error classification.
//!
//! Used by the verification, session-store and account clients. The remote
//! API reports application failures (unknown user, no face in image) as
//! JSON bodies on 4xx statuses, so a parsed body is returned whatever the
//! status; only unreachable hosts, gateway-style statuses and unparseable
//! bodies are errors.

use std::time::{Duration, Instant};

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{FacegateError, Result};

/// Parsed response body together with its HTTP status.
#[derive(Debug)]
pub struct ApiReply<R> {
    pub status: StatusCode,
    pub body: R,
}

pub struct ApiClient {
    client: Client,
    base: Url,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let base = parse_base_url(&config.base_url)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FacegateError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| FacegateError::Config(format!("Invalid endpoint path {path:?}: {e}")))
    }

    /// POST once; no retry.
    pub async fn post<B, R>(&self, path: &str, body: &B, bearer: Option<&str>) -> Result<ApiReply<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send_once(Method::POST, path, Some(body), bearer)
            .await
            .map_err(flatten)
    }

    /// DELETE once; no retry.
    pub async fn delete<R>(&self, path: &str, bearer: Option<&str>) -> Result<ApiReply<R>>
    where
        R: DeserializeOwned,
    {
        self.send_once::<(), R>(Method::DELETE, path, None, bearer)
            .await
            .map_err(flatten)
    }

    /// POST with exponential backoff on transient failures.
    pub async fn post_with_retry<B, R>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<ApiReply<R>>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        retry_notify(
            self.build_backoff(),
            || async { self.send_once(Method::POST, path, Some(body), bearer).await },
            |err: FacegateError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn send_once<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> std::result::Result<ApiReply<R>, backoff::Error<FacegateError>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path).map_err(backoff::Error::permanent)?;
        let start = Instant::now();

        let mut request = self.client.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            let err = FacegateError::Transport(format!("{path} request failed: {e}"));
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error");
                backoff::Error::transient(err)
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(err)
            }
        })?;

        let status = response.status();
        debug!(status = %status, url = %url, "Received HTTP response");

        if is_transient_status(status) {
            warn!(status = %status, "Transient HTTP status");
            return Err(backoff::Error::transient(FacegateError::Transport(format!(
                "{path} returned status: {status}"
            ))));
        }

        let bytes = response.bytes().await.map_err(|e| {
            backoff::Error::permanent(FacegateError::Transport(format!(
                "Failed to read {path} response: {e}"
            )))
        })?;

        let body: R = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(status = %status, error = %e, "Malformed response body");
            backoff::Error::permanent(FacegateError::Transport(format!(
                "Malformed {path} response (status {status}): {e}"
            )))
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        Ok(ApiReply { status, body })
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.retry_budget()),
            ..Default::default()
        }
    }
}

fn flatten(err: backoff::Error<FacegateError>) -> FacegateError {
    match err {
        backoff::Error::Permanent(e) => e,
        backoff::Error::Transient { err, .. } => err,
    }
}

/// Parse a base URL, making sure relative joins append to its path.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized)
        .map_err(|e| FacegateError::Config(format!("Invalid API base URL {raw:?}: {e}")))
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
