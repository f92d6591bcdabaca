//! HTTP client shared foundation
//!
//! This module provides a shared HTTP client with:
//! - Configurable timeout and User-Agent
//! - Optional bearer token
//! - Exponential backoff retry logic (max 3 retries)
//! - Rate limit error handling

use crate::error::UpstreamError;
use reqwest::Client;
use std::time::Duration;

/// Default timeout for HTTP requests (30 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent header
const DEFAULT_USER_AGENT: &str = concat!("recipe-bump/", env!("CARGO_PKG_VERSION"));

/// Maximum number of retry attempts
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_DELAY_MS: u64 = 100;

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                UpstreamError::unavailable("HTTP client", format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
            token: None,
        })
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Send a bearer token with every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Returns true if a token is configured
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url).header(reqwest::header::ACCEPT, accept);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Perform a GET request with retry logic
    ///
    /// `upstream` names the upstream in error messages.
    pub async fn get(
        &self,
        url: &str,
        accept: &str,
        upstream: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let mut last_error = None;
        let mut delay = BASE_DELAY_MS;

        for attempt in 0..=self.max_retries {
            match self.request(url, accept).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        last_error = Some(if status.is_server_error() {
                            UpstreamError::unavailable(upstream, format!("HTTP {}", status))
                        } else {
                            UpstreamError::unavailable(upstream, "rate limit exceeded")
                        });

                        if attempt < self.max_retries {
                            tracing::debug!(url, attempt, %status, "retrying request");
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            delay *= 2;
                            continue;
                        }
                        break;
                    }

                    if status == reqwest::StatusCode::FORBIDDEN && !self.has_token() {
                        return Err(UpstreamError::unavailable(
                            upstream,
                            "HTTP 403 (rate limited? set GITHUB_TOKEN)",
                        ));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(UpstreamError::not_found(upstream));
                    }

                    if !status.is_success() {
                        return Err(UpstreamError::unavailable(upstream, format!("HTTP {}", status)));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(if e.is_timeout() {
                        UpstreamError::unavailable(upstream, "request timed out")
                    } else {
                        UpstreamError::unavailable(upstream, e.to_string())
                    });

                    if attempt < self.max_retries {
                        tracing::debug!(url, attempt, error = %e, "retrying request");
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| UpstreamError::unavailable(upstream, "unknown error")))
    }

    /// Perform a GET request and parse a JSON response
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        upstream: &str,
    ) -> Result<T, UpstreamError> {
        let response = self.get(url, "application/vnd.github+json", upstream).await?;
        response.json::<T>().await.map_err(|e| {
            UpstreamError::unavailable(upstream, format!("failed to parse JSON: {}", e))
        })
    }

    /// Perform a GET request and return the body bytes
    pub async fn get_bytes(&self, url: &str, upstream: &str) -> Result<Vec<u8>, UpstreamError> {
        let response = self.get(url, "application/octet-stream", upstream).await?;
        let bytes = response.bytes().await.map_err(|e| {
            UpstreamError::unavailable(upstream, format!("failed to read body: {}", e))
        })?;
        Ok(bytes.to_vec())
    }
}
