//! OpenWeather One Call API client
//!
//! Transport failures and 5xx responses are retried with exponential
//! backoff; 4xx responses are returned immediately. The API key is only
//! ever placed in the request URL. Every string that leaves this module
//! (error messages, body snippets, URLs for logs) is built redacted.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::GeoQuery;

use super::{OneCallProvider, UpstreamError, UpstreamSuccess, REDACTED};
use crate::clock::Sleeper;
use crate::config::UpstreamConfig;

/// Longest body excerpt carried in an error
const SNIPPET_LIMIT: usize = 500;

const ONE_CALL_PATH: &str = "/data/3.0/onecall";

/// OpenWeather API client
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    retries: u32,
    backoff_base: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl OpenWeatherClient {
    /// Create a new client with per-attempt connect and total timeouts
    pub fn new(config: &UpstreamConfig, sleeper: Arc<dyn Sleeper>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retries: config.retries,
            backoff_base: config.backoff_base(),
            sleeper,
        })
    }

    /// Build the One Call URL carrying `credential` as `appid`
    fn build_url(&self, query: &GeoQuery, credential: &str) -> Result<Url, url::ParseError> {
        let mut params = vec![
            ("lat", query.lat.to_string()),
            ("lon", query.lon.to_string()),
            ("units", query.units.as_str().to_string()),
            ("lang", query.lang.clone()),
            ("appid", credential.to_string()),
        ];

        let exclude = query.exclude_csv();
        if !exclude.is_empty() {
            params.push(("exclude", exclude));
        }

        Url::parse_with_params(&format!("{}{}", self.base_url, ONE_CALL_PATH), &params)
    }

    /// Replace the API key, raw or URL-encoded, with the redaction marker.
    ///
    /// Every occurrence is replaced regardless of key length. A very short
    /// key therefore also masks unrelated matches in diagnostic text; that
    /// is accepted so the credential never reaches a response or a log.
    pub fn redact(&self, text: &str) -> String {
        if self.api_key.is_empty() {
            return text.to_string();
        }

        let encoded: String = url::form_urlencoded::byte_serialize(self.api_key.as_bytes()).collect();
        let redacted = text.replace(&self.api_key, REDACTED);
        if encoded == self.api_key {
            redacted
        } else {
            redacted.replace(&encoded, REDACTED)
        }
    }

    /// Exponential backoff: base, 2 * base, 4 * base, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base.saturating_mul(factor)
    }

    async fn attempt(&self, url: &Url) -> Result<(u16, String), reqwest::Error> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    fn decode(&self, body: &str, upstream_ms: u64) -> Result<UpstreamSuccess, UpstreamError> {
        match serde_json::from_str::<Value>(body) {
            Ok(payload) if payload.is_object() => Ok(UpstreamSuccess {
                payload,
                upstream_ms,
            }),
            _ => Err(UpstreamError::InvalidPayload {
                message: "Upstream response is not a JSON object".to_string(),
                body_snippet: self.snippet(body),
                upstream_ms,
            }),
        }
    }

    fn status_error(&self, status: u16, body: &str, upstream_ms: u64) -> UpstreamError {
        let message = self.redact(&extract_error_message(body, status));
        let body_snippet = self.snippet(body);

        if status >= 500 {
            UpstreamError::ServerError {
                status,
                message,
                body_snippet,
                upstream_ms,
            }
        } else {
            UpstreamError::ClientError {
                status,
                message,
                body_snippet,
                upstream_ms,
            }
        }
    }

    /// Redacted, trimmed body truncated to [`SNIPPET_LIMIT`] bytes
    fn snippet(&self, body: &str) -> String {
        let redacted = self.redact(body.trim());
        if redacted.len() <= SNIPPET_LIMIT {
            return redacted;
        }

        let mut end = SNIPPET_LIMIT;
        while !redacted.is_char_boundary(end) {
            end -= 1;
        }
        redacted[..end].to_string()
    }
}

/// `message` of a JSON error body, else a generic status line
fn extract_error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("Upstream returned HTTP {}", status))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl OneCallProvider for OpenWeatherClient {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn sanitized_url(&self, query: &GeoQuery) -> String {
        match self.build_url(query, REDACTED) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base_url, ONE_CALL_PATH),
        }
    }

    async fn fetch_one_call(&self, query: &GeoQuery) -> Result<UpstreamSuccess, UpstreamError> {
        let url = self.build_url(query, &self.api_key).map_err(|e| UpstreamError::Transport {
            message: self.redact(&format!("Invalid upstream URL: {}", e)),
        })?;
        let sanitized_url = self.sanitized_url(query);

        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            let outcome = self.attempt(&url).await;
            let upstream_ms = elapsed_ms(started);
            let can_retry = attempt < self.retries;

            match outcome {
                Err(error) => {
                    let message = self.redact(&error.without_url().to_string());
                    if can_retry {
                        tracing::warn!(
                            attempt,
                            upstream_url = %sanitized_url,
                            error = %message,
                            "Upstream transport error, retrying"
                        );
                        self.sleeper.sleep(self.backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(UpstreamError::Transport { message });
                }
                Ok((status, body)) if (200..300).contains(&status) => {
                    tracing::debug!(upstream_url = %sanitized_url, upstream_ms, "Upstream call succeeded");
                    return self.decode(&body, upstream_ms);
                }
                Ok((status, body)) => {
                    if status >= 500 && can_retry {
                        tracing::warn!(
                            attempt,
                            status,
                            upstream_url = %sanitized_url,
                            "Upstream server error, retrying"
                        );
                        self.sleeper.sleep(self.backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(self.status_error(status, &body, upstream_ms));
                }
            }
        }
    }
}
