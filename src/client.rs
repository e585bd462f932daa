use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::EnaError;

pub const ENA_SEARCH_URL: &str = "https://www.ebi.ac.uk/ena/portal/api/search";

const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Bounded retry with exponential backoff for transient portal failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub backoff_factor: Duration,
    pub retry_statuses: Vec<u16>,
    /// Applied to each attempt, not to the whole retry sequence.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_millis(500),
            retry_statuses: vec![429, 500, 502, 503, 504],
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay before the `retry`-th retry (1-based): `factor * 2^(retry - 1)`.
    pub fn backoff(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(31) as u32;
        self.backoff_factor
            .checked_mul(1u32 << exponent)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

/// Reusable session for the ENA portal search endpoint.
#[derive(Clone)]
pub struct EnaHttpClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl EnaHttpClient {
    pub fn new() -> Result<Self, EnaError> {
        Self::with_policy(ENA_SEARCH_URL, RetryPolicy::default())
    }

    pub fn with_policy(
        base_url: impl Into<String>,
        policy: RetryPolicy,
    ) -> Result<Self, EnaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("enatrieve-tx/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| EnaError::EnaHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(policy.timeout)
            .build()
            .map_err(|err| EnaError::EnaHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POSTs a form-encoded body. The search query is read-only, so repeating the POST is safe.
    pub fn post_form(
        &self,
        pairs: &[(&'static str, String)],
        sink: &dyn ProgressSink,
    ) -> Result<Response, EnaError> {
        self.send_with_retries(|| self.client.post(&self.base_url).form(pairs), sink)
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
        sink: &dyn ProgressSink,
    ) -> Result<Response, EnaError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut retries = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if retries < self.policy.max_retries
                        && self.policy.is_retryable_status(status)
                    {
                        retries += 1;
                        let delay =
                            retry_after(&resp).unwrap_or_else(|| self.policy.backoff(retries));
                        sink.event(ProgressEvent::warn(format!(
                            "ENA returned status {status}; retry {retries}/{} in {delay:?}",
                            self.policy.max_retries
                        )));
                        drop(resp);
                        thread::sleep(delay);
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if retries < self.policy.max_retries && is_retryable_error(&err) {
                        retries += 1;
                        let delay = self.policy.backoff(retries);
                        sink.event(ProgressEvent::warn(format!(
                            "connection to ENA failed ({err}); retry {retries}/{} in {delay:?}",
                            self.policy.max_retries
                        )));
                        thread::sleep(delay);
                        continue;
                    }
                    return Err(EnaError::EnaHttp(err.to_string()));
                }
            }
        }
    }
}

fn retry_after(resp: &Response) -> Option<Duration> {
    if !matches!(resp.status().as_u16(), 429 | 503) {
        return None;
    }
    resp.headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_BACKOFF))
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() && !err.is_timeout()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_factor() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=5).map(|retry| policy.backoff(retry)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(40), MAX_BACKOFF);
    }

    #[test]
    fn default_client_targets_portal() {
        let client = EnaHttpClient::new().unwrap();
        assert_eq!(client.base_url(), ENA_SEARCH_URL);
        assert_eq!(client.policy().max_retries, 5);
        assert_eq!(client.policy().timeout, Duration::from_secs(30));
    }

    #[test]
    fn default_retry_set() {
        let policy = RetryPolicy::default();
        for status in [429, 500, 502, 503, 504] {
            assert!(policy.is_retryable_status(status));
        }
        for status in [400, 404, 501] {
            assert!(!policy.is_retryable_status(status));
        }
    }
}
