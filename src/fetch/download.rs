// src/fetch/download.rs

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use std::{thread::sleep, time::Duration};
use tracing::{debug, error, warn};
use url::Url;

use super::{Session, DOWNLOAD_TIMEOUT};

/// Statuses worth another try: throttling and upstream hiccups.
const RETRYABLE: &[u16] = &[403, 429, 500, 502, 503, 504];

/// Bounded exponential backoff: the wait after attempt `i` is `base_delay * 2^i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    RETRYABLE.contains(&status.as_u16())
}

/// Download `url`, retrying transient statuses per `policy`.
///
/// Returns the body on 200. Any other status that is not retryable, or a
/// retryable one that outlasts the policy, is an error.
pub fn download_with_retry(session: &Session, url: &Url, policy: &RetryPolicy) -> Result<Vec<u8>> {
    let mut last_status = None;

    for attempt in 0..policy.max_attempts {
        let resp = session.get(url, DOWNLOAD_TIMEOUT)?;
        let status = resp.status();

        if status == StatusCode::OK {
            let body = resp
                .bytes()
                .with_context(|| format!("Reading body from {}", url))?;
            debug!(%url, attempt, bytes = body.len(), "downloaded");
            return Ok(body.to_vec());
        }

        if !is_retryable(status) {
            error!(%url, %status, "download failed");
            bail!("GET {} returned {}", url, status);
        }

        let delay = policy.delay_for(attempt);
        warn!(%url, %status, attempt, delay_ms = delay.as_millis() as u64, "Retrying");
        last_status = Some(status);
        sleep(delay);
    }

    error!(%url, status = ?last_status, "Exhausted retries");
    match last_status {
        Some(status) => bail!(
            "GET {} still returned {} after {} attempts",
            url,
            status,
            policy.max_attempts
        ),
        None => bail!("GET {} was never attempted", url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_support::MockHttp;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn default_policy_backs_off_exponentially() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..policy.max_attempts)
            .map(|i| policy.delay_for(i).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32]);
    }

    #[test]
    fn returns_body_on_success() -> Result<()> {
        let http = MockHttp::start();
        http.mount(
            Mock::given(method("GET"))
                .and(path("/file"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec())),
        );

        let session = Session::new("test-agent")?;
        let body = download_with_retry(&session, &http.url("/file"), &fast_policy())?;
        assert_eq!(body, b"abc");
        assert_eq!(http.request_count(), 1);
        Ok(())
    }

    #[test]
    fn retries_transient_statuses_then_succeeds() -> Result<()> {
        let http = MockHttp::start();
        http.mount(
            Mock::given(method("GET"))
                .and(path("/file"))
                .respond_with(ResponseTemplate::new(503))
                .up_to_n_times(2),
        );
        http.mount(
            Mock::given(method("GET"))
                .and(path("/file"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"late".to_vec())),
        );

        let session = Session::new("test-agent")?;
        let body = download_with_retry(&session, &http.url("/file"), &fast_policy())?;
        assert_eq!(body, b"late");
        assert_eq!(http.request_count(), 3);
        Ok(())
    }

    #[test]
    fn every_retryable_status_is_retried() -> Result<()> {
        let session = Session::new("test-agent")?;
        for &code in RETRYABLE {
            let http = MockHttp::start();
            http.mount(
                Mock::given(method("GET"))
                    .and(path("/file"))
                    .respond_with(ResponseTemplate::new(code))
                    .up_to_n_times(1),
            );
            http.mount(
                Mock::given(method("GET"))
                    .and(path("/file"))
                    .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec())),
            );

            let body = download_with_retry(&session, &http.url("/file"), &fast_policy())
                .with_context(|| format!("status {} should be retried", code))?;
            assert_eq!(body, b"ok", "status {}", code);
            assert_eq!(http.request_count(), 2, "status {}", code);
        }
        Ok(())
    }

    #[test]
    fn not_implemented_is_not_retried() -> Result<()> {
        let http = MockHttp::start();
        http.mount(
            Mock::given(method("GET"))
                .and(path("/file"))
                .respond_with(ResponseTemplate::new(501)),
        );

        let session = Session::new("test-agent")?;
        let err = download_with_retry(&session, &http.url("/file"), &fast_policy())
            .expect_err("501 is permanent");
        assert!(err.to_string().contains("501"));
        assert_eq!(http.request_count(), 1);
        Ok(())
    }

    #[test]
    fn gives_up_after_max_attempts() -> Result<()> {
        let http = MockHttp::start();
        http.mount(
            Mock::given(method("GET"))
                .and(path("/file"))
                .respond_with(ResponseTemplate::new(429)),
        );

        let session = Session::new("test-agent")?;
        let err = download_with_retry(&session, &http.url("/file"), &fast_policy())
            .expect_err("should exhaust retries");
        assert!(err.to_string().contains("429"));
        assert_eq!(http.request_count(), 6);
        Ok(())
    }

    #[test]
    fn permanent_status_fails_without_retry() -> Result<()> {
        let http = MockHttp::start();
        http.mount(
            Mock::given(method("GET"))
                .and(path("/file"))
                .respond_with(ResponseTemplate::new(404)),
        );

        let session = Session::new("test-agent")?;
        assert!(download_with_retry(&session, &http.url("/file"), &fast_policy()).is_err());
        assert_eq!(http.request_count(), 1);
        Ok(())
    }
}
