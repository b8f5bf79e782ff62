//! Network fetch with bounded retry.
//!
//! [`fetch_with_retry`] only talks to the network; storing a successful
//! result in the site cache is the caller's job. Each attempt races a fixed
//! timeout, and failed attempts are separated by a fixed backoff.

use embassy_futures::select::{Either, select};
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};
use thiserror_no_std::Error;

use crate::api::{PayloadError, SitePayload};

/// Error types for fetching site data
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// No network link and reconnecting failed
    #[error("Network not connected")]
    NotConnected,

    /// Transport-level failure (DNS, TCP, read)
    #[error("Network error: {reason}")]
    Network {
        /// Short description from the transport
        reason: &'static str,
    },

    /// Server answered with a non-success status
    #[error("HTTP status {status}")]
    Http {
        /// Status code
        status: u16,
    },

    /// The attempt did not finish in time
    #[error("Request timed out after {ms} ms")]
    Timeout {
        /// Timeout that elapsed
        ms: u32,
    },

    /// Response body could not be decoded
    #[error("Bad payload: {0}")]
    Payload(PayloadError),
}

impl From<PayloadError> for FetchError {
    fn from(err: PayloadError) -> Self {
        Self::Payload(err)
    }
}

/// Source of site data. Implemented over HTTP on the device and by a mock in
/// the simulator.
#[allow(async_fn_in_trait)]
pub trait SiteFetcher {
    /// Bring the network link up if it is down.
    async fn ensure_connected(&mut self) -> Result<(), FetchError>;

    /// Request the newest `count` readings for `site`.
    async fn fetch(&mut self, site: &str, count: u16) -> Result<SitePayload, FetchError>;
}

/// Retry and timeout settings for one site fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one
    pub backoff_ms: u32,
    /// Wall-clock limit for a single attempt
    pub attempt_timeout_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_ms: 1_000,
            attempt_timeout_ms: 10_000,
        }
    }
}

/// Fetch `site`, retrying per `policy`. Returns the last error once every
/// attempt has failed.
pub async fn fetch_with_retry<F, D>(
    fetcher: &mut F,
    delay: &mut D,
    site: &str,
    count: u16,
    policy: RetryPolicy,
) -> Result<SitePayload, FetchError>
where
    F: SiteFetcher,
    D: DelayNs,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match select(
            fetcher.fetch(site, count),
            delay.delay_ms(policy.attempt_timeout_ms),
        )
        .await
        {
            Either::First(result) => result,
            Either::Second(()) => Err(FetchError::Timeout {
                ms: policy.attempt_timeout_ms,
            }),
        };

        match result {
            Ok(payload) => {
                info!(
                    "Fetched {} readings for {} (attempt {})",
                    payload.readings.len(),
                    site,
                    attempt
                );
                return Ok(payload);
            }
            Err(err) if attempt < attempts => {
                warn!(
                    "Fetch attempt {} of {} for {} failed: {}, retrying...",
                    attempt, attempts, site, err
                );
                delay.delay_ms(policy.backoff_ms).await;
                attempt += 1;
            }
            Err(err) => {
                warn!("Fetch for {} failed after {} attempts: {}", site, attempts, err);
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    use crate::storage::{Reading, ReadingSeries};

    struct ScriptedFetcher {
        script: VecDeque<Result<(), FetchError>>,
        hang: bool,
        calls: Vec<(alloc::string::String, u16)>,
    }

    impl ScriptedFetcher {
        fn new(script: impl IntoIterator<Item = Result<(), FetchError>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                hang: false,
                calls: Vec::new(),
            }
        }
    }

    impl SiteFetcher for ScriptedFetcher {
        async fn ensure_connected(&mut self) -> Result<(), FetchError> {
            Ok(())
        }

        async fn fetch(&mut self, site: &str, count: u16) -> Result<SitePayload, FetchError> {
            self.calls.push((site.into(), count));
            if self.hang {
                core::future::pending::<()>().await;
            }
            match self.script.pop_front() {
                Some(Ok(())) | None => Ok(SitePayload {
                    readings: ReadingSeries::from_newest_first([Reading::default()]),
                    ..Default::default()
                }),
                Some(Err(err)) => Err(err),
            }
        }
    }

    #[derive(Default)]
    struct RecordingDelay(Vec<u32>);

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, _ns: u32) {}

        async fn delay_ms(&mut self, ms: u32) {
            self.0.push(ms);
        }
    }

    const NET_DOWN: FetchError = FetchError::Network { reason: "down" };

    #[test]
    fn test_first_attempt_succeeds() {
        let mut fetcher = ScriptedFetcher::new([Ok(())]);
        let mut delay = RecordingDelay::default();

        let result = block_on(fetch_with_retry(
            &mut fetcher,
            &mut delay,
            "Tuna",
            288,
            RetryPolicy::default(),
        ));

        assert!(result.is_ok());
        assert_eq!(fetcher.calls.len(), 1);
        assert_eq!(fetcher.calls[0].0.as_str(), "Tuna");
        assert_eq!(fetcher.calls[0].1, 288);
        assert!(delay.0.is_empty());
    }

    #[test]
    fn test_retry_after_backoff() {
        let mut fetcher = ScriptedFetcher::new([Err(NET_DOWN), Ok(())]);
        let mut delay = RecordingDelay::default();

        let result = block_on(fetch_with_retry(
            &mut fetcher,
            &mut delay,
            "Tuna",
            288,
            RetryPolicy::default(),
        ));

        assert!(result.is_ok());
        assert_eq!(fetcher.calls.len(), 2);
        assert_eq!(delay.0, [1_000]);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut fetcher =
            ScriptedFetcher::new([Err(NET_DOWN), Err(FetchError::Http { status: 503 }), Ok(())]);
        let mut delay = RecordingDelay::default();

        let result = block_on(fetch_with_retry(
            &mut fetcher,
            &mut delay,
            "Tuna",
            288,
            RetryPolicy::default(),
        ));

        assert_eq!(result, Err(FetchError::Http { status: 503 }));
        assert_eq!(fetcher.calls.len(), 2);
        // No backoff after the final attempt
        assert_eq!(delay.0, [1_000]);
    }

    #[test]
    fn test_custom_attempt_count() {
        let mut fetcher = ScriptedFetcher::new([Err(NET_DOWN), Err(NET_DOWN), Ok(())]);
        let mut delay = RecordingDelay::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_ms: 250,
            ..Default::default()
        };

        let result = block_on(fetch_with_retry(&mut fetcher, &mut delay, "Ayee", 12, policy));

        assert!(result.is_ok());
        assert_eq!(delay.0, [250, 250]);
    }

    #[test]
    fn test_hung_attempt_times_out() {
        let mut fetcher = ScriptedFetcher::new([]);
        fetcher.hang = true;
        let mut delay = RecordingDelay::default();

        let result = block_on(fetch_with_retry(
            &mut fetcher,
            &mut delay,
            "Igoo",
            288,
            RetryPolicy::default(),
        ));

        assert_eq!(result, Err(FetchError::Timeout { ms: 10_000 }));
        assert_eq!(fetcher.calls.len(), 2);
        assert_eq!(delay.0, [10_000, 1_000, 10_000]);
    }

    #[test]
    fn test_payload_error_converts() {
        let err: FetchError = PayloadError::UrlTooLong { max: 1 }.into();
        assert!(matches!(err, FetchError::Payload(_)));
    }
}
