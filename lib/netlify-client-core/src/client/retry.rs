use std::time::{Duration, SystemTime, UNIX_EPOCH};

use backon::{ConstantBuilder, Retryable};
use http::{HeaderMap, StatusCode};
use tracing::warn;

use super::request::ResolvedRequest;
use super::transport::{RawResponse, Transport, TransportFailure};

/// Default number of retries after the first attempt.
pub const MAX_RETRY: usize = 3;

const DEFAULT_DELAY: Duration = Duration::from_secs(1);
const MIN_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(60);

const RETRY_AFTER: &str = "retry-after";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// How transient failures are retried.
///
/// A call is attempted at most `max_retries + 1` times. Only transient transport
/// failures (see [`TransportFailure::is_retryable`]) and responses with a status in the
/// retryable set are retried.
///
/// # Default values
///
/// - `max_retries`: [`MAX_RETRY`] (3)
/// - `default_delay`: 1 s, used when the response carries no hint
/// - `min_delay`: 1 s, floor for a delay computed from `X-RateLimit-Reset`
/// - `max_delay`: 60 s, cap for every delay
/// - retryable statuses: 429, 502, 503, 504
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: usize,
    default_delay: Duration,
    min_delay: Duration,
    max_delay: Duration,
    retryable_statuses: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRY,
            default_delay: DEFAULT_DELAY,
            min_delay: MIN_DELAY,
            max_delay: MAX_DELAY,
            retryable_statuses: vec![
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay used when the response gives no hint.
    #[must_use]
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Sets the floor applied to delays computed from `X-RateLimit-Reset`.
    #[must_use]
    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Sets the cap applied to every delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Replaces the set of retryable statuses.
    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Number of retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Returns `true` if a response with this status should be retried.
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Delay before the next attempt, derived from the response headers.
    ///
    /// `Retry-After` (seconds) wins over `X-RateLimit-Reset` (epoch seconds).
    pub fn delay_for(&self, headers: &HeaderMap, now: SystemTime) -> Duration {
        let delay = if let Some(seconds) = header_u64(headers, RETRY_AFTER) {
            Duration::from_secs(seconds)
        } else if let Some(reset) = header_u64(headers, RATE_LIMIT_RESET) {
            let reset = UNIX_EPOCH + Duration::from_secs(reset);
            reset
                .duration_since(now)
                .unwrap_or_default()
                .max(self.min_delay)
        } else {
            self.default_delay
        };
        delay.min(self.max_delay)
    }

    /// Sends the request through the transport, retrying transient outcomes.
    ///
    /// Returns the last response once it is terminal or retries are exhausted,
    /// so a persistent 503 comes back as a response, not as a failure.
    pub(in crate::client) async fn send(
        &self,
        transport: &dyn Transport,
        request: &ResolvedRequest,
    ) -> Result<RawResponse, TransportFailure> {
        let attempt = move || async move {
            let response = transport
                .send(request.clone())
                .await
                .map_err(Transient::Failure)?;
            if self.is_retryable_status(response.status) {
                return Err(Transient::Status(response));
            }
            Ok(response)
        };

        let backoff = ConstantBuilder::default()
            .with_delay(self.default_delay)
            .with_max_times(self.max_retries);

        let mut retries = 0_usize;
        let result = attempt
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(Transient::is_retryable)
            .adjust(|outcome, delay| delay.map(|_| self.next_delay(outcome)))
            .notify(|outcome, delay| {
                retries += 1;
                warn!(
                    method = %request.method,
                    url = %request.url,
                    retry = retries,
                    max_retries = self.max_retries,
                    ?delay,
                    reason = %outcome,
                    "retrying request"
                );
            })
            .await;

        match result {
            Ok(response) | Err(Transient::Status(response)) => Ok(response),
            Err(Transient::Failure(failure)) => Err(failure),
        }
    }

    fn next_delay(&self, outcome: &Transient) -> Duration {
        match outcome {
            Transient::Status(response) => self.delay_for(&response.headers, SystemTime::now()),
            Transient::Failure(_) => self.default_delay.min(self.max_delay),
        }
    }
}

/// An attempt outcome that may deserve a retry.
#[derive(Debug, derive_more::Display)]
enum Transient {
    #[display("status {}", _0.status)]
    Status(RawResponse),
    #[display("{_0}")]
    Failure(TransportFailure),
}

impl Transient {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status(_) => true,
            Self::Failure(failure) => failure.is_retryable(),
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
