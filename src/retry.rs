use std::collections::BTreeSet;
use std::time::Duration;

use http::{Method, StatusCode};

/// Status codes retried by default.
pub const RETRY_STATUS_CODES: [u16; 8] = [
    408, // Request Timeout
    409, // Conflict
    425, // Too Early
    429, // Too Many Requests
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
];

/// Retries allowed when no layer sets `times`.
pub const DEFAULT_RETRY_TIMES: usize = 1;

/// Retry overrides for one configuration layer. Unset fields fall through
/// to the layer below.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryOptions {
    /// Maximum number of retries after the initial attempt.
    pub times: Option<usize>,
    /// Wait before each retry.
    pub delay: Option<Duration>,
    /// Statuses eligible for retry.
    pub status_codes: Option<BTreeSet<u16>>,
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries. `0` disables retrying.
    pub fn times(mut self, times: usize) -> Self {
        self.times = Some(times);
        self
    }

    /// Sets the wait before each retry. An abort fired during the wait ends
    /// the request.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replaces the set of statuses eligible for retry.
    pub fn status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.status_codes = Some(codes.into_iter().collect());
        self
    }

    /// Overlays `top` on `self`, field by field.
    pub(crate) fn layer(&self, top: &RetryOptions) -> RetryOptions {
        RetryOptions {
            times: top.times.or(self.times),
            delay: top.delay.or(self.delay),
            status_codes: top
                .status_codes
                .clone()
                .or_else(|| self.status_codes.clone()),
        }
    }
}

/// Fully resolved retry policy for one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub times: usize,
    pub delay: Duration,
    pub status_codes: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            times: DEFAULT_RETRY_TIMES,
            delay: Duration::ZERO,
            status_codes: RETRY_STATUS_CODES.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Resolves the call layer over the client layer over the defaults.
    pub(crate) fn resolve(client: &RetryOptions, call: &RetryOptions) -> Self {
        let merged = client.layer(call);
        let defaults = Self::default();
        Self {
            times: merged.times.unwrap_or(defaults.times),
            delay: merged.delay.unwrap_or(defaults.delay),
            status_codes: merged.status_codes.unwrap_or(defaults.status_codes),
        }
    }

    /// Whether a response with `status` to a `method` request may be retried,
    /// ignoring the attempt budget.
    pub fn allows(&self, method: &Method, status: StatusCode) -> bool {
        is_idempotent(method) && self.status_codes.contains(&status.as_u16())
    }
}

/// Any verb outside `POST`, `PUT`, `PATCH` and `DELETE`.
pub fn is_idempotent(method: &Method) -> bool {
    ![Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}
