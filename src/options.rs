use std::fmt;
use std::time::Duration;

use http::{header, Extensions, Method};

use crate::{AbortSignal, Body, Hooks, Query, QueryValue, ResponseType, RetryOptions};

/// Ordered `(name, value)` header list. Later entries win when merged.
pub type HeaderList = Vec<(String, String)>;

/// Client defaults, layered by [`Client::extend`](crate::Client::extend).
#[derive(Clone, Default)]
pub struct ClientOptions {
    pub base_url: Option<String>,
    pub headers: HeaderList,
    pub query: Query,
    pub retry: RetryOptions,
    pub timeout: Option<Duration>,
    pub signal: Option<AbortSignal>,
    pub hooks: Hooks,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("headers", &RedactedHeaders(&self.headers))
            .field("query", &self.query)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("signal", &self.signal)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl ClientOptions {
    /// Creates an empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads client defaults from environment variables.
    ///
    /// Reads (all optional):
    /// - `BFETCH_BASE_URL`: base URL for relative paths
    /// - `BFETCH_TIMEOUT_MS`: per-attempt timeout in milliseconds
    /// - `BFETCH_RETRY`: maximum number of retries
    /// - `BFETCH_RETRY_DELAY_MS`: wait between retries in milliseconds
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, String> {
        let mut options = Self::default();

        if let Some(base_url) = read_env("BFETCH_BASE_URL") {
            options.base_url = Some(base_url);
        }
        if let Some(timeout) = read_env_number("BFETCH_TIMEOUT_MS")? {
            options.timeout = Some(Duration::from_millis(timeout));
        }
        if let Some(times) = read_env_number("BFETCH_RETRY")? {
            options.retry.times = Some(times as usize);
        }
        if let Some(delay) = read_env_number("BFETCH_RETRY_DELAY_MS")? {
            options.retry.delay = Some(Duration::from_millis(delay));
        }

        Ok(options)
    }

    /// Sets the base URL that relative paths are joined onto.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Adds a header. A later entry with the same name wins.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query entry. See [`QueryValue`] for set, append and delete
    /// semantics.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(key, value);
        self
    }

    /// Sets retry overrides. Unset fields fall through to the layer below.
    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets an abort signal. It is combined with any signal from the other
    /// layer, and the first to fire cancels the request.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Sets the lifecycle subscribers of this layer. They fire after the
    /// subscribers of the layers below.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Overlays `child` on `self`.
    ///
    /// Scalars in `child` replace those of `self`; headers, query entries
    /// and hook subscribers are appended after those of `self`.
    pub(crate) fn layer(&self, child: ClientOptions) -> ClientOptions {
        let mut headers = self.headers.clone();
        headers.extend(child.headers);
        let mut query = self.query.clone();
        query.extend(&child.query);

        ClientOptions {
            base_url: child.base_url.or_else(|| self.base_url.clone()),
            headers,
            query,
            retry: self.retry.layer(&child.retry),
            timeout: child.timeout.or(self.timeout),
            signal: child.signal.or_else(|| self.signal.clone()),
            hooks: self.hooks.chain(&child.hooks),
        }
    }
}

/// Per-invocation overrides.
///
/// `before_request` hooks receive this struct mutably before each attempt
/// is resolved.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Defaults to `GET`.
    pub method: Option<Method>,
    pub query: Query,
    pub headers: HeaderList,
    pub data: Option<Body>,
    /// Skips content-type detection when set.
    pub response_type: Option<ResponseType>,
    pub timeout: Option<Duration>,
    pub signal: Option<AbortSignal>,
    pub retry: RetryOptions,
    pub hooks: Hooks,
    /// Passed through to the transport untouched.
    pub extensions: Extensions,
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("method", &self.method)
            .field("query", &self.query)
            .field("headers", &RedactedHeaders(&self.headers))
            .field("data", &self.data)
            .field("response_type", &self.response_type)
            .field("timeout", &self.timeout)
            .field("signal", &self.signal)
            .field("retry", &self.retry)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl CallOptions {
    /// Creates call options with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the method. Defaults to `GET`.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a query entry. See [`QueryValue`] for set, append and delete
    /// semantics.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(key, value);
        self
    }

    /// Adds a header. A later entry with the same name wins.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request body. Its kind decides the `Content-Type`.
    pub fn data(mut self, data: impl Into<Body>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Forces the decoding of the response body instead of detecting it
    /// from `Content-Type`.
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets an abort signal. It is combined with any signal from the other
    /// layer, and the first to fire cancels the request.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Sets retry overrides. Unset fields fall through to the layer below.
    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the lifecycle subscribers of this layer. They fire after the
    /// subscribers of the layers below.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Stores a transport-native option, e.g. an [`http::Version`].
    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }
}

struct RedactedHeaders<'a>(&'a [(String, String)]);

impl fmt::Debug for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(name, value)| {
                if name.eq_ignore_ascii_case(header::AUTHORIZATION.as_str()) {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            }))
            .finish()
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn read_env_number(name: &str) -> Result<Option<u64>, String> {
    read_env(name)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|err| format!("{name} must be a non-negative integer: {err}"))
        })
        .transpose()
}
