use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::{
    decode::{decode_response, detect_response_type},
    hooks::dispatch_before_request,
    merge::{resolve, ResolvedRequest},
    signal::{any_aborted, expire},
    Body, CallOptions, ClientOptions, FetchResponse, HttpError, Input, ParseError, ReqwestTransport,
    RequestError, Response, Result, Transport, TransportError,
};

/// Immutable bundle of request defaults plus the transport that performs
/// the exchanges.
///
/// Cloning is cheap; clones share configuration and transport.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    defaults: Arc<ClientOptions>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.defaults)
            .field("transport", &"<transport>")
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Attempt state. Terminal outcomes return from the loop directly.
enum State {
    Build,
    Send(Box<ResolvedRequest>),
    Decode(Box<ResolvedRequest>, Response),
}

impl Client {
    /// Creates a client with no defaults backed by [`ReqwestTransport`].
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Creates a client with no defaults backed by `transport`.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            defaults: Arc::new(ClientOptions::default()),
        }
    }

    /// Creates a client from `BFETCH_*` environment variables.
    ///
    /// See [`ClientOptions::from_env`].
    pub fn from_env() -> std::result::Result<Self, String> {
        Ok(Self::new().extend(ClientOptions::from_env()?))
    }

    /// Returns a new client whose defaults are `options` layered on top of
    /// this client's defaults. `self` is left untouched.
    pub fn extend(&self, options: ClientOptions) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            defaults: Arc::new(self.defaults.layer(options)),
        }
    }

    /// Returns the layered defaults every call starts from.
    pub fn defaults(&self) -> &ClientOptions {
        &self.defaults
    }

    /// Sends a `GET` request with no call overrides.
    pub async fn get(&self, input: impl Into<Input>) -> Result<FetchResponse> {
        self.fetch(input, CallOptions::new()).await
    }

    /// Sends a `HEAD` request.
    pub async fn head(&self, input: impl Into<Input>) -> Result<FetchResponse> {
        self.fetch(input, CallOptions::new().method(Method::HEAD))
            .await
    }

    /// Sends a `DELETE` request. `DELETE` is never retried.
    pub async fn delete(&self, input: impl Into<Input>) -> Result<FetchResponse> {
        self.fetch(input, CallOptions::new().method(Method::DELETE))
            .await
    }

    /// Sends a `POST` request with `data` as the body.
    pub async fn post(&self, input: impl Into<Input>, data: impl Into<Body>) -> Result<FetchResponse> {
        self.fetch(input, CallOptions::new().method(Method::POST).data(data))
            .await
    }

    /// Sends a `PUT` request with `data` as the body.
    pub async fn put(&self, input: impl Into<Input>, data: impl Into<Body>) -> Result<FetchResponse> {
        self.fetch(input, CallOptions::new().method(Method::PUT).data(data))
            .await
    }

    /// Sends a `PATCH` request with `data` as the body.
    pub async fn patch(&self, input: impl Into<Input>, data: impl Into<Body>) -> Result<FetchResponse> {
        self.fetch(input, CallOptions::new().method(Method::PATCH).data(data))
            .await
    }

    /// Performs a request.
    ///
    /// Every attempt runs the `before_request` hooks and re-resolves the
    /// request from the (possibly mutated) call options. Non-2xx responses
    /// to idempotent methods are retried while the status is retryable and
    /// the retry budget captured from the first attempt is not spent.
    /// Transport and decode failures are never retried.
    pub async fn fetch(
        &self,
        input: impl Into<Input>,
        options: CallOptions,
    ) -> Result<FetchResponse> {
        let input = input.into();
        let mut options = options;
        let mut budget: Option<usize> = None;
        let mut retries = 0usize;
        let mut state = State::Build;

        loop {
            state = match state {
                State::Build => {
                    dispatch_before_request(&self.defaults.hooks, &mut options);
                    let resolved = resolve(&self.defaults, &input, &options);
                    budget.get_or_insert(resolved.retry.times);
                    State::Send(Box::new(resolved))
                }
                State::Send(mut resolved) => {
                    let response = match self.send_attempt(&mut resolved).await {
                        Ok(response) => response,
                        Err(source) => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(
                                method = %resolved.request.method,
                                url = %resolved.request.url,
                                error = %source,
                                "request failed before a response was received"
                            );

                            let error = RequestError {
                                source,
                                request: resolved.request.clone(),
                            };
                            resolved
                                .hooks
                                .dispatch_request_error(&error, &resolved.request, &options);
                            return Err(error.into());
                        }
                    };

                    resolved
                        .hooks
                        .dispatch_after_response(&resolved.request, &response, &options);

                    if response.is_success() {
                        State::Decode(resolved, response)
                    } else if retries < budget.unwrap_or_default()
                        && resolved
                            .retry
                            .allows(&resolved.request.method, response.status)
                    {
                        retries += 1;

                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            status = response.status.as_u16(),
                            retry = retries,
                            delay_ms = resolved.retry.delay.as_millis() as u64,
                            "retrying request"
                        );

                        resolved.hooks.dispatch_request_retry(
                            retries,
                            &response,
                            &resolved.request,
                            &options,
                        );
                        if !resolved.retry.delay.is_zero() {
                            let aborted = tokio::select! {
                                biased;
                                _ = any_aborted(&resolved.signals) => true,
                                _ = tokio::time::sleep(resolved.retry.delay) => false,
                            };
                            if aborted {
                                #[cfg(feature = "tracing")]
                                tracing::debug!(
                                    url = %resolved.request.url,
                                    "request aborted while waiting to retry"
                                );

                                let error = RequestError {
                                    source: TransportError::Aborted,
                                    request: resolved.request.clone(),
                                };
                                resolved.hooks.dispatch_request_error(
                                    &error,
                                    &resolved.request,
                                    &options,
                                );
                                return Err(error.into());
                            }
                        }
                        State::Build
                    } else {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            status = response.status.as_u16(),
                            url = %resolved.request.url,
                            "request failed with non-success status"
                        );

                        let error = HttpError {
                            status: response.status,
                            status_text: response.status_text.clone(),
                            response,
                            request: resolved.request.clone(),
                        };
                        resolved.hooks.dispatch_response_error(
                            &error,
                            &error.response,
                            &resolved.request,
                            &options,
                        );
                        return Err(error.into());
                    }
                }
                State::Decode(resolved, response) => {
                    let response_type = resolved.response_type.unwrap_or_else(|| {
                        detect_response_type(response.content_type().unwrap_or_default())
                    });

                    return match decode_response(&response, response_type) {
                        Ok(data) => Ok(FetchResponse {
                            status: response.status,
                            status_text: response.status_text,
                            headers: response.headers,
                            data,
                        }),
                        Err(source) => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(
                                url = %resolved.request.url,
                                ?response_type,
                                error = %source,
                                "failed to decode response body"
                            );

                            let error = ParseError {
                                source,
                                response,
                                request: resolved.request.clone(),
                            };
                            resolved.hooks.dispatch_response_parse_error(
                                &error,
                                &error.response,
                                &resolved.request,
                                &options,
                            );
                            Err(error.into())
                        }
                    };
                }
            };
        }
    }

    /// Runs one exchange raced against the composed abort signals and the
    /// attempt timeout. The timer is dropped with the race, whichever side
    /// settles first.
    async fn send_attempt(
        &self,
        resolved: &mut ResolvedRequest,
    ) -> std::result::Result<Response, TransportError> {
        if let Some(err) = resolved.invalid.take() {
            return Err(err);
        }
        if resolved.signals.iter().any(|signal| signal.is_aborted()) {
            return Err(TransportError::Aborted);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %resolved.request.method,
            url = %resolved.request.url,
            "sending request"
        );

        tokio::select! {
            biased;
            _ = any_aborted(&resolved.signals) => Err(TransportError::Aborted),
            elapsed = expire(resolved.timeout) => Err(TransportError::Timeout(elapsed)),
            response = self.transport.send(&resolved.request) => response,
        }
    }
}
