//! Lifecycle hooks.
//!
//! Every kind holds an ordered list of subscribers. When a request is
//! resolved, client subscribers are followed by call subscribers and all of
//! them fire, in that order, for each lifecycle event.

use std::fmt;
use std::sync::Arc;

use crate::{CallOptions, HttpError, ParseError, Request, RequestError, Response};

pub type BeforeRequestHook = Arc<dyn Fn(&mut CallOptions) + Send + Sync>;
pub type AfterResponseHook = Arc<dyn Fn(&Request, &Response, &CallOptions) + Send + Sync>;
pub type RequestErrorHook = Arc<dyn Fn(&RequestError, &Request, &CallOptions) + Send + Sync>;
pub type ResponseErrorHook =
    Arc<dyn Fn(&HttpError, &Response, &Request, &CallOptions) + Send + Sync>;
pub type ResponseParseErrorHook =
    Arc<dyn Fn(&ParseError, &Response, &Request, &CallOptions) + Send + Sync>;
/// Receives the 1-based number of the retry about to be made.
pub type RequestRetryHook = Arc<dyn Fn(usize, &Response, &Request, &CallOptions) + Send + Sync>;

/// Subscribers for the six lifecycle events.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_request: Vec<BeforeRequestHook>,
    pub after_response: Vec<AfterResponseHook>,
    pub on_request_error: Vec<RequestErrorHook>,
    pub on_response_error: Vec<ResponseErrorHook>,
    pub on_response_parse_error: Vec<ResponseParseErrorHook>,
    pub on_request_retry: Vec<RequestRetryHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_request", &self.before_request.len())
            .field("after_response", &self.after_response.len())
            .field("on_request_error", &self.on_request_error.len())
            .field("on_response_error", &self.on_response_error.len())
            .field("on_response_parse_error", &self.on_response_parse_error.len())
            .field("on_request_retry", &self.on_request_retry.len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs before every attempt, before the request is resolved. May
    /// mutate the call options.
    pub fn before_request(mut self, hook: impl Fn(&mut CallOptions) + Send + Sync + 'static) -> Self {
        self.before_request.push(Arc::new(hook));
        self
    }

    /// Runs for every response the transport returns, success or not.
    pub fn after_response(
        mut self,
        hook: impl Fn(&Request, &Response, &CallOptions) + Send + Sync + 'static,
    ) -> Self {
        self.after_response.push(Arc::new(hook));
        self
    }

    /// Runs when the exchange fails before a response arrives, including
    /// aborts and timeouts.
    pub fn on_request_error(
        mut self,
        hook: impl Fn(&RequestError, &Request, &CallOptions) + Send + Sync + 'static,
    ) -> Self {
        self.on_request_error.push(Arc::new(hook));
        self
    }

    /// Runs when a non-2xx response is final, after retries are spent.
    pub fn on_response_error(
        mut self,
        hook: impl Fn(&HttpError, &Response, &Request, &CallOptions) + Send + Sync + 'static,
    ) -> Self {
        self.on_response_error.push(Arc::new(hook));
        self
    }

    /// Runs when a 2xx response body fails to decode.
    pub fn on_response_parse_error(
        mut self,
        hook: impl Fn(&ParseError, &Response, &Request, &CallOptions) + Send + Sync + 'static,
    ) -> Self {
        self.on_response_parse_error.push(Arc::new(hook));
        self
    }

    /// Runs before each retry with the 1-based retry number.
    pub fn on_request_retry(
        mut self,
        hook: impl Fn(usize, &Response, &Request, &CallOptions) + Send + Sync + 'static,
    ) -> Self {
        self.on_request_retry.push(Arc::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.before_request.is_empty()
            && self.after_response.is_empty()
            && self.on_request_error.is_empty()
            && self.on_response_error.is_empty()
            && self.on_response_parse_error.is_empty()
            && self.on_request_retry.is_empty()
    }

    /// Subscribers of `self` followed by subscribers of `next`.
    pub(crate) fn chain(&self, next: &Hooks) -> Hooks {
        fn joined<T: Clone>(first: &[T], second: &[T]) -> Vec<T> {
            first.iter().chain(second).cloned().collect()
        }

        Hooks {
            before_request: joined(&self.before_request, &next.before_request),
            after_response: joined(&self.after_response, &next.after_response),
            on_request_error: joined(&self.on_request_error, &next.on_request_error),
            on_response_error: joined(&self.on_response_error, &next.on_response_error),
            on_response_parse_error: joined(
                &self.on_response_parse_error,
                &next.on_response_parse_error,
            ),
            on_request_retry: joined(&self.on_request_retry, &next.on_request_retry),
        }
    }

    pub(crate) fn dispatch_after_response(
        &self,
        request: &Request,
        response: &Response,
        options: &CallOptions,
    ) {
        for hook in &self.after_response {
            hook(request, response, options);
        }
    }

    pub(crate) fn dispatch_request_error(
        &self,
        error: &RequestError,
        request: &Request,
        options: &CallOptions,
    ) {
        for hook in &self.on_request_error {
            hook(error, request, options);
        }
    }

    pub(crate) fn dispatch_response_error(
        &self,
        error: &HttpError,
        response: &Response,
        request: &Request,
        options: &CallOptions,
    ) {
        for hook in &self.on_response_error {
            hook(error, response, request, options);
        }
    }

    pub(crate) fn dispatch_response_parse_error(
        &self,
        error: &ParseError,
        response: &Response,
        request: &Request,
        options: &CallOptions,
    ) {
        for hook in &self.on_response_parse_error {
            hook(error, response, request, options);
        }
    }

    pub(crate) fn dispatch_request_retry(
        &self,
        retry: usize,
        response: &Response,
        request: &Request,
        options: &CallOptions,
    ) {
        for hook in &self.on_request_retry {
            hook(retry, response, request, options);
        }
    }
}

/// Runs client then call `before_request` subscribers against the mutable
/// call options.
///
/// The call subscribers are captured before the first one runs, so a hook
/// that rewrites `options.hooks` takes effect on the next attempt.
pub(crate) fn dispatch_before_request(client: &Hooks, options: &mut CallOptions) {
    let call = options.hooks.before_request.clone();
    for hook in client.before_request.iter().chain(&call) {
        hook(&mut *options);
    }
}
