//! `bfetch` is a layered async HTTP client.
//!
//! A [`Client`] bundles defaults (base URL, headers, query, retry policy,
//! timeout, abort signal, hooks). [`Client::extend`] layers more defaults on
//! top, and [`Client::fetch`] merges them with per-call [`CallOptions`]:
//!
//! - request bodies are encoded by kind ([`Body`]) and tagged with a
//!   matching `Content-Type`
//! - non-2xx responses to idempotent methods are retried on transient
//!   statuses
//! - response bodies are decoded by declared or detected [`ResponseType`]
//! - lifecycle [`Hooks`] fire at each stage, client subscribers first
//!
//! Failures are one of three kinds, see [`FetchError`].

mod body;
mod client;
mod decode;
mod error;
mod hooks;
mod merge;
mod options;
mod query;
mod retry;
mod signal;
mod transport;
mod types;

pub use body::{Body, FilePart, FormData, FormParams, FormValue, RequestBody};
pub use client::Client;
pub use decode::{detect_response_type, ResponseType};
pub use error::{
    BoxError, DecodeError, FetchError, HttpError, ParseError, RequestError, TransportError,
};
pub use hooks::{
    AfterResponseHook, BeforeRequestHook, Hooks, RequestErrorHook, RequestRetryHook,
    ResponseErrorHook, ResponseParseErrorHook,
};
pub use merge::{encode_query, merge_query, merge_url, normalize_method, DEFAULT_ACCEPT};
pub use options::{CallOptions, ClientOptions, HeaderList};
pub use query::{Query, QueryValue};
pub use retry::{is_idempotent, RetryOptions, RetryPolicy, DEFAULT_RETRY_TIMES, RETRY_STATUS_CODES};
pub use signal::AbortSignal;
pub use transport::{ReqwestTransport, Request, Response, Transport};
pub use types::{Blob, FetchResponse, Input, ResponseData};

pub use http::{Method, StatusCode, Version};
pub use url::Url;

pub type Result<T> = std::result::Result<T, FetchError>;
