use std::time::Duration;

use http::StatusCode;

use crate::{Request, Response};

/// Boxed error used as the cause of transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised while performing a single exchange with the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be built (invalid header, URL or multipart part).
    #[error("invalid request: {0}")]
    Builder(#[source] BoxError),
    /// Network, DNS or connection error, or a failure while reading the body.
    #[error("network error: {0}")]
    Network(#[source] BoxError),
    /// One of the abort signals fired while the request was in flight.
    #[error("request aborted")]
    Aborted,
    /// The configured timeout elapsed before the exchange completed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// The request could not be built, e.g. an invalid header.
    pub fn builder(err: impl Into<BoxError>) -> Self {
        Self::Builder(err.into())
    }

    /// The exchange failed on the wire.
    pub fn network(err: impl Into<BoxError>) -> Self {
        Self::Network(err.into())
    }

    /// Returns `true` for cancellations, including timeouts.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted | Self::Timeout(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Transport failure: the exchange never completed.
#[derive(Debug, thiserror::Error)]
#[error("request failed: [{} {}]: {source}", .request.method, .request.url)]
pub struct RequestError {
    pub source: TransportError,
    pub request: Request,
}

impl RequestError {
    pub fn is_abort(&self) -> bool {
        self.source.is_abort()
    }
}

/// HTTP failure: the exchange completed with a non-2xx status.
#[derive(Debug, thiserror::Error)]
#[error(
    "request failed with status {} {}: [{} {}]",
    .status.as_u16(),
    .status_text,
    .request.method,
    .request.url
)]
pub struct HttpError {
    pub status: StatusCode,
    pub status_text: String,
    pub response: Response,
    pub request: Request,
}

/// Reason a response body could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid form body: {0}")]
    Form(String),
}

/// Decode failure: the exchange succeeded but the body could not be decoded.
#[derive(Debug, thiserror::Error)]
#[error("failed to parse response: [{} {}]: {source}", .request.method, .request.url)]
pub struct ParseError {
    pub source: DecodeError,
    pub response: Response,
    pub request: Request,
}

/// Error type returned by this crate.
///
/// The three variants are disjoint: a transport failure never carries a
/// response, an HTTP failure never carries a decoded body.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FetchError {
    /// The request that produced this failure.
    pub fn request(&self) -> &Request {
        match self {
            Self::Request(err) => &err.request,
            Self::Http(err) => &err.request,
            Self::Parse(err) => &err.request,
        }
    }

    /// The response, when the exchange completed.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Request(_) => None,
            Self::Http(err) => Some(&err.response),
            Self::Parse(err) => Some(&err.response),
        }
    }

    /// Status code of an HTTP failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(err) => Some(err.status),
            _ => None,
        }
    }

    /// Returns `true` when the request was cancelled by a signal or a timeout.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Request(err) if err.is_abort())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(err) if err.source.is_timeout())
    }
}
