use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, StatusCode, Version};

use crate::{
    body::{FormData, FormValue, RequestBody},
    TransportError,
};

/// Fully resolved request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    /// Absolute URL including the serialized query string.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Transport-native options not modeled by this crate.
    pub extensions: Extensions,
}

/// Response descriptor returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Value of the `Content-Type` header, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// Performs a single network exchange.
///
/// Implementations must not retry and must not apply their own timeouts:
/// cancellation is performed by dropping the returned future.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Honours an [`http::Version`] stored in [`Request::extensions`].
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a preconfigured `reqwest` client (proxies, TLS roots, ...).
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());

        if let Some(version) = request.extensions.get::<Version>() {
            builder = builder.version(*version);
        }

        builder = match &request.body {
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
            Some(RequestBody::Multipart(form)) => {
                builder.multipart(to_multipart(form).map_err(TransportError::builder)?)
            }
            None => builder,
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(Response {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }
}

fn to_multipart(form: &FormData) -> Result<reqwest::multipart::Form, reqwest::Error> {
    let mut multipart = reqwest::multipart::Form::new();
    for (name, value) in form.iter() {
        multipart = match value {
            FormValue::Text(text) => multipart.text(name.to_owned(), text.clone()),
            FormValue::File(file) => {
                let mut part = reqwest::multipart::Part::bytes(file.bytes.to_vec());
                if let Some(file_name) = &file.file_name {
                    part = part.file_name(file_name.clone());
                }
                if let Some(content_type) = &file.content_type {
                    part = part.mime_str(content_type)?;
                }
                multipart.part(name.to_owned(), part)
            }
        };
    }
    Ok(multipart)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        TransportError::builder(err)
    } else {
        TransportError::network(err)
    }
}
