use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::body::FormData;

/// Request target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Path or URL string, merged with the client base URL.
    Path(String),
    /// Absolute URL; the base URL is ignored.
    Url(Url),
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Self::Path(value.to_owned())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Self::Path(value)
    }
}

impl From<&String> for Input {
    fn from(value: &String) -> Self {
        Self::Path(value.clone())
    }
}

impl From<Url> for Input {
    fn from(value: Url) -> Self {
        Self::Url(value)
    }
}

impl From<&Url> for Input {
    fn from(value: &Url) -> Self {
        Self::Url(value.clone())
    }
}

/// Binary body tagged with its media type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseData {
    Json(serde_json::Value),
    Text(String),
    ArrayBuffer(Bytes),
    Blob(Blob),
    FormData(FormData),
}

impl ResponseData {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Raw bytes of a binary body.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::ArrayBuffer(bytes) => Some(bytes),
            Self::Blob(blob) => Some(&blob.bytes),
            _ => None,
        }
    }

    pub fn as_form_data(&self) -> Option<&FormData> {
        match self {
            Self::FormData(form) => Some(form),
            _ => None,
        }
    }
}

/// Decoded outcome of a successful invocation.
#[derive(Clone, Debug)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub data: ResponseData,
}

impl FetchResponse {
    /// Deserializes a JSON body into `T`. Returns `None` for non-JSON bodies.
    pub fn json<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.data
            .as_json()
            .map(|value| T::deserialize(value))
    }
}
