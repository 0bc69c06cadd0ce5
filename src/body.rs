use bytes::Bytes;
use serde::Serialize;
use url::form_urlencoded;

pub(crate) const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub(crate) const TEXT_PLAIN: &str = "text/plain;charset=UTF-8";
pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Request payload supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Sent as `application/x-www-form-urlencoded`.
    Form(FormParams),
    /// Sent as `multipart/form-data`; the transport generates the boundary.
    Multipart(FormData),
    /// Sent as `text/plain;charset=UTF-8`.
    Text(String),
    /// Objects, arrays and `null` are sent as `application/json`. A bare
    /// string is sent as text, while numbers and booleans send no body.
    Json(serde_json::Value),
}

impl Body {
    /// Serializes any value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Self::Json)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<FormParams> for Body {
    fn from(value: FormParams) -> Self {
        Self::Form(value)
    }
}

impl From<FormData> for Body {
    fn from(value: FormData) -> Self {
        Self::Multipart(value)
    }
}

/// URL-encoded parameter collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormParams(Vec<(String, String)>);

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair. Repeated keys are kept.
    pub fn append(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Canonical `application/x-www-form-urlencoded` text.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for FormParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for FormParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// A multipart field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::File(_) => None,
        }
    }
}

/// Binary multipart field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePart {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// Ordered multipart field collection, used both for request payloads and
/// for decoded `multipart/form-data` responses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormData(Vec<(String, FormValue)>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, FormValue::Text(value.into()));
        self
    }

    /// Adds a binary field with a file name and media type.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.push(
            name,
            FormValue::File(FilePart {
                bytes: bytes.into(),
                file_name: Some(file_name.into()),
                content_type: Some(content_type.into()),
            }),
        );
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: FormValue) {
        self.0.push((name.into(), value));
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

/// Body handed to the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Bytes(Bytes),
    Multipart(FormData),
}

impl RequestBody {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Multipart(_) => None,
        }
    }
}

/// Wire form of a [`Body`] plus the `Content-Type` it implies, if any.
#[derive(Debug)]
pub(crate) struct EncodedBody {
    pub body: RequestBody,
    pub content_type: Option<&'static str>,
}

/// Encodes a body by kind. Bare JSON numbers and booleans carry no body.
pub(crate) fn encode_body(body: &Body) -> Option<EncodedBody> {
    let encoded = match body {
        Body::Form(params) => EncodedBody {
            body: RequestBody::Bytes(Bytes::from(params.encode())),
            content_type: Some(FORM_URLENCODED),
        },
        Body::Multipart(form) => EncodedBody {
            body: RequestBody::Multipart(form.clone()),
            content_type: None,
        },
        Body::Text(text) | Body::Json(serde_json::Value::String(text)) => EncodedBody {
            body: RequestBody::Bytes(Bytes::from(text.clone())),
            content_type: Some(TEXT_PLAIN),
        },
        Body::Json(serde_json::Value::Number(_) | serde_json::Value::Bool(_)) => return None,
        Body::Json(value) => EncodedBody {
            body: RequestBody::Bytes(Bytes::from(value.to_string())),
            content_type: Some(APPLICATION_JSON),
        },
    };
    Some(encoded)
}
