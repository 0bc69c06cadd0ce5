//! Configuration merging: client defaults and call options into one
//! resolved request.

use std::time::Duration;

use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use url::form_urlencoded;

use crate::{
    body::encode_body, AbortSignal, CallOptions, ClientOptions, Hooks, Input, Query, QueryValue,
    Request, ResponseType, RetryPolicy, TransportError,
};

/// Default `Accept` header.
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Everything needed to run one attempt.
#[derive(Debug)]
pub(crate) struct ResolvedRequest {
    pub request: Request,
    /// Set when a header could not be converted; the attempt fails before
    /// reaching the transport.
    pub invalid: Option<TransportError>,
    pub response_type: Option<ResponseType>,
    pub timeout: Option<Duration>,
    pub signals: Vec<AbortSignal>,
    pub retry: RetryPolicy,
    pub hooks: Hooks,
}

/// Joins `input` onto `base_url`.
///
/// Absolute [`Input::Url`] values and inputs that already start with the
/// base URL are returned unchanged. Otherwise exactly one `/` separates
/// the two parts.
pub fn merge_url(input: &Input, base_url: Option<&str>) -> String {
    let path = match input {
        Input::Url(url) => return url.to_string(),
        Input::Path(path) => path.as_str(),
    };

    let Some(base_url) = base_url.filter(|base| !base.is_empty()) else {
        return path.to_owned();
    };

    if path.starts_with(base_url) {
        return path.to_owned();
    }

    match (base_url.ends_with('/'), path.starts_with('/')) {
        (false, false) => format!("{base_url}/{path}"),
        (true, true) => format!("{}{path}", &base_url[..base_url.len() - 1]),
        _ => format!("{base_url}{path}"),
    }
}

/// Merges query layers left to right into ordered `(key, value)` pairs.
///
/// - [`QueryValue::Absent`] removes every occurrence of the key merged so far.
/// - [`QueryValue::List`] appends one occurrence per element.
/// - Anything else replaces the first occurrence in place and drops the rest,
///   or appends when the key is new.
pub fn merge_query<'a, I>(layers: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = &'a Query>,
{
    let mut pairs: Vec<(String, String)> = Vec::new();

    for layer in layers {
        for (key, value) in layer.iter() {
            match value {
                QueryValue::Absent => pairs.retain(|(existing, _)| existing != key),
                QueryValue::List(items) => {
                    pairs.extend(items.iter().map(|item| (key.to_owned(), item.clone())));
                }
                QueryValue::Null => set_pair(&mut pairs, key, String::new()),
                QueryValue::Text(text) => set_pair(&mut pairs, key, text.clone()),
                QueryValue::Json(json) => set_pair(&mut pairs, key, json.to_string()),
            }
        }
    }

    pairs
}

fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: String) {
    match pairs.iter().position(|(existing, _)| existing == key) {
        Some(first) => {
            pairs[first].1 = value;
            let mut index = 0;
            pairs.retain(|(existing, _)| {
                let keep = index <= first || existing != key;
                index += 1;
                keep
            });
        }
        None => pairs.push((key.to_owned(), value)),
    }
}

/// Serializes merged query pairs as `application/x-www-form-urlencoded`.
pub fn encode_query(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn append_query(url: String, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return url;
    }
    let (target, fragment) = match url.find('#') {
        Some(index) => url.split_at(index),
        None => (url.as_str(), ""),
    };
    let separator = if target.contains('?') { '&' } else { '?' };
    format!("{target}{separator}{}{fragment}", encode_query(pairs))
}

/// Upper-cases the method, defaulting to `GET`.
pub fn normalize_method(method: Option<&Method>) -> Method {
    match method {
        None => Method::GET,
        Some(method) => Method::from_bytes(method.as_str().to_ascii_uppercase().as_bytes())
            .unwrap_or_else(|_| method.clone()),
    }
}

/// Layers headers: default `Accept`, body content type, client headers,
/// call headers. Later layers replace earlier ones per header name.
///
/// Invalid entries are skipped and the first one is reported.
pub(crate) fn merge_headers(
    content_type: Option<&'static str>,
    client: &[(String, String)],
    call: &[(String, String)],
) -> (HeaderMap, Option<TransportError>) {
    let mut headers = HeaderMap::new();
    let mut invalid = None;

    headers.insert(header::ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    if let Some(content_type) = content_type {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    for (name, value) in client.iter().chain(call) {
        let parsed = HeaderName::try_from(name.as_str())
            .map_err(TransportError::builder)
            .and_then(|name| {
                HeaderValue::try_from(value.as_str())
                    .map(|value| (name, value))
                    .map_err(TransportError::builder)
            });
        match parsed {
            Ok((name, value)) => {
                headers.insert(name, value);
            }
            Err(err) => {
                invalid.get_or_insert(err);
            }
        }
    }

    (headers, invalid)
}

/// Builds the request for one attempt from the client defaults and the
/// current call options.
pub(crate) fn resolve(
    defaults: &ClientOptions,
    input: &Input,
    options: &CallOptions,
) -> ResolvedRequest {
    let encoded = options.data.as_ref().and_then(encode_body);
    let content_type = encoded.as_ref().and_then(|encoded| encoded.content_type);
    let (headers, invalid) = merge_headers(content_type, &defaults.headers, &options.headers);

    let url = merge_url(input, defaults.base_url.as_deref());
    let query = merge_query([&defaults.query, &options.query]);

    let signals = defaults
        .signal
        .iter()
        .chain(options.signal.iter())
        .cloned()
        .collect();

    ResolvedRequest {
        request: Request {
            method: normalize_method(options.method.as_ref()),
            url: append_query(url, &query),
            headers,
            body: encoded.map(|encoded| encoded.body),
            extensions: options.extensions.clone(),
        },
        invalid,
        response_type: options.response_type,
        timeout: options.timeout.or(defaults.timeout),
        signals,
        retry: RetryPolicy::resolve(&defaults.retry, &options.retry),
        hooks: defaults.hooks.chain(&options.hooks),
    }
}
