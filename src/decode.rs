use url::form_urlencoded;

use crate::{
    body::{FilePart, FormData, FormValue, FORM_URLENCODED},
    Blob, DecodeError, Response, ResponseData,
};

/// How a response body is decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseType {
    Json,
    Text,
    ArrayBuffer,
    Blob,
    FormData,
}

const TEXT_TYPES: [&str; 4] = [
    "image/svg",
    "application/xml",
    "application/xhtml",
    "application/html",
];

/// Maps a `Content-Type` value to a decoding mode. Total: unknown or empty
/// types decode as [`ResponseType::Blob`].
pub fn detect_response_type(content_type: &str) -> ResponseType {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if is_json_media_type(&media_type) {
        ResponseType::Json
    } else if TEXT_TYPES.contains(&media_type.as_str()) || media_type.starts_with("text/") {
        ResponseType::Text
    } else if media_type.contains("application/octet-stream") {
        ResponseType::ArrayBuffer
    } else if media_type.contains("multipart/form-data") {
        ResponseType::FormData
    } else {
        ResponseType::Blob
    }
}

/// `application/json` or `application/<token>+json`.
fn is_json_media_type(media_type: &str) -> bool {
    let Some(subtype) = media_type.strip_prefix("application/") else {
        return false;
    };
    if subtype == "json" {
        return true;
    }
    subtype
        .strip_suffix("+json")
        .is_some_and(|prefix| prefix.chars().all(is_token_char))
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_!#$%&*.^`~-".contains(c)
}

pub(crate) fn decode_response(
    response: &Response,
    response_type: ResponseType,
) -> Result<ResponseData, DecodeError> {
    let body = &response.body;
    match response_type {
        ResponseType::Json => {
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(ResponseData::Json(serde_json::Value::Null));
            }
            Ok(ResponseData::Json(serde_json::from_slice(body)?))
        }
        ResponseType::Text => Ok(ResponseData::Text(
            String::from_utf8_lossy(body).into_owned(),
        )),
        ResponseType::ArrayBuffer => Ok(ResponseData::ArrayBuffer(body.clone())),
        ResponseType::Blob => Ok(ResponseData::Blob(Blob {
            content_type: response.content_type().map(str::to_owned),
            bytes: body.clone(),
        })),
        ResponseType::FormData => {
            let content_type = response.content_type().unwrap_or_default();
            if content_type
                .to_ascii_lowercase()
                .starts_with(FORM_URLENCODED)
            {
                let mut form = FormData::new();
                for (name, value) in form_urlencoded::parse(body) {
                    form.push(name, FormValue::Text(value.into_owned()));
                }
                return Ok(ResponseData::FormData(form));
            }
            parse_multipart(content_type, body).map(ResponseData::FormData)
        }
    }
}

fn boundary(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|param| {
        let (name, value) = param.trim().split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"'))
            .filter(|value| !value.is_empty())
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

pub(crate) fn parse_multipart(content_type: &str, body: &[u8]) -> Result<FormData, DecodeError> {
    let boundary = boundary(content_type)
        .ok_or_else(|| DecodeError::Form("missing multipart boundary".to_owned()))?;
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let start = find(body, delimiter)
        .ok_or_else(|| DecodeError::Form("multipart body has no parts".to_owned()))?;
    let mut rest = &body[start + delimiter.len()..];
    let mut form = FormData::new();

    loop {
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        let end = find(rest, delimiter)
            .ok_or_else(|| DecodeError::Form("unterminated multipart body".to_owned()))?;
        let section = &rest[..end];
        let section = section.strip_prefix(b"\r\n").unwrap_or(section);
        let section = section.strip_suffix(b"\r\n").unwrap_or(section);
        let (name, value) = parse_part(section)?;
        form.push(name, value);
        rest = &rest[end + delimiter.len()..];
    }
}

fn parse_part(section: &[u8]) -> Result<(String, FormValue), DecodeError> {
    let split = find(section, b"\r\n\r\n")
        .ok_or_else(|| DecodeError::Form("multipart part has no header block".to_owned()))?;
    let head = String::from_utf8_lossy(&section[..split]);
    let content = &section[split + 4..];

    let mut name = None;
    let mut file_name = None;
    let mut content_type = None;

    for line in head.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        let header = header.trim();
        if header.eq_ignore_ascii_case("content-disposition") {
            for attr in value.split(';').map(str::trim) {
                if let Some(value) = attr.strip_prefix("name=") {
                    name = Some(value.trim_matches('"').to_owned());
                } else if let Some(value) = attr.strip_prefix("filename=") {
                    file_name = Some(value.trim_matches('"').to_owned());
                }
            }
        } else if header.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_owned());
        }
    }

    let name =
        name.ok_or_else(|| DecodeError::Form("multipart part without a name".to_owned()))?;
    let value = if file_name.is_some() {
        FormValue::File(FilePart {
            bytes: bytes::Bytes::copy_from_slice(content),
            file_name,
            content_type,
        })
    } else {
        FormValue::Text(String::from_utf8_lossy(content).into_owned())
    };
    Ok((name, value))
}
