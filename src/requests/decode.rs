//! Response body decoding. Bodies are collected in full and decoded based
//! on the `Content-Type` header. Only JSON is supported for now.

use std::borrow::Cow;

use bytes::Bytes;
use http::{header, response::Parts, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

use crate::{http::body::Body, Error};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Response whose body has been read and decoded.
#[derive(Debug)]
pub struct Received<T> {
    /// Status, headers and everything else except the body.
    pub parts: Parts,

    /// Raw body.
    pub body: Bytes,

    /// Decoded body.
    pub model: T,
}

impl<T> Received<T> {
    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    /// Body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Reads the whole body of `response`.
pub(crate) async fn collect(response: Response<Body>) -> Result<(Parts, Bytes), Error> {
    let (parts, body) = response.into_parts();
    let body = body.collect().await?.to_bytes();

    Ok((parts, body))
}

/// Decodes `body` into `T` according to the content type in `parts`. Empty
/// bodies decode into [`T::default`] no matter the content type.
pub(crate) fn decode<T>(parts: &Parts, body: &Bytes) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    if body.is_empty() {
        return Ok(T::default());
    }

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if is_json(content_type) {
        Ok(serde_json::from_slice(body)?)
    } else {
        Err(Error::UnsupportedContentType(content_type.to_owned()))
    }
}

/// Matches `application/json` and structured syntax suffixes such as
/// `application/problem+json`, ignoring parameters.
fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == CONTENT_TYPE_JSON || essence.ends_with("+json")
}
