//! Utilities for creating common request and response bodies.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};

/// Body type used by handlers, executors and the request builder. Incoming
/// bodies from [`hyper`] are boxed into this as well, so every layer of the
/// harness speaks the same type.
pub type Body = BoxBody<Bytes, hyper::Error>;

/// Single chunk body.
pub fn full<T: Into<Bytes>>(chunk: T) -> Body {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty() -> Body {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}
