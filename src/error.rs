//! Error type shared by the transport, the request builder and the harness.

use std::{io, time::Duration};

use thiserror::Error;

/// Everything that can go wrong while setting up a harness or performing
/// a request through it. The capture layers never produce errors of their
/// own, they only forward what the wrapped executor returned.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("invalid request: {0}")]
    Http(#[from] http::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    /// The request has no URL at all.
    #[error("no URL to send the request to")]
    MissingUrl,

    /// A relative path was given but there is no base URL to resolve it
    /// against.
    #[error("no base URL to resolve {0:?} against")]
    MissingBaseUrl(String),

    /// The request URI has no host, so there is nowhere to connect to.
    #[error("request URI {0} has no authority")]
    MissingAuthority(http::Uri),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
