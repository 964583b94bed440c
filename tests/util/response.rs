//! Quick response factory for handlers.

use clientserver::body::{self, Body};
use hyper::{header, Response, StatusCode};

/// Response with no body.
pub fn status(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(body::empty());
    *response.status_mut() = status;

    response
}

/// JSON response with the given status and raw body.
pub fn json(status: StatusCode, json: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body::full(json))
        .unwrap()
}
