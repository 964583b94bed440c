//! Responses generated locally by the harness instead of a user handler,
//! plus the response counterpart of [`super::request::head`].

use hyper::{header, Response, StatusCode};

use super::body::{self, Body};

/// Factory for responses that the transport or the router send on their
/// own: the default answer when nothing is installed and the 404 of the
/// routing table.
pub struct LocalResponse;

impl LocalResponse {
    /// Response with the given status and body.
    pub fn with_status(status: StatusCode, body: Body) -> Response<Body> {
        let mut response = Response::new(body);
        *response.status_mut() = status;

        response
    }

    /// `200 OK` with an empty body. This is what a server with no handler
    /// installed answers.
    pub fn ok() -> Response<Body> {
        Self::with_status(StatusCode::OK, body::empty())
    }

    /// `404 Not Found` for paths without a matching route.
    pub fn not_found() -> Response<Body> {
        let mut response =
            Self::with_status(StatusCode::NOT_FOUND, body::full("404 page not found\n"));
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        response
    }
}

/// Copies the status, version, headers and extensions of `response` without
/// touching its body.
pub(crate) fn head<B>(response: &Response<B>) -> Response<()> {
    let mut head = Response::new(());

    *head.status_mut() = response.status();
    *head.version_mut() = response.version();
    *head.headers_mut() = response.headers().clone();
    *head.extensions_mut() = response.extensions().clone();

    head
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_keeps_status_and_headers() {
        let mut response = LocalResponse::not_found();
        response
            .headers_mut()
            .insert("x-color", header::HeaderValue::from_static("red"));

        let head = head(&response);

        assert_eq!(head.status(), StatusCode::NOT_FOUND);
        assert_eq!(head.headers()["x-color"], "red");
        assert_eq!(
            head.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn default_response_is_empty_ok() {
        use hyper::body::Body as _;

        let response = LocalResponse::ok();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_end_stream());
    }
}
