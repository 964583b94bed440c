//! Requests can't be cloned because their bodies are streams, but the
//! harness needs to keep a copy of every request it sees. This module
//! copies everything except the body into a [`Request<()>`].

use hyper::Request;

/// Copies the method, URI, version, headers and extensions of `request`.
/// The body is left alone, so the original request can still be sent or
/// handled without any buffering.
pub(crate) fn head<B>(request: &Request<B>) -> Request<()> {
    let mut head = Request::new(());

    *head.method_mut() = request.method().clone();
    *head.uri_mut() = request.uri().clone();
    *head.version_mut() = request.version();
    *head.headers_mut() = request.headers().clone();
    *head.extensions_mut() = request.extensions().clone();

    head
}

#[cfg(test)]
mod tests {
    use hyper::{header, Method};

    use super::*;
    use crate::http::body;

    #[derive(Clone, Debug, PartialEq)]
    struct Color(&'static str);

    #[test]
    fn head_copies_everything_but_the_body() {
        let mut request = Request::builder()
            .method(Method::PUT)
            .uri("http://blue.com/red?count=25")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body::full(r#"{"count":25}"#))
            .unwrap();
        request.extensions_mut().insert(Color("green"));

        let head = head(&request);

        assert_eq!(head.method(), Method::PUT);
        assert_eq!(head.uri(), "http://blue.com/red?count=25");
        assert_eq!(head.version(), request.version());
        assert_eq!(head.headers(), request.headers());
        assert_eq!(head.extensions().get::<Color>(), Some(&Color("green")));
    }
}
