//! The default [`Executor`]: opens a TCP connection to the authority of the
//! request URI and performs a single HTTP/1.1 exchange over it.

use http_body_util::BodyExt;
use hyper::{
    header::{self, HeaderValue},
    Request, Uri,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::{
    http::body::Body,
    requests::executor::{Executor, ExecutorFuture},
    Error,
};

/// HTTP/1.1 client. Every request uses a new connection, which is closed
/// by the background connection task once the response body is done.
#[derive(Debug, Clone, Copy, Default)]
pub struct Client;

impl Client {
    /// Creates a new [`Client`].
    pub fn new() -> Self {
        Self
    }
}

impl Executor for Client {
    fn execute(&self, request: Request<Body>) -> ExecutorFuture {
        Box::pin(send(request))
    }
}

async fn send(mut request: Request<Body>) -> Result<hyper::Response<Body>, Error> {
    let Some(authority) = request.uri().authority().cloned() else {
        return Err(Error::MissingAuthority(request.uri().clone()));
    };

    let host = authority.host().trim_start_matches('[').trim_end_matches(']');
    let port = authority.port_u16().unwrap_or(80);
    let stream = TcpStream::connect((host, port)).await?;

    let (mut sender, conn) = hyper::client::conn::http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .handshake(TokioIo::new(stream))
        .await?;

    tokio::task::spawn(async move {
        if let Err(err) = conn.await {
            tracing::debug!("Client connection failed: {err}");
        }
    });

    if !request.headers().contains_key(header::HOST) {
        let host = HeaderValue::from_str(authority.as_str()).map_err(http::Error::from)?;
        request.headers_mut().insert(header::HOST, host);
    }

    // HTTP/1.1 servers expect the origin form in the request line.
    let origin = request
        .uri()
        .path_and_query()
        .map_or("/", |path| path.as_str())
        .parse::<Uri>()?;
    *request.uri_mut() = origin;

    let response = sender.send_request(request).await?;

    Ok(response.map(|body| body.boxed()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body;

    #[tokio::test]
    async fn relative_uri_has_nowhere_to_go() {
        let request = Request::builder()
            .uri("/red")
            .body(body::empty())
            .unwrap();

        let result = Client::new().execute(request).await;

        assert!(matches!(result, Err(Error::MissingAuthority(uri)) if uri == "/red"));
    }

    #[tokio::test]
    async fn connection_refused_is_reported() {
        // Bind and drop a listener so the port is known to be closed.
        let address = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let request = Request::builder()
            .uri(format!("http://{address}/red"))
            .body(body::empty())
            .unwrap();

        let result = Client::new().execute(request).await;

        assert!(matches!(result, Err(Error::Io(_))));
    }
}
