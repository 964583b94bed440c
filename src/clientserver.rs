//! The harness: an in-process [`Server`] plus a [`Requests`] client
//! preconfigured to talk to it, with every exchange recorded.

use std::{future::Future, net::SocketAddr, sync::Arc};

use hyper::{body::Incoming, Request, Response, Uri};
use serde::de::DeserializeOwned;

use crate::{
    capture::Capture,
    config,
    http::body::Body,
    requests::{self, Entry, Executor, Received, Requests},
    server::Server,
    service::{handler_fn, Handler, Router},
    Error,
};

/// HTTP server and HTTP client in one. The client is preconfigured with the
/// server URL, so relative paths like `"red"` or `"/api/colors"` reach the
/// server directly:
///
/// ```no_run
/// use clientserver::{body, requests, ClientServer};
/// use hyper::{Response, StatusCode};
///
/// # async fn run() -> Result<(), clientserver::Error> {
/// let mut cs = ClientServer::start()?;
///
/// cs.router().route_fn("/red", |_| async {
///     let mut response = Response::new(body::empty());
///     *response.status_mut() = StatusCode::NO_CONTENT;
///     response
/// });
///
/// let response = cs.send([requests::get("/red")]).await?;
///
/// assert_eq!(response.status(), StatusCode::NO_CONTENT);
/// assert_eq!(cs.last_server_request().unwrap().uri().path(), "/red");
///
/// cs.close().await;
/// # Ok(())
/// # }
/// ```
///
/// The last request seen by the server, the last request sent by the client
/// and the last response received by the client are kept until the next
/// exchange or until [`ClientServer::clear`] is called. Only the latest of
/// each is stored, which is meant for tests that do one exchange at a time.
///
/// Should be closed at the end of the test. Dropping it stops the server as
/// well, but without waiting for open connections.
pub struct ClientServer {
    server: Server,
    requests: Requests,
    capture: Arc<Capture>,
}

impl ClientServer {
    /// Creates a new harness around `server`, or around a new server with
    /// the default configuration if `server` is `None`. The harness replaces
    /// the server's handler.
    ///
    /// The client gets the server URL and [`crate::Client`] as its executor,
    /// then `entries` in order, and finally the capturing middleware. That
    /// makes it the innermost layer at this point, so it records requests
    /// after every middleware in `entries` has changed them, exactly as they
    /// are sent. Middleware added later runs inside of it. Fails if any
    /// entry fails, or if a new server can't be started.
    pub fn new(
        server: Option<Server>,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Self, Error> {
        let server = match server {
            Some(server) => server,
            None => Server::start(config::Server::default())?,
        };

        let capture = Arc::new(Capture::new());
        server.install(capture.clone());

        let mut requests = Requests::new();
        requests.apply([
            requests::executor(server.client()),
            requests::url(server.url().to_string()),
        ])?;
        requests.apply(entries)?;

        let layer = capture.layer();
        requests.apply([requests::middleware(move |next| layer(next))])?;

        Ok(Self {
            server,
            requests,
            capture,
        })
    }

    /// Same as [`ClientServer::new`] with a new server and no entries.
    pub fn start() -> Result<Self, Error> {
        Self::new(None, [])
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// The client template. Requests built from it go through the capturing
    /// middleware.
    pub fn requests(&self) -> &Requests {
        &self.requests
    }

    /// Applies more entries to the client template. Middleware added here
    /// runs inside the capturing middleware, so its changes are not
    /// recorded.
    pub fn apply(&mut self, entries: impl IntoIterator<Item = Entry>) -> Result<(), Error> {
        self.requests.apply(entries)
    }

    pub fn url(&self) -> Uri {
        self.server.url()
    }

    pub fn socket_address(&self) -> SocketAddr {
        self.server.socket_address()
    }

    /// Builds a request without sending it.
    pub fn request(&self, entries: impl IntoIterator<Item = Entry>) -> Result<Request<Body>, Error> {
        self.requests.request(entries)
    }

    /// Executor chain of the client, capturing middleware included. Can be
    /// passed to a standalone [`Requests`] with [`requests::executor`] to
    /// have its requests recorded by this harness.
    pub fn executor(&self) -> Arc<dyn Executor> {
        self.requests.executor()
    }

    /// Sends a request to the server. See [`Requests::send`].
    pub async fn send(
        &self,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Response<Body>, Error> {
        self.requests.send(entries).await
    }

    /// Sends a request and decodes the response. See [`Requests::receive`].
    pub async fn receive<T>(
        &self,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Received<T>, Error>
    where
        T: DeserializeOwned + Default,
    {
        self.requests.receive(entries).await
    }

    /// See [`Requests::receive_full`].
    pub async fn receive_full<T, E>(
        &self,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Received<Result<T, E>>, Error>
    where
        T: DeserializeOwned + Default,
        E: DeserializeOwned + Default,
    {
        self.requests.receive_full(entries).await
    }

    /// Returns the routing table, installing an empty one first unless one
    /// is already installed. Calling it again returns the same table until
    /// another handler is installed.
    pub fn router(&self) -> Arc<Router> {
        self.capture.router()
    }

    /// Installs `handler` for every request, discarding the routing table.
    pub fn set_handler(&self, handler: impl Handler) {
        self.capture.set_handler(Arc::new(handler));
    }

    /// Same as [`ClientServer::set_handler`] for async functions or
    /// closures.
    pub fn handler_fn<F, Fut>(&self, f: F)
    where
        F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response<Body>> + Send + 'static,
    {
        self.set_handler(handler_fn(f));
    }

    /// Last request received by the server, without its body.
    pub fn last_server_request(&self) -> Option<Request<()>> {
        self.capture.last_server_request()
    }

    /// Last request sent by the client, without its body.
    pub fn last_client_request(&self) -> Option<Request<()>> {
        self.capture.last_client_request()
    }

    /// Last response received by the client, without its body. `None` if
    /// the last request failed before a response arrived.
    pub fn last_client_response(&self) -> Option<Response<()>> {
        self.capture.last_client_response()
    }

    /// Clears the values captured by the last exchange.
    pub fn clear(&self) {
        self.capture.clear();
    }

    /// Shuts down the server. See [`Server::close`].
    pub async fn close(&mut self) {
        self.server.close().await;
    }
}
