//! Both interception layers of the harness and the state they share.
//!
//! On the server side, [`Capture`] is installed as the top level
//! [`Handler`] of the transport: it records every inbound request and then
//! delegates to the handler or router installed by the test. On the client
//! side, [`Capture::layer`] is an executor middleware that records the
//! outbound request and the response that comes back.
//!
//! Only the most recent value of each kind is kept. Concurrent exchanges
//! overwrite each other, last writer wins, so tests that send requests in
//! parallel and assert on these values need their own synchronization.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use hyper::{body::Incoming, Request, Response};

use crate::{
    http::{
        body::Body,
        request,
        response::{self, LocalResponse},
    },
    requests::executor::{Executor, ExecutorFuture, Middleware},
    service::{Handler, HandlerFuture, Router},
};

/// What the capture handler delegates to.
#[derive(Clone, Default)]
enum Installed {
    /// Nothing installed, requests get an empty `200 OK`.
    #[default]
    Nothing,

    /// Handler set by the test.
    Direct(Arc<dyn Handler>),

    /// Routing table created on demand by [`Capture::router`].
    Router(Arc<Router>),
}

/// Snapshot of the last exchange. Bodies are never stored.
#[derive(Default)]
struct Exchange {
    server_request: Option<Request<()>>,
    client_request: Option<Request<()>>,
    client_response: Option<Response<()>>,
}

/// State shared by the capture handler, the capturing middleware and the
/// harness itself.
#[derive(Default)]
pub(crate) struct Capture {
    installed: RwLock<Installed>,
    exchange: Mutex<Exchange>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the installed router or installs a new one, replacing any
    /// direct handler.
    pub fn router(&self) -> Arc<Router> {
        let mut installed = self.installed.write().unwrap_or_else(PoisonError::into_inner);

        match &*installed {
            Installed::Router(router) => router.clone(),
            _ => {
                let router = Arc::new(Router::new());
                *installed = Installed::Router(router.clone());
                router
            }
        }
    }

    /// Installs `handler`, discarding the router if there was one.
    pub fn set_handler(&self, handler: Arc<dyn Handler>) {
        *self.installed.write().unwrap_or_else(PoisonError::into_inner) =
            Installed::Direct(handler);
    }

    pub fn last_server_request(&self) -> Option<Request<()>> {
        self.exchange().server_request.as_ref().map(request::head)
    }

    pub fn last_client_request(&self) -> Option<Request<()>> {
        self.exchange().client_request.as_ref().map(request::head)
    }

    pub fn last_client_response(&self) -> Option<Response<()>> {
        self.exchange().client_response.as_ref().map(response::head)
    }

    /// Forgets the last exchange. Installed handlers are kept.
    pub fn clear(&self) {
        *self.exchange() = Exchange::default();
    }

    /// Executor middleware that records requests and responses passing
    /// through it.
    pub fn layer(self: &Arc<Self>) -> Middleware {
        let capture = self.clone();

        Arc::new(move |next: Arc<dyn Executor>| {
            Arc::new(Capturing {
                capture: capture.clone(),
                next,
            }) as Arc<dyn Executor>
        })
    }

    fn exchange(&self) -> MutexGuard<'_, Exchange> {
        self.exchange.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Handler for Capture {
    fn handle(&self, request: Request<Incoming>) -> HandlerFuture {
        tracing::debug!("Server received {} {}", request.method(), request.uri());
        self.exchange().server_request = Some(request::head(&request));

        let installed = self
            .installed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match installed {
            Installed::Direct(handler) => handler.handle(request),
            Installed::Router(router) => router.handle(request),
            Installed::Nothing => Box::pin(async { LocalResponse::ok() }),
        }
    }
}

/// Executor that records what goes through it and otherwise behaves
/// exactly like `next`.
struct Capturing {
    capture: Arc<Capture>,
    next: Arc<dyn Executor>,
}

impl Executor for Capturing {
    fn execute(&self, request: Request<Body>) -> ExecutorFuture {
        tracing::debug!("Client sending {} {}", request.method(), request.uri());
        {
            // A response only belongs to the request recorded with it. If this
            // call is cancelled the slot stays empty.
            let mut exchange = self.capture.exchange();
            exchange.client_request = Some(request::head(&request));
            exchange.client_response = None;
        }

        let pending = self.next.execute(request);
        let capture = self.capture.clone();

        Box::pin(async move {
            let result = pending.await;
            capture.exchange().client_response = result.as_ref().ok().map(response::head);

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use hyper::{header::HeaderValue, StatusCode};

    use super::*;
    use crate::{
        http::body,
        requests::executor::{executor_fn, wrap},
        Error,
    };

    #[derive(Clone, Debug, PartialEq)]
    struct Color(&'static str);

    fn request(path: &str) -> Request<Body> {
        let mut request = Request::builder()
            .uri(format!("http://blue.com{path}"))
            .header("x-count", "25")
            .body(body::empty())
            .unwrap();
        request.extensions_mut().insert(Color("green"));

        request
    }

    #[tokio::test]
    async fn records_request_and_response() {
        let capture = Arc::new(Capture::new());
        let executor = wrap(
            Arc::new(executor_fn(|request: Request<Body>| async move {
                // The inner executor sees the same request the test sent.
                assert_eq!(request.extensions().get::<Color>(), Some(&Color("green")));
                let mut response =
                    LocalResponse::with_status(StatusCode::ACCEPTED, body::full("red"));
                response
                    .headers_mut()
                    .insert("x-color", HeaderValue::from_static("red"));
                Ok(response)
            })),
            &[capture.layer()],
        );

        let response = executor.execute(request("/red")).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-color"], "red");

        let sent = capture.last_client_request().unwrap();
        assert_eq!(sent.uri(), "http://blue.com/red");
        assert_eq!(sent.headers()["x-count"], "25");
        assert_eq!(sent.extensions().get::<Color>(), Some(&Color("green")));

        let received = capture.last_client_response().unwrap();
        assert_eq!(received.status(), StatusCode::ACCEPTED);
        assert_eq!(received.headers()["x-color"], "red");

        assert!(capture.last_server_request().is_none());
    }

    #[tokio::test]
    async fn failures_pass_through() {
        let capture = Arc::new(Capture::new());
        let executor = wrap(
            Arc::new(executor_fn(|request: Request<Body>| async move {
                Err(Error::MissingAuthority(request.uri().clone()))
            })),
            &[capture.layer()],
        );

        let result = executor.execute(request("/red")).await;

        assert!(matches!(
            result,
            Err(Error::MissingAuthority(uri)) if uri == "http://blue.com/red"
        ));
        assert!(capture.last_client_request().is_some());
        assert!(capture.last_client_response().is_none());
    }

    #[tokio::test]
    async fn latest_exchange_wins_and_clear_forgets() {
        let capture = Arc::new(Capture::new());
        let executor = wrap(
            Arc::new(executor_fn(|_| async { Ok(LocalResponse::ok()) })),
            &[capture.layer()],
        );

        executor.execute(request("/red")).await.unwrap();
        executor.execute(request("/blue")).await.unwrap();

        assert_eq!(
            capture.last_client_request().unwrap().uri(),
            "http://blue.com/blue"
        );

        capture.clear();

        assert!(capture.last_client_request().is_none());
        assert!(capture.last_client_response().is_none());
        assert!(capture.last_server_request().is_none());
    }

    #[tokio::test]
    async fn cancelled_request_forgets_previous_response() {
        let capture = Arc::new(Capture::new());
        let executor = wrap(
            Arc::new(executor_fn(|request: Request<Body>| async move {
                if request.uri().path() == "/slow" {
                    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                }
                Ok(LocalResponse::with_status(StatusCode::ACCEPTED, body::empty()))
            })),
            &[capture.layer()],
        );

        executor.execute(request("/fast")).await.unwrap();
        assert!(capture.last_client_response().is_some());

        let slow = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            executor.execute(request("/slow")),
        )
        .await;

        assert!(slow.is_err());
        assert_eq!(
            capture.last_client_request().unwrap().uri(),
            "http://blue.com/slow"
        );
        assert!(capture.last_client_response().is_none());
    }

    #[test]
    fn router_is_created_once() {
        let capture = Capture::new();

        let first = capture.router();
        let second = capture.router();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn direct_handler_replaces_router() {
        let capture = Capture::new();
        let router = capture.router();

        capture.set_handler(Arc::new(crate::service::handler_fn(|_| async {
            LocalResponse::ok()
        })));

        assert!(matches!(
            *capture.installed.read().unwrap(),
            Installed::Direct(_)
        ));
        assert!(!Arc::ptr_eq(&router, &capture.router()));
    }
}
