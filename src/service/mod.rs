//! The [`hyper`] library is based on services. Each time the transport
//! accepts a connection it has to provide an instance of
//! [`hyper::service::Service`] to handle that connection. This module
//! contains [`Dispatch`], which implements [`hyper::service::Service`] and
//! forwards every request to whatever [`Handler`] is currently installed
//! on the server. Handlers can be swapped while the server is running, which
//! is what tests do all the time.

mod router;

use std::{
    convert::Infallible,
    future::Future,
    pin::Pin,
    sync::{Arc, PoisonError, RwLock},
};

use hyper::{body::Incoming, service::Service, Request, Response};

pub use router::Router;

use crate::http::{body::Body, response::LocalResponse};

/// Future returned by [`Handler::handle`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response<Body>> + Send>>;

/// Server side request handler. Handlers can't fail, they answer every
/// request with some response, like an HTTP server would.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Request<Incoming>) -> HandlerFuture;
}

/// Handler backed by a function. See [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

/// Creates a [`Handler`] from an async function or closure.
///
/// ```
/// use clientserver::{body, handler_fn};
/// use hyper::{Response, StatusCode};
///
/// let handler = handler_fn(|_request| async {
///     let mut response = Response::new(body::empty());
///     *response.status_mut() = StatusCode::NO_CONTENT;
///     response
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    HandlerFn { f }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    fn handle(&self, request: Request<Incoming>) -> HandlerFuture {
        Box::pin((self.f)(request))
    }
}

/// Top level handler of a server. Shared between the server and all its
/// connection tasks.
#[derive(Default)]
pub(crate) struct Slot {
    handler: RwLock<Option<Arc<dyn Handler>>>,
}

impl Slot {
    pub fn set(&self, handler: Arc<dyn Handler>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn get(&self) -> Option<Arc<dyn Handler>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Implements [`Service`] for one connection and dispatches each request
/// to the handler installed at the time the request arrives.
pub(crate) struct Dispatch {
    slot: Arc<Slot>,
}

impl Dispatch {
    /// Creates a new [`Dispatch`] service.
    pub fn new(slot: Arc<Slot>) -> Self {
        Self { slot }
    }
}

impl Service<Request<Incoming>> for Dispatch {
    type Response = Response<Body>;

    type Error = Infallible;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        let handler = self.slot.get();

        Box::pin(async move {
            let response = match handler {
                Some(handler) => handler.handle(request).await,
                None => LocalResponse::ok(),
            };

            Ok(response)
        })
    }
}
