//! HTTP test harness. A [`ClientServer`] runs an HTTP server on the current
//! Tokio runtime and provides a client preconfigured to talk to it. The last
//! request received by the server, the last request sent by the client and
//! the last response the client got back are recorded, so tests can check
//! both sides of an exchange from the test itself.

mod capture;
mod clientserver;
mod error;
mod sync;

pub mod config;
pub mod http;
pub mod requests;
pub mod server;
pub mod service;

pub use crate::{
    clientserver::ClientServer,
    error::Error,
    http::{body, client::Client, response::LocalResponse},
    requests::{executor_fn, Entry, Executor, Middleware, Received, Requests},
    server::{Server, ShutdownState, State},
    service::{handler_fn, Handler, HandlerFn, HandlerFuture, Router},
};
