//! Custom types and abstractions over [`hyper`] for both sides of the
//! harness: bodies, request/response snapshots and the client executor.

pub mod body;
pub mod client;
pub(crate) mod request;
pub mod response;
