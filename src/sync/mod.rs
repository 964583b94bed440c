//! Synchronization primitives used by the server.

pub(crate) mod drain;
