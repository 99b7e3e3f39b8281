//! ps-remote: the worker's message boundary.
//!
//! Callers never touch the engine directly. They hold a [`RemoteClient`],
//! whose requests are framed, sent to an [`Endpoint`] running on the worker's
//! own thread (or behind a socket), and answered one at a time in order.

pub mod client;
pub mod codec;
pub mod endpoint;
pub mod frame;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod worker;

pub use client::{
    ClientOptions, ClientStatsSnapshot, RemoteClient, RemoteError, SessionHandle, Ticket,
};
pub use endpoint::Endpoint;
pub use protocol::{FailureKind, RemoteFailure, Request, Response, PROTOCOL_VERSION};
pub use server::{serve_tcp, serve_uds};
pub use worker::spawn_worker;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

#[cfg(test)]
mod client_tests;
#[cfg(test)]
mod endpoint_tests;
