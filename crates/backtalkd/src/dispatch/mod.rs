//! Per-connection handshake and handoff.
//!
//! A [`Dispatcher`] binds accepted sockets to the registry it was built with.
//! Each resulting [`Handshake`] reads one header line, answers `proceed` or
//! `no such service`, and on success moves the socket into the matching
//! handler. The peer cannot tell a malformed header from an unknown service;
//! the specific reason only reaches the logs.

mod errors;
mod handshake;
#[cfg(test)]
mod tests;

use std::net::TcpStream;
use std::sync::Arc;

use crate::registry::Registry;

pub use self::errors::HandshakeError;
pub use self::handshake::{
    ACCEPT_RESPONSE, Handshake, HandshakeOutcome, REJECT_RESPONSE, RejectReason,
};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Builds handshake tasks against one registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    /// Creates a dispatcher routing through `registry`.
    #[must_use]
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Registry consulted by new handshakes.
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Binds `stream` to this dispatcher's registry.
    #[must_use]
    pub fn handshake(&self, stream: TcpStream) -> Handshake {
        Handshake::new(stream, Arc::clone(&self.registry))
    }
}
