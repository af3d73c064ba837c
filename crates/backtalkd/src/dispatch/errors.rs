//! Errors that abort a handshake before any handler runs.

use std::io;

use thiserror::Error;

/// Failures while reading the header or writing the response.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The peer closed the connection before sending a header byte.
    #[error("connection closed before a header was received")]
    Closed,
    /// Socket read or write failed.
    #[error("handshake I/O failed: {0}")]
    Io(#[from] io::Error),
}
