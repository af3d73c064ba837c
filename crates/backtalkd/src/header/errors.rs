//! Reasons a handshake header can fail to parse.

use thiserror::Error;

/// Single failure reason reported by [`Header::parse`](super::Header::parse).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum HeaderError {
    /// The first token does not name the `backtalk` protocol.
    #[error("missing protocol")]
    MissingProtocol,
    /// The protocol token is not `backtalk/<major>.<minor>`.
    #[error("bad protocol version")]
    BadProtocolVersion,
    /// The line ends after the protocol token.
    #[error("incomplete header")]
    IncompleteHeader,
    /// The service token is not made of word characters.
    #[error("missing service")]
    MissingService,
    /// The line ends after the service token.
    #[error("missing service version")]
    MissingServiceVersion,
    /// The service version is not dotted numeric with an optional qualifier.
    #[error("bad service version")]
    BadServiceVersion,
    /// The option list is not a parenthesised `key[=value]` list.
    #[error("bad option specification")]
    BadOptionSpecification,
}
