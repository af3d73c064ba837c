//! The handshake task run on a worker for every accepted socket.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::header::{Header, HeaderError};
use crate::registry::Registry;

use super::{DISPATCH_TARGET, HandshakeError};

/// Response written before the socket is handed to a handler.
pub const ACCEPT_RESPONSE: &[u8] = b"proceed";

/// Response written for malformed headers and unknown services alike.
pub const REJECT_RESPONSE: &[u8] = b"no such service";

/// Why a handshake was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The header line failed to parse.
    Malformed(HeaderError),
    /// No handler is bound for the requested key.
    NoSuchService {
        /// Requested service.
        service: String,
        /// Requested service version.
        version: String,
    },
}

/// Result of a completed handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// A handler took the connection and has since returned.
    HandedOff {
        /// Requested service.
        service: String,
        /// Requested service version.
        version: String,
    },
    /// The peer was sent the rejection response.
    Rejected(RejectReason),
}

/// One accepted socket bound to the registry current at submission time.
#[derive(Debug)]
pub struct Handshake {
    stream: TcpStream,
    registry: Arc<Registry>,
}

impl Handshake {
    pub(super) const fn new(stream: TcpStream, registry: Arc<Registry>) -> Self {
        Self { stream, registry }
    }

    /// Remote address of the connection, when the socket still knows it.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Runs the handshake and, on success, the selected handler.
    ///
    /// The header is fully read and validated before any response byte is
    /// written, and the response is flushed before the handler is invoked.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError`] when the peer disconnects early or a read
    /// or write fails. No handler runs in that case.
    pub fn run(self) -> Result<HandshakeOutcome, HandshakeError> {
        let Self {
            mut stream,
            registry,
        } = self;

        let line = read_header_line(&mut stream)?;
        let header = match Header::parse(&line) {
            Ok(header) => header,
            Err(reason) => {
                reject(&mut stream)?;
                return Ok(HandshakeOutcome::Rejected(RejectReason::Malformed(reason)));
            }
        };

        let service = header.service().to_owned();
        let version = header.service_version().as_str().to_owned();
        let Some(handler) = registry.lookup(&service, &version) else {
            reject(&mut stream)?;
            return Ok(HandshakeOutcome::Rejected(RejectReason::NoSuchService {
                service,
                version,
            }));
        };

        stream.write_all(ACCEPT_RESPONSE)?;
        stream.flush()?;
        debug!(
            target: DISPATCH_TARGET,
            service = %service,
            version = %version,
            options = header.option_count(),
            "handing connection to handler"
        );
        handler.handle(stream);
        Ok(HandshakeOutcome::HandedOff { service, version })
    }

    /// Runs the handshake and records its outcome in the logs.
    ///
    /// This is the body of the worker-pool task: nothing escapes it
    /// unreported.
    pub fn run_logged(self) {
        let peer = self.peer_addr();
        match self.run() {
            Ok(HandshakeOutcome::HandedOff { service, version }) => debug!(
                target: DISPATCH_TARGET,
                peer = ?peer,
                service = %service,
                version = %version,
                "handler released connection"
            ),
            Ok(HandshakeOutcome::Rejected(RejectReason::Malformed(reason))) => info!(
                target: DISPATCH_TARGET,
                peer = ?peer,
                reason = %reason,
                "rejected malformed handshake header"
            ),
            Ok(HandshakeOutcome::Rejected(RejectReason::NoSuchService { service, version })) => {
                info!(
                    target: DISPATCH_TARGET,
                    peer = ?peer,
                    service = %service,
                    version = %version,
                    "rejected handshake for unbound service"
                );
            }
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                peer = ?peer,
                error = %error,
                "handshake failed"
            ),
        }
    }
}

/// Reads up to and including the first `\n`, one byte at a time so nothing
/// beyond the header is taken from the socket.
///
/// No length limit applies: a peer that never sends a newline holds the
/// worker until it disconnects.
pub(super) fn read_header_line<R: Read>(stream: &mut R) -> Result<String, HandshakeError> {
    let mut line = Vec::new();
    let mut byte = [0_u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) if line.is_empty() => return Err(HandshakeError::Closed),
            Ok(0) => break,
            Ok(_) => {
                let [value] = byte;
                if value == b'\n' {
                    break;
                }
                line.push(value);
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error.into()),
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

fn reject(stream: &mut TcpStream) -> io::Result<()> {
    stream.write_all(REJECT_RESPONSE)?;
    stream.flush()?;
    match stream.shutdown(Shutdown::Write) {
        Err(error) if error.kind() != io::ErrorKind::NotConnected => Err(error),
        _ => Ok(()),
    }
}
