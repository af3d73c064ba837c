//! Built-in demonstration service.

use std::io;
use std::net::{Shutdown, TcpStream};

use tracing::{debug, warn};

use super::Handler;

const ECHO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::echo");

/// Writes every received byte straight back until the peer half-closes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl EchoHandler {
    /// Service name the daemon binds this handler under.
    pub const SERVICE: &'static str = "echo";
    /// Service version the daemon binds this handler under.
    pub const VERSION: &'static str = "1.0";
}

impl Handler for EchoHandler {
    fn handle(&self, stream: TcpStream) {
        match echo(&stream) {
            Ok(bytes) => debug!(target: ECHO_TARGET, bytes, "echo session finished"),
            Err(error) => warn!(target: ECHO_TARGET, error = %error, "echo session failed"),
        }
    }
}

fn echo(stream: &TcpStream) -> io::Result<u64> {
    let mut reader = stream;
    let mut writer = stream;
    let copied = io::copy(&mut reader, &mut writer)?;
    match stream.shutdown(Shutdown::Write) {
        Err(error) if error.kind() != io::ErrorKind::NotConnected => Err(error),
        _ => Ok(copied),
    }
}
