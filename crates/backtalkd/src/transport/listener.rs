//! Listening socket with an accept timeout.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use super::{ListenerError, TRANSPORT_TARGET};

const BACKLOG: i32 = 128;

/// TCP listening socket whose `accept` wakes up periodically.
///
/// The timeout is applied as `SO_RCVTIMEO`, so an idle accept returns
/// `Ok(None)` once it elapses and the caller can check for cancellation.
#[derive(Debug)]
pub struct ListenerSocket {
    socket: Socket,
    local_addr: SocketAddr,
    closed: AtomicBool,
}

impl ListenerSocket {
    /// Binds `host:port` and starts listening.
    ///
    /// `accept_timeout` of `None` makes [`ListenerSocket::accept`] block until
    /// a peer connects.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the address does not resolve or the
    /// socket cannot be created, configured or bound.
    pub fn bind(
        host: &str,
        port: u16,
        accept_timeout: Option<Duration>,
    ) -> Result<Self, ListenerError> {
        let addr = resolve(host, port)?;
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| ListenerError::Socket { source })?;
        socket
            .set_reuse_address(true)
            .map_err(|source| ListenerError::Socket { source })?;
        socket
            .bind(&addr.into())
            .map_err(|source| ListenerError::BindTcp { addr, source })?;
        socket
            .listen(BACKLOG)
            .map_err(|source| ListenerError::BindTcp { addr, source })?;
        socket
            .set_read_timeout(accept_timeout)
            .map_err(|source| ListenerError::Socket { source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ListenerError::Socket { source })?
            .as_socket()
            .unwrap_or(addr);

        Ok(Self {
            socket,
            local_addr,
            closed: AtomicBool::new(false),
        })
    }

    /// Address the socket is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for one connection.
    ///
    /// Returns `Ok(None)` when the accept timeout elapses or the call was
    /// interrupted. Accepted streams are blocking with no read timeout.
    ///
    /// # Errors
    ///
    /// Propagates every other accept failure, including the error produced
    /// once the socket has been closed.
    pub fn accept(&self) -> io::Result<Option<TcpStream>> {
        match self.socket.accept() {
            Ok((socket, _)) => {
                socket.set_nonblocking(false)?;
                socket.set_read_timeout(None)?;
                Ok(Some(socket.into()))
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                        | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Stops accepting and wakes a blocked [`ListenerSocket::accept`].
    ///
    /// Only the first call acts; the descriptor itself is released on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(error) = self.socket.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(
                target: TRANSPORT_TARGET,
                addr = %self.local_addr,
                error = %error,
                "listening socket shutdown reported an error"
            );
        }
    }

    /// Returns `true` once [`ListenerSocket::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })
}
