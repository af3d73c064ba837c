//! Ownership-transfer contract for routed services.

mod echo;

use std::net::TcpStream;
use std::sync::Arc;

pub use self::echo::EchoHandler;

/// Service that takes over a connection once the handshake succeeds.
///
/// The router has already consumed the header line and written `proceed`;
/// it never reads ahead, so the first byte available on `stream` is the
/// first byte of the service's own protocol. The call runs on a worker thread
/// and may block for the lifetime of the connection.
pub trait Handler: Send + Sync + 'static {
    /// Takes exclusive ownership of `stream` and runs to completion.
    fn handle(&self, stream: TcpStream);
}

/// Shared handle to a registered handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Returns `true` when both references point at the same handler instance.
#[must_use]
pub fn same_handler(left: &HandlerRef, right: &HandlerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}
