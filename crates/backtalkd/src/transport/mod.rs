//! Listening socket, worker pool and the acceptor that joins them.
//!
//! The acceptor runs one named thread that accepts connections on a socket
//! with an accept timeout and submits a handshake task per connection to a
//! bounded worker pool. Both execution contexts stop through the same
//! two-phase policy: a cooperative wait, then a forced phase that severs
//! sockets, then detachment.

mod acceptor;
mod errors;
mod listener;
mod pool;
mod shutdown;
#[cfg(test)]
mod test_utils;

pub use self::acceptor::{Acceptor, AcceptorSettings, StopReport};
pub use self::errors::{AcceptorError, ListenerError, PoolError, Precondition};
pub use self::listener::ListenerSocket;
pub use self::pool::WorkerPool;
pub use self::shutdown::{PhaseOutcome, ShutdownOutcome, ShutdownReport};
#[cfg(test)]
pub(crate) use self::test_utils::{free_port, loopback_settings, wait_until};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
