//! Error types for the listening socket, worker pool and acceptor.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use backtalk_config::{ConfigError, RESERVED_PORT_CEILING};

/// Errors surfaced while binding the listening socket or spawning its thread.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to configure listening socket: {source}")]
    Socket {
        #[source]
        source: io::Error,
    },
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn accept thread: {source}")]
    ThreadSpawn {
        #[source]
        source: io::Error,
    },
}

/// Errors raised when submitting work to, or building, the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every worker is busy and the pending queue is full.
    #[error("worker pool queue is full")]
    Saturated,
    /// The pool no longer accepts work.
    #[error("worker pool is shutting down")]
    ShuttingDown,
    /// A pool was requested without any worker threads.
    #[error("worker pool needs at least one thread")]
    NoWorkers,
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },
}

/// Start-up requirement that was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("no worker pool configured")]
    MissingWorkerPool,
    #[error("no dispatcher bound")]
    MissingDispatcher,
    #[error("listener port {0} must exceed {RESERVED_PORT_CEILING}")]
    PortOutOfRange(u16),
}

/// Errors reported by [`Acceptor`](super::Acceptor) operations.
#[derive(Debug, Error)]
pub enum AcceptorError {
    #[error("cannot start acceptor: {0}")]
    Precondition(#[from] Precondition),
    #[error("acceptor is already listening")]
    AlreadyListening,
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("invalid listener update: {0}")]
    Update(#[from] ConfigError),
}
