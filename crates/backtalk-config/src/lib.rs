//! Shared configuration for the backtalk super-server.
//!
//! Values are layered by `ortho_config`: built-in defaults first, then a TOML
//! file (`--config-path` or discovered), then `BACKTALK_*` environment
//! variables, and finally command-line flags.

mod defaults;
mod error;
mod listener;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ACCEPT_TIMEOUT_MS, DEFAULT_ACCEPTOR_GRACE_MS, DEFAULT_LISTENER_HOST,
    DEFAULT_LISTENER_PORT, DEFAULT_LOG_FILTER, DEFAULT_WORKER_GRACE_MS, DEFAULT_WORKER_QUEUE,
    DEFAULT_WORKER_THREADS, RESERVED_PORT_CEILING, accept_timeout_from_millis,
    default_listener_host, default_log_filter, default_log_filter_string, default_log_format,
};
pub use error::ConfigError;
pub use listener::{ACCEPT_TIMEOUT_PROPERTY, LISTENER_PORT_PROPERTY, ListenerUpdate};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration for the super-server daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "BACKTALK")]
pub struct Config {
    /// Interface the listening socket binds to.
    #[ortho_config(default = default_listener_host())]
    pub listener_host: String,
    /// TCP port shared by every registered service.
    #[ortho_config(default = DEFAULT_LISTENER_PORT)]
    pub listener_port: u16,
    /// Accept timeout in milliseconds; zero blocks indefinitely.
    #[ortho_config(default = DEFAULT_ACCEPT_TIMEOUT_MS)]
    pub accept_timeout_ms: u64,
    /// Number of handshake worker threads.
    #[ortho_config(default = DEFAULT_WORKER_THREADS)]
    pub worker_threads: usize,
    /// Pending-connection queue depth in front of the workers.
    #[ortho_config(default = DEFAULT_WORKER_QUEUE)]
    pub worker_queue: usize,
    /// Per-phase shutdown wait for the accept thread, in milliseconds.
    #[ortho_config(default = DEFAULT_ACCEPTOR_GRACE_MS)]
    pub acceptor_grace_ms: u64,
    /// Per-phase shutdown wait for the worker pool, in milliseconds.
    #[ortho_config(default = DEFAULT_WORKER_GRACE_MS)]
    pub worker_grace_ms: u64,
    /// `tracing_subscriber::EnvFilter` expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listener_host: default_listener_host(),
            listener_port: DEFAULT_LISTENER_PORT,
            accept_timeout_ms: DEFAULT_ACCEPT_TIMEOUT_MS,
            worker_threads: DEFAULT_WORKER_THREADS,
            worker_queue: DEFAULT_WORKER_QUEUE,
            acceptor_grace_ms: DEFAULT_ACCEPTOR_GRACE_MS,
            worker_grace_ms: DEFAULT_WORKER_GRACE_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Checks the values the daemon cannot run without.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.listener_port <= RESERVED_PORT_CEILING {
            return Err(ConfigError::PortOutOfRange {
                port: self.listener_port,
            });
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.worker_queue == 0 {
            return Err(ConfigError::EmptyQueue);
        }
        Ok(())
    }

    /// Accept timeout; `None` means accept blocks until a peer connects.
    #[must_use]
    pub fn accept_timeout(&self) -> Option<Duration> {
        accept_timeout_from_millis(self.accept_timeout_ms)
    }

    /// Per-phase shutdown wait for the accept thread.
    #[must_use]
    pub const fn acceptor_grace(&self) -> Duration {
        Duration::from_millis(self.acceptor_grace_ms)
    }

    /// Per-phase shutdown wait for the worker pool.
    #[must_use]
    pub const fn worker_grace(&self) -> Duration {
        Duration::from_millis(self.worker_grace_ms)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
