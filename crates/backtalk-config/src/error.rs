use thiserror::Error;

use crate::defaults::RESERVED_PORT_CEILING;

/// Errors raised while validating configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The listener port falls inside the reserved range.
    #[error("listener port {port} must exceed {ceiling}", ceiling = RESERVED_PORT_CEILING)]
    PortOutOfRange {
        /// Rejected port.
        port: u16,
    },
    /// The worker pool was configured without threads.
    #[error("worker_threads must be greater than zero")]
    NoWorkers,
    /// The pending-connection queue was configured with zero capacity.
    #[error("worker_queue must be greater than zero")]
    EmptyQueue,
    /// A listener property carried a value that is not an integer in range.
    #[error("property '{key}' has invalid value '{value}'")]
    InvalidProperty {
        /// Property key.
        key: String,
        /// Raw value supplied for the key.
        value: String,
    },
}
