use std::time::Duration;

/// Default interface the listener binds to.
pub const DEFAULT_LISTENER_HOST: &str = "0.0.0.0";

/// Default TCP port shared by every registered service.
pub const DEFAULT_LISTENER_PORT: u16 = 7707;

/// Lowest port the listener refuses; configured ports must exceed it.
pub const RESERVED_PORT_CEILING: u16 = 1024;

/// Default accept timeout in milliseconds.
pub const DEFAULT_ACCEPT_TIMEOUT_MS: u64 = 1_000;

/// Default number of handshake worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 16;

/// Default depth of the pending-connection queue.
pub const DEFAULT_WORKER_QUEUE: usize = 64;

/// Default per-phase wait for the accept thread during shutdown.
pub const DEFAULT_ACCEPTOR_GRACE_MS: u64 = 1_000;

/// Default per-phase wait for the worker pool during shutdown.
pub const DEFAULT_WORKER_GRACE_MS: u64 = 5_000;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default listener host.
pub fn default_listener_host() -> String {
    DEFAULT_LISTENER_HOST.to_owned()
}

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Converts a millisecond setting into an accept timeout.
///
/// Zero disables the timeout so the accept call blocks until a peer arrives.
pub fn accept_timeout_from_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}
