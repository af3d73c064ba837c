//! Protocol-routing super-server.
//!
//! One listening port is shared by any number of services. Every connection
//! opens with a single header line naming a service and version; the daemon
//! answers `proceed` and hands the live socket to the handler registered for
//! that pair, or answers `no such service` and closes it.
//!
//! The pieces are layered bottom-up:
//!
//! - [`header`] parses the handshake line into a [`header::Header`].
//! - [`registry`] maps (service, version) to a [`handler::Handler`] and
//!   accepts binds and unbinds while connections are live.
//! - [`dispatch`] runs the per-connection handshake.
//! - [`transport`] owns the listening socket, the accept thread and the
//!   bounded worker pool, including reconfiguration and two-phase shutdown.
//!
//! [`run_daemon`] wires these together with layered configuration from
//! [`backtalk_config`], structured telemetry and POSIX signal handling.

mod bootstrap;
pub mod dispatch;
pub mod handler;
mod health;
pub mod header;
mod process;
pub mod registry;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    ControlSignal, LaunchError, SignalError, SignalSource, SystemSignals, run_daemon,
    run_daemon_with,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
