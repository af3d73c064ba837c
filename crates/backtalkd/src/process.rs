//! Foreground process supervision: signal handling, reload and shutdown.

use std::io;
use std::sync::Arc;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{info, warn};

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{AcceptorError, StopReport};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Instruction delivered to the running daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Reload configuration and apply listener changes.
    Reload,
    /// Stop accepting, drain and exit.
    Terminate,
}

/// Errors reported by control signal sources.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Abstraction over control notification mechanisms.
pub trait SignalSource: Send {
    /// Blocks until the next instruction arrives.
    fn next_signal(&mut self) -> Result<ControlSignal, SignalError>;
}

/// Signal source backed by POSIX signals.
///
/// `SIGHUP` maps to [`ControlSignal::Reload`]; `SIGTERM`, `SIGINT` and
/// `SIGQUIT` map to [`ControlSignal::Terminate`].
pub struct SystemSignals {
    signals: Signals,
}

impl SystemSignals {
    /// Registers the handled signals.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Install`] when registration fails.
    pub fn new() -> Result<Self, SignalError> {
        let signals = Signals::new([SIGHUP, SIGTERM, SIGINT, SIGQUIT])
            .map_err(|source| SignalError::Install { source })?;
        Ok(Self { signals })
    }
}

impl SignalSource for SystemSignals {
    fn next_signal(&mut self) -> Result<ControlSignal, SignalError> {
        for signal in self.signals.forever() {
            let control = match signal {
                SIGHUP => ControlSignal::Reload,
                SIGTERM | SIGINT | SIGQUIT => ControlSignal::Terminate,
                _ => continue,
            };
            info!(target: PROCESS_TARGET, signal, ?control, "signal received");
            return Ok(control);
        }
        Ok(ControlSignal::Terminate)
    }
}

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// The listener could not be started.
    #[error("failed to start listener: {source}")]
    Listener {
        /// Underlying acceptor error.
        #[source]
        source: AcceptorError,
    },
    /// Waiting for control signals failed.
    #[error("failed to await control signal: {source}")]
    Signals {
        /// Underlying signal error.
        #[source]
        source: SignalError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<AcceptorError> for LaunchError {
    fn from(source: AcceptorError) -> Self {
        Self::Listener { source }
    }
}

impl From<SignalError> for LaunchError {
    fn from(source: SignalError) -> Self {
        Self::Signals { source }
    }
}

/// Runs the daemon in the foreground until a termination signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when signal handlers cannot be installed,
/// bootstrap fails or the listener cannot start.
pub fn run_daemon() -> Result<(), LaunchError> {
    // Handlers go in first so a signal during bootstrap is not lost.
    let signals = SystemSignals::new()?;
    let reporter = Arc::new(StructuredHealthReporter::new());
    run_daemon_with(&SystemConfigLoader, reporter, signals).map(|_| ())
}

/// Runs the daemon with injected collaborators.
///
/// Configuration is loaded through `loader` at start and again on every
/// [`ControlSignal::Reload`]. A reload that fails to load or apply is logged
/// and the daemon keeps running with its previous listener.
///
/// # Errors
///
/// Returns [`LaunchError`] for bootstrap, start-up and signal failures. The
/// listener is stopped before a signal failure is returned.
pub fn run_daemon_with<L, S>(
    loader: &L,
    reporter: Arc<dyn HealthReporter>,
    mut signals: S,
) -> Result<StopReport, LaunchError>
where
    L: ConfigLoader,
    S: SignalSource,
{
    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let mut daemon = bootstrap_with(loader, reporter)?;
    daemon.start()?;

    loop {
        match signals.next_signal() {
            Ok(ControlSignal::Reload) => match loader.load() {
                Ok(config) => {
                    if let Ok(changed) = daemon.reload(config) {
                        info!(target: PROCESS_TARGET, changed, "configuration reloaded");
                    }
                }
                Err(error) => warn!(
                    target: PROCESS_TARGET,
                    error = %error,
                    "configuration reload failed; keeping current settings"
                ),
            },
            Ok(ControlSignal::Terminate) => break,
            Err(error) => {
                daemon.shutdown();
                return Err(error.into());
            }
        }
    }

    let report = daemon.shutdown();
    info!(
        target: PROCESS_TARGET,
        complete = report.is_complete(),
        "shutdown sequence completed"
    );
    Ok(report)
}
