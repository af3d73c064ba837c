//! Daemon bootstrap orchestration.

use std::net::SocketAddr;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use backtalk_config::{Config, ConfigError, ListenerUpdate};

use crate::dispatch::Dispatcher;
use crate::handler::EchoHandler;
use crate::health::HealthReporter;
use crate::registry::{Registry, RegistryError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{
    Acceptor, AcceptorError, AcceptorSettings, PoolError, StopReport, WorkerPool,
};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that always yields the same configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but holds unusable values.
    #[error("invalid configuration: {source}")]
    Invalid {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A built-in handler could not be registered.
    #[error("failed to register built-in handler: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
    /// The worker pool could not be started.
    #[error("failed to start worker pool: {source}")]
    WorkerPool {
        /// Underlying pool error.
        #[source]
        source: PoolError,
    },
    /// The acceptor rejected its collaborators.
    #[error("failed to prepare acceptor: {source}")]
    Acceptor {
        /// Underlying acceptor error.
        #[source]
        source: AcceptorError,
    },
}

/// Result of a successful bootstrap invocation.
///
/// The acceptor is wired but idle; [`Daemon::start`] opens the listener.
pub struct Daemon {
    config: Config,
    registry: Arc<Registry>,
    acceptor: Acceptor,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Registry shared with every handshake.
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Address the acceptor is listening on.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor.local_addr()
    }

    /// Returns `true` while connections are being accepted.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.acceptor.is_listening()
    }

    /// Starts accepting connections.
    ///
    /// # Errors
    ///
    /// Propagates [`AcceptorError`] after reporting it.
    pub fn start(&mut self) -> Result<(), AcceptorError> {
        match self.acceptor.start() {
            Ok(()) => {
                if let Some(addr) = self.acceptor.local_addr() {
                    self.reporter.listener_ready(addr);
                }
                Ok(())
            }
            Err(error) => {
                self.reporter.listener_failed(&error);
                Err(error)
            }
        }
    }

    /// Applies the listener settings of a freshly loaded configuration.
    ///
    /// A changed port or accept timeout rebinds the listener; a listener that
    /// stopped after a socket error is started again. Other settings only
    /// take effect on the next launch. Returns `true` when the listener was
    /// rebound or restarted.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptorError::Update`] for an invalid configuration and
    /// propagates rebind failures, reporting both.
    pub fn reload(&mut self, config: Config) -> Result<bool, AcceptorError> {
        let result = self.apply(&config);
        match &result {
            Ok(_) => self.config = config,
            Err(error) => self.reporter.listener_failed(error),
        }
        result
    }

    fn apply(&mut self, config: &Config) -> Result<bool, AcceptorError> {
        config.validate()?;
        let rebound = self.acceptor.rebind(ListenerUpdate::from_config(config))?;
        if self.acceptor.is_listening() {
            if rebound && let Some(addr) = self.acceptor.local_addr() {
                self.reporter.listener_ready(addr);
            }
            return Ok(rebound);
        }
        self.acceptor.start()?;
        if let Some(addr) = self.acceptor.local_addr() {
            self.reporter.listener_ready(addr);
        }
        Ok(true)
    }

    /// Stops the acceptor and worker pool and reports the outcome.
    pub fn shutdown(mut self) -> StopReport {
        let report = self.acceptor.stop();
        self.reporter.listener_stopped(&report);
        report
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// Loads and validates the configuration, installs telemetry, binds the
/// built-in echo service and wires the worker pool and dispatcher into an
/// idle acceptor.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first step that fails, after passing it
/// to `reporter`.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match assemble(loader) {
        Ok((config, registry, acceptor, telemetry)) => {
            reporter.bootstrap_succeeded(&config);
            Ok(Daemon {
                config,
                registry,
                acceptor,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn assemble(
    loader: &dyn ConfigLoader,
) -> Result<(Config, Arc<Registry>, Acceptor, TelemetryHandle), BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .validate()
        .map_err(|source| BootstrapError::Invalid { source })?;

    let registry = Arc::new(Registry::new());
    registry
        .bind_service(
            Arc::new(EchoHandler),
            EchoHandler::SERVICE,
            EchoHandler::VERSION,
        )
        .map_err(|source| BootstrapError::Registry { source })?;

    let pool = WorkerPool::new(config.worker_threads, config.worker_queue)
        .map_err(|source| BootstrapError::WorkerPool { source })?;
    let mut acceptor = Acceptor::new(AcceptorSettings::from_config(&config));
    acceptor
        .set_worker_pool(Arc::new(pool))
        .map_err(|source| BootstrapError::Acceptor { source })?;
    acceptor
        .bind_dispatcher(Dispatcher::new(Arc::clone(&registry)))
        .map_err(|source| BootstrapError::Acceptor { source })?;

    Ok((config, registry, acceptor, telemetry))
}
