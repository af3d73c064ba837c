//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::{Arc, Mutex};

use ortho_config::{OrthoConfig, OrthoError};

use backtalk_config::Config;

use crate::bootstrap::ConfigLoader;
use crate::transport::free_port;

/// Loopback configuration on a free port with short shutdown waits.
#[must_use]
pub fn loopback_config() -> Config {
    Config {
        listener_host: "127.0.0.1".to_owned(),
        listener_port: free_port(),
        accept_timeout_ms: 50,
        worker_threads: 2,
        worker_queue: 4,
        acceptor_grace_ms: 500,
        worker_grace_ms: 500,
        log_filter: "warn".to_owned(),
        ..Config::default()
    }
}

/// Loader whose configuration can be changed between loads.
#[derive(Debug, Clone)]
pub struct TestConfigLoader {
    config: Arc<Mutex<Config>>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Arc::new(Mutex::new(loopback_config())),
        }
    }

    /// Applies `change` to the configuration served by later loads.
    pub fn update(&self, change: impl FnOnce(&mut Config)) {
        change(&mut self.config.lock().expect("loader mutex poisoned"));
    }

    /// Configuration the next load will return.
    #[must_use]
    pub fn current(&self) -> Config {
        self.config.lock().expect("loader mutex poisoned").clone()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.current())
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("backtalkd"),
            OsString::from("--listener-port"),
            OsString::from("not-a-port"),
        ];
        Config::load_from_iter(args)
    }
}
