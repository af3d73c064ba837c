//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;

use backtalk_config::Config;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::transport::{AcceptorError, StopReport};

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The listener is accepting on the address.
    ListenerReady(SocketAddr),
    /// Starting or reconfiguring the listener failed.
    ListenerFailed(String),
    /// The listener stopped; `true` when nothing was detached.
    ListenerStopped(bool),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Every address reported ready, oldest first.
    #[must_use]
    pub fn ready_addresses(&self) -> Vec<SocketAddr> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::ListenerReady(addr) => Some(addr),
                _ => None,
            })
            .collect()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_ready(&self, addr: SocketAddr) {
        self.record(HealthEvent::ListenerReady(addr));
    }

    fn listener_failed(&self, error: &AcceptorError) {
        self.record(HealthEvent::ListenerFailed(error.to_string()));
    }

    fn listener_stopped(&self, report: &StopReport) {
        self.record(HealthEvent::ListenerStopped(report.is_complete()));
    }
}
