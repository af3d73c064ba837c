//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use backtalk_config::Config;

use crate::bootstrap::BootstrapError;
use crate::transport::{AcceptorError, StopReport};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the acceptor is accepting connections.
    fn listener_ready(&self, addr: SocketAddr);

    /// Invoked when starting or reconfiguring the acceptor fails.
    fn listener_failed(&self, error: &AcceptorError);

    /// Invoked after the acceptor and worker pool have stopped.
    fn listener_stopped(&self, report: &StopReport);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_ready(&self, addr: SocketAddr) {
        (**self).listener_ready(addr);
    }

    fn listener_failed(&self, error: &AcceptorError) {
        (**self).listener_failed(error);
    }

    fn listener_stopped(&self, report: &StopReport) {
        (**self).listener_stopped(report);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            host = %config.listener_host,
            port = config.listener_port,
            workers = config.worker_threads,
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn listener_ready(&self, addr: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            addr = %addr,
            "accepting connections"
        );
    }

    fn listener_failed(&self, error: &AcceptorError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "listener_failed",
            error = %error,
            "listener unavailable"
        );
    }

    fn listener_stopped(&self, report: &StopReport) {
        if report.is_complete() {
            tracing::info!(
                target: HEALTH_TARGET,
                event = "listener_stopped",
                acceptor = ?report.acceptor.outcome(),
                workers = ?report.workers.outcome(),
                "listener stopped"
            );
        } else {
            tracing::error!(
                target: HEALTH_TARGET,
                event = "listener_stopped",
                acceptor = ?report.acceptor.outcome(),
                workers = ?report.workers.outcome(),
                "listener stopped with threads still running"
            );
        }
    }
}
