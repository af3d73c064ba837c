//! Test harness utilities shared by unit and behavioural suites.

mod config_loader;
mod handler;
mod reporter;
mod signals;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader, loopback_config};
pub use handler::RecordingHandler;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{DaemonWorld, ServerWorld, StepResult, echo_round_trip, open_echo};
