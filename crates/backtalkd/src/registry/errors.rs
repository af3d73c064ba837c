//! Errors raised by registry bindings.

use thiserror::Error;

/// Errors surfaced while binding handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A required service property was absent.
    #[error("registration properties are missing '{key}'")]
    MissingProperty {
        /// Absent property key.
        key: &'static str,
    },
}
