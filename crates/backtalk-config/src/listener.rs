//! Property-map surface for live listener reconfiguration.
//!
//! Reconfiguration requests arrive as loose string maps, the same shape the
//! handler registry consumes. Only two keys are recognised; every other key
//! is ignored so callers can pass their whole property set through.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::str::FromStr;
use std::time::Duration;

use crate::defaults::accept_timeout_from_millis;
use crate::error::ConfigError;
use crate::Config;

/// Property key carrying the listener port.
pub const LISTENER_PORT_PROPERTY: &str = "listenerport";

/// Property key carrying the accept timeout in milliseconds.
pub const ACCEPT_TIMEOUT_PROPERTY: &str = "accepttimeout";

/// Requested changes to the listener socket.
///
/// `accept_timeout` is doubly optional: the outer layer records whether the
/// timeout was mentioned at all, the inner one carries the "block forever"
/// setting produced by a zero value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerUpdate {
    /// New listener port, when supplied.
    pub port: Option<u16>,
    /// New accept timeout, when supplied.
    pub accept_timeout: Option<Option<Duration>>,
}

impl ListenerUpdate {
    /// Extracts `listenerport` and `accepttimeout` from a property map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProperty`] when a recognised key holds a
    /// value that is not an unsigned integer in range.
    pub fn from_properties<S: BuildHasher>(
        properties: &HashMap<String, String, S>,
    ) -> Result<Self, ConfigError> {
        let port = parse_property::<u16, S>(properties, LISTENER_PORT_PROPERTY)?;
        let accept_timeout = parse_property::<u64, S>(properties, ACCEPT_TIMEOUT_PROPERTY)?
            .map(accept_timeout_from_millis);
        Ok(Self {
            port,
            accept_timeout,
        })
    }

    /// Builds an update carrying every listener value from a configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: Some(config.listener_port),
            accept_timeout: Some(config.accept_timeout()),
        }
    }

    /// Returns `true` when the update names neither key.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.port.is_none() && self.accept_timeout.is_none()
    }
}

fn parse_property<T: FromStr, S: BuildHasher>(
    properties: &HashMap<String, String, S>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    properties
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidProperty {
                    key: key.to_owned(),
                    value: raw.clone(),
                })
        })
        .transpose()
}
