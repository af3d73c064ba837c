//! Live table of (service, version) → handler bindings.
//!
//! Registrations are kept in bind order behind a single mutex. Keys compare
//! ASCII-case-insensitively and each key is bound at most once: the first
//! registrant wins and later binds for the same key are ignored.

mod errors;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::handler::{HandlerRef, same_handler};

pub use self::errors::RegistryError;

/// Property key naming the service a handler serves.
pub const SERVICE_NAME_KEY: &str = "__SERVICE__";

/// Property key naming the service version a handler serves.
pub const SERVICE_VERSION_KEY: &str = "__VERSION__";

/// Registration properties; keys other than the two service keys are payload.
pub type Properties = HashMap<String, String>;

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Outcome of [`Registry::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// A new registration was appended.
    Bound,
    /// The key already had a registration; nothing changed.
    AlreadyBound,
}

/// A handler bound under a service key.
#[derive(Clone)]
pub struct Registration {
    handler: HandlerRef,
    service: String,
    version: String,
    properties: Properties,
}

impl Registration {
    /// Bound handler.
    #[must_use]
    pub const fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Service name as registered.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Service version as registered.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Full property map supplied at bind time.
    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    fn matches(&self, service: &str, version: &str) -> bool {
        self.service.eq_ignore_ascii_case(service) && self.version.eq_ignore_ascii_case(version)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Registration")
            .field("service", &self.service)
            .field("version", &self.version)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// Handler registry shared between binders and handshake workers.
#[derive(Debug, Default)]
pub struct Registry {
    registrations: Mutex<Vec<Registration>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` under the service keys found in `properties`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingProperty`] when either service key is
    /// absent.
    pub fn bind(
        &self,
        handler: HandlerRef,
        properties: &Properties,
    ) -> Result<BindOutcome, RegistryError> {
        let (service, version) = service_key(properties)?;
        let mut registrations = self.lock();
        if registrations
            .iter()
            .any(|registration| registration.matches(service, version))
        {
            debug!(
                target: REGISTRY_TARGET,
                service,
                version,
                "service already bound; keeping first registration"
            );
            return Ok(BindOutcome::AlreadyBound);
        }

        registrations.push(Registration {
            handler,
            service: service.to_owned(),
            version: version.to_owned(),
            properties: properties.clone(),
        });
        info!(target: REGISTRY_TARGET, service, version, "handler bound");
        Ok(BindOutcome::Bound)
    }

    /// Binds `handler` under an explicit service key.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature mirrors [`Registry::bind`].
    pub fn bind_service(
        &self,
        handler: HandlerRef,
        service: &str,
        version: &str,
    ) -> Result<BindOutcome, RegistryError> {
        self.bind(handler, &service_properties(service, version))
    }

    /// Removes the registration bound under the service keys in `properties`.
    ///
    /// Matching is by key alone: the registration is removed even when it
    /// holds a different handler from `_handler`. Missing keys or an unbound
    /// key leave the registry untouched.
    pub fn unbind(&self, _handler: &HandlerRef, properties: &Properties) -> Option<Registration> {
        let (service, version) = service_key(properties).ok()?;
        let mut registrations = self.lock();
        let position = registrations
            .iter()
            .position(|registration| registration.matches(service, version))?;
        let removed = registrations.remove(position);
        info!(target: REGISTRY_TARGET, service, version, "handler unbound");
        Some(removed)
    }

    /// Returns `true` when `handler` itself is the handler bound under the
    /// service keys in `properties`.
    #[must_use]
    pub fn is_bound(&self, handler: &HandlerRef, properties: &Properties) -> bool {
        let Ok((service, version)) = service_key(properties) else {
            return false;
        };
        self.lookup(service, version)
            .is_some_and(|bound| same_handler(&bound, handler))
    }

    /// Finds the handler bound for `service` and `version`.
    #[must_use]
    pub fn lookup(&self, service: &str, version: &str) -> Option<HandlerRef> {
        self.lock()
            .iter()
            .find(|registration| registration.matches(service, version))
            .map(|registration| HandlerRef::clone(&registration.handler))
    }

    /// Snapshot of the bound (service, version) pairs, in bind order.
    #[must_use]
    pub fn services(&self) -> Vec<(String, String)> {
        self.lock()
            .iter()
            .map(|registration| (registration.service.clone(), registration.version.clone()))
            .collect()
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Every mutation leaves the list consistent, so a poisoned lock is safe
    // to reuse.
    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds the property map naming `service` and `version`.
#[must_use]
pub fn service_properties(service: &str, version: &str) -> Properties {
    Properties::from([
        (SERVICE_NAME_KEY.to_owned(), service.to_owned()),
        (SERVICE_VERSION_KEY.to_owned(), version.to_owned()),
    ])
}

fn service_key(properties: &Properties) -> Result<(&str, &str), RegistryError> {
    let service = property(properties, SERVICE_NAME_KEY)?;
    let version = property(properties, SERVICE_VERSION_KEY)?;
    Ok((service, version))
}

fn property<'a>(properties: &'a Properties, key: &'static str) -> Result<&'a str, RegistryError> {
    properties
        .get(key)
        .map(String::as_str)
        .ok_or(RegistryError::MissingProperty { key })
}
