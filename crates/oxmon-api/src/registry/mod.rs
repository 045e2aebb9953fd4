//! Service registry: which addresses the monitoring server scrapes.
//!
//! Two deployment generations exist, a Prometheus host list and a Consul
//! catalog. Both implement [`ServiceRegistry`] and share its contract:
//! registering a `(name, kind)` that already points at the same address is
//! a success, registering it at another address is
//! [`AdminError::HostConflict`], and removing something that is not there
//! is a no-op.

pub mod catalog;
pub mod host_list;

use crate::endpoints::Endpoints;
use crate::error::{AdminError, Result};
use crate::transport::ApiClient;
use async_trait::async_trait;
use oxmon_common::types::{InstanceKind, RegistryEntry};
use serde::{Deserialize, Serialize};

/// Outcome of a successful [`ServiceRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    /// The same name was already registered at the same address.
    AlreadyRegistered,
}

/// Outcome of a successful [`ServiceRegistry::deregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deregistration {
    Removed,
    NotFound,
}

/// Which registry generation the monitoring server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistryKind {
    #[default]
    HostList,
    Catalog,
}

impl std::fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryKind::HostList => write!(f, "host-list"),
            RegistryKind::Catalog => write!(f, "catalog"),
        }
    }
}

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Registry generation name, used for logging.
    fn name(&self) -> &str;

    /// Base URL checked by `check-network`.
    fn health_url(&self) -> String;

    /// Registers `entry`, resolving a same-address conflict as success.
    ///
    /// # Errors
    ///
    /// [`AdminError::HostConflict`] if the name is registered at another
    /// address; transport and status errors otherwise.
    async fn register(&self, entry: &RegistryEntry) -> Result<Registration>;

    /// Removes the `(name, kind)` registration. Not-found is not an error.
    async fn deregister(&self, name: &str, kind: InstanceKind) -> Result<Deregistration>;

    async fn lookup(&self, name: &str, kind: InstanceKind) -> Result<Option<RegistryEntry>>;

    /// Every registration the registry holds, across all hosts.
    async fn list(&self) -> Result<Vec<RegistryEntry>>;
}

/// Builds the registry client for the configured generation.
pub fn build_registry(kind: RegistryKind, api: ApiClient, endpoints: &Endpoints) -> Box<dyn ServiceRegistry> {
    match kind {
        RegistryKind::HostList => Box::new(host_list::HostListRegistry::new(api, &endpoints.registry)),
        RegistryKind::Catalog => Box::new(catalog::CatalogRegistry::new(api, &endpoints.registry)),
    }
}

/// Decides a duplicate-name registration against what the registry holds.
pub(crate) fn resolve_existing(entry: &RegistryEntry, existing: &RegistryEntry) -> Result<Registration> {
    if existing.address == entry.address {
        tracing::info!(
            name = %entry.name,
            kind = %entry.kind,
            address = %entry.address,
            "Already registered at this address"
        );
        return Ok(Registration::AlreadyRegistered);
    }
    Err(AdminError::HostConflict {
        name: entry.name.clone(),
        kind: entry.kind,
        existing: existing.address.clone(),
        requested: entry.address.clone(),
    })
}
