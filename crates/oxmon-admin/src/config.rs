use anyhow::Context;
use oxmon_api::error::AdminError;
use oxmon_api::registry::RegistryKind;
use oxmon_api::Endpoints;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/oxmon/admin.toml";

/// What this host knows about itself and its monitoring server.
///
/// Loaded once per command and written back after a successful change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub client_address: String,
    /// UUID of this host's OS instance.
    #[serde(default)]
    pub client_uuid: String,
    #[serde(default)]
    pub server_address: String,
    #[serde(default)]
    pub registry: RegistryKind,
    /// Per-request timeout for every backend call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            client_address: String::new(),
            client_uuid: String::new(),
            server_address: String::new(),
            registry: RegistryKind::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LocalConfig {
    /// Loads the config at `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, starting empty");
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))?;
        Ok(config)
    }

    /// Rewrites the whole file, creating its directory if needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn require_server(&self) -> Result<&str, AdminError> {
        if self.server_address.is_empty() {
            return Err(AdminError::ServerNotSet);
        }
        Ok(&self.server_address)
    }

    pub fn require_client(&self) -> Result<&str, AdminError> {
        if self.client_address.is_empty() {
            return Err(AdminError::ClientNotSet);
        }
        Ok(&self.client_address)
    }

    pub fn endpoints(&self) -> Result<Endpoints, AdminError> {
        Ok(Endpoints::from_server(self.require_server()?, self.registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = LocalConfig::load(&dir.path().join("admin.toml")).unwrap();
        assert_eq!(config, LocalConfig::default());
        assert_eq!(config.timeout_secs, 5);
        assert!(matches!(config.require_server(), Err(AdminError::ServerNotSet)));
    }

    #[test]
    fn save_then_load_keeps_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("admin.toml");
        let config = LocalConfig {
            client_address: "10.0.0.5".to_string(),
            client_uuid: "os-uuid".to_string(),
            server_address: "10.0.0.1".to_string(),
            registry: RegistryKind::Catalog,
            timeout_secs: 10,
        };
        config.save(&path).unwrap();
        assert_eq!(LocalConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.toml");
        std::fs::write(&path, "server_address = \"monitor.local\"\n").unwrap();

        let config = LocalConfig::load(&path).unwrap();
        assert_eq!(config.registry, RegistryKind::HostList);
        assert_eq!(config.endpoints().unwrap().registry, "monitor.local:9003");
        assert!(matches!(config.require_client(), Err(AdminError::ClientNotSet)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"\n").unwrap();
        assert!(LocalConfig::load(&path).is_err());
    }
}
