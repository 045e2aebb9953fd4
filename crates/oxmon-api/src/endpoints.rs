use crate::registry::RegistryKind;
use oxmon_common::ports;

/// Base addresses (`host:port`) of every backend the orchestrator talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub qan_api: String,
    pub registry: String,
    pub agent_api: String,
    pub metrics_api: String,
}

impl Endpoints {
    /// Derives the server-side endpoints from the configured server address.
    /// An explicit port on `server` applies to the query-analytics API only.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxmon_api::endpoints::Endpoints;
    /// use oxmon_api::registry::RegistryKind;
    ///
    /// let ep = Endpoints::from_server("10.0.0.1", RegistryKind::Catalog);
    /// assert_eq!(ep.qan_api, "10.0.0.1:9001");
    /// assert_eq!(ep.registry, "10.0.0.1:8500");
    /// assert_eq!(ep.agent_api, "localhost:9000");
    ///
    /// let ep = Endpoints::from_server("http://10.0.0.1:8080", RegistryKind::HostList);
    /// assert_eq!(ep.qan_api, "10.0.0.1:8080");
    /// assert_eq!(ep.registry, "10.0.0.1:9003");
    /// ```
    pub fn from_server(server: &str, registry: RegistryKind) -> Self {
        let server = server.strip_prefix("http://").unwrap_or(server).trim_end_matches('/');
        let (host, explicit_port) = split_port(server);
        let qan_api = match explicit_port {
            Some(_) => server.to_string(),
            None => format!("{host}:{}", ports::QAN_API_PORT),
        };
        let registry_port = match registry {
            RegistryKind::HostList => ports::HOST_LIST_REGISTRY_PORT,
            RegistryKind::Catalog => ports::CATALOG_REGISTRY_PORT,
        };

        Self {
            qan_api,
            registry: format!("{host}:{registry_port}"),
            agent_api: format!("localhost:{}", ports::AGENT_API_PORT),
            metrics_api: format!("localhost:{}", ports::METRICS_API_PORT),
        }
    }

    /// Every backend at one address.
    pub fn single(addr: &str) -> Self {
        Self {
            qan_api: addr.to_string(),
            registry: addr.to_string(),
            agent_api: addr.to_string(),
            metrics_api: addr.to_string(),
        }
    }
}

fn split_port(addr: &str) -> (&str, Option<u16>) {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.ends_with(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (addr, None),
        },
        _ => (addr, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_port_ignores_non_numeric_suffix() {
        assert_eq!(split_port("monitor.local"), ("monitor.local", None));
        assert_eq!(split_port("monitor.local:9001"), ("monitor.local", Some(9001)));
        assert_eq!(split_port("monitor.local:abc"), ("monitor.local:abc", None));
    }
}
