//! Client for the local exporter process manager.
//!
//! Exactly one exporter may run per `(name, port)`. A start that hits an
//! already-running process stops it and retries once; a second failure is
//! returned as-is.

pub mod profiles;

use crate::error::{AdminError, Result};
use crate::transport::ApiClient;
use oxmon_common::types::Exporter;
use reqwest::StatusCode;

/// Outcome of a successful [`ExporterManager::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterStop {
    Stopped,
    NotRunning,
}

/// Progress of one start request. `Retrying` can only be entered from
/// `ConflictDetected`, which bounds the sequence to two POSTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartState {
    Starting,
    ConflictDetected,
    Retrying,
    Started,
}

pub struct ExporterManager {
    api: ApiClient,
    addr: String,
}

impl ExporterManager {
    pub fn new(api: ApiClient, addr: &str) -> Self {
        Self {
            api,
            addr: addr.to_string(),
        }
    }

    /// Starts `exporter`, replacing a process already bound to its identity.
    ///
    /// # Errors
    ///
    /// Returns the first non-conflict failure, a failure of the stop, or any
    /// failure of the single retry.
    pub async fn start(&self, exporter: &Exporter) -> Result<()> {
        let url = ApiClient::url(&self.addr, &[]);
        let mut state = StartState::Starting;

        loop {
            state = match state {
                StartState::Starting => {
                    let resp = self.api.post_json(&url, exporter).await?;
                    match resp.status {
                        StatusCode::CREATED => StartState::Started,
                        StatusCode::CONFLICT => StartState::ConflictDetected,
                        status => {
                            return Err(AdminError::unexpected("(1) POST", &url, status.as_u16(), 201, &resp.body))
                        }
                    }
                }
                StartState::ConflictDetected => {
                    tracing::warn!(
                        name = %exporter.name,
                        port = exporter.port,
                        "Exporter already running, restarting it"
                    );
                    self.stop(&exporter.name, exporter.port).await?;
                    StartState::Retrying
                }
                StartState::Retrying => {
                    let resp = self.api.post_json(&url, exporter).await?;
                    match resp.status {
                        StatusCode::CREATED => StartState::Started,
                        status => {
                            return Err(AdminError::unexpected("(2) POST", &url, status.as_u16(), 201, &resp.body))
                        }
                    }
                }
                StartState::Started => {
                    tracing::info!(
                        name = %exporter.name,
                        port = exporter.port,
                        alias = %exporter.alias,
                        "Exporter started"
                    );
                    return Ok(());
                }
            };
        }
    }

    /// Stops the exporter at `(name, port)`. Not running is not an error.
    pub async fn stop(&self, name: &str, port: u16) -> Result<ExporterStop> {
        let port = port.to_string();
        let url = ApiClient::url(&self.addr, &[name, &port]);
        let resp = self.api.delete(&url).await?;
        match resp.status {
            StatusCode::OK => {
                tracing::info!(name = %name, port = %port, "Exporter stopped");
                Ok(ExporterStop::Stopped)
            }
            StatusCode::NOT_FOUND => {
                tracing::warn!(name = %name, port = %port, "Exporter not running");
                Ok(ExporterStop::NotRunning)
            }
            status => Err(AdminError::unexpected("DELETE", &url, status.as_u16(), 200, &resp.body)),
        }
    }

    /// Stops `name` on every port in order, aborting at the first failure.
    pub async fn stop_all(&self, name: &str, ports: &[u16]) -> Result<()> {
        for port in ports {
            self.stop(name, *port).await?;
        }
        Ok(())
    }
}
