//! HTTP protocols of the monitoring backends: the query-analytics API, the
//! exporter process manager, the service registry and the local agent.

pub mod agent;
pub mod endpoints;
pub mod error;
pub mod exporter;
pub mod qan;
pub mod registry;
pub mod transport;

pub use endpoints::Endpoints;
pub use error::{AdminError, Result};
pub use transport::ApiClient;
