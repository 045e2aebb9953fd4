//! Types shared by the oxmon admin crates: wire formats of the monitoring
//! backends and the domain model of a monitored instance.

pub mod ports;
pub mod types;
