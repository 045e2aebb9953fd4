//! Adds, removes and lists the instances this host exposes to the
//! monitoring server.

pub mod admin;
pub mod config;
pub mod list;

pub use admin::{Admin, MongoDbInstance, MySqlInstance};
pub use config::LocalConfig;
