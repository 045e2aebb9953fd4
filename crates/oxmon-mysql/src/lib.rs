//! MySQL side of adding a MySQL instance: work out how to connect, make
//! sure the agent has an account, and read what the server says about itself.

pub mod conn;
pub mod dsn;
pub mod error;

pub use conn::{MySqlConn, MySqlInfo};
pub use dsn::{Dsn, DsnOverrides};
pub use error::{MySqlError, Result};
