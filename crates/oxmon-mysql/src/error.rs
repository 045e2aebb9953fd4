use sea_orm::DbErr;

/// Errors raised while connecting to or preparing a MySQL server.
///
/// DSNs carried in errors always have their password hidden.
///
/// # Examples
///
/// ```rust
/// use oxmon_mysql::error::MySqlError;
///
/// let err = MySqlError::InvalidDsn("port 'abc' is not a number".to_string());
/// assert!(err.to_string().contains("abc"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MySqlError {
    #[error("cannot connect to MySQL {dsn}: {source}")]
    Connect {
        dsn: String,
        #[source]
        source: DbErr,
    },

    /// A user provisioning statement failed. The statement has its password hidden.
    #[error("cannot execute {statement}: {source}")]
    Grant {
        statement: String,
        #[source]
        source: DbErr,
    },

    #[error("MySQL query failed: {0}")]
    Query(#[from] DbErr),

    #[error("cannot read defaults file {path}: {source}")]
    DefaultsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid MySQL connection parameters: {0}")]
    InvalidDsn(String),
}

pub type Result<T> = std::result::Result<T, MySqlError>;
