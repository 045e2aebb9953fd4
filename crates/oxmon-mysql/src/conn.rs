//! Connections to the monitored MySQL server: account provisioning,
//! connectivity checks and identity facts.

use crate::dsn::{Dsn, DEFAULT_PORT};
use crate::error::{MySqlError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::time::Duration;

/// Account created for the exporters and the agent when none is supplied.
pub const AGENT_USER: &str = "oxmon";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Identity facts reported by the server itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlInfo {
    pub hostname: String,
    pub port: u16,
    pub distro: String,
    pub version: String,
}

impl MySqlInfo {
    /// `@@hostname`, with `:<port>` appended unless it is the default port.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxmon_mysql::conn::MySqlInfo;
    ///
    /// let mut info = MySqlInfo {
    ///     hostname: "db1".to_string(),
    ///     port: 3306,
    ///     distro: String::new(),
    ///     version: String::new(),
    /// };
    /// assert_eq!(info.instance_name(), "db1");
    /// info.port = 3307;
    /// assert_eq!(info.instance_name(), "db1:3307");
    /// ```
    pub fn instance_name(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.hostname.clone()
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }
}

/// Administrator connection plus how to obtain the agent's account.
pub struct MySqlConn {
    user_dsn: Dsn,
    agent_credentials: Option<(String, String)>,
    max_user_connections: u32,
}

impl MySqlConn {
    pub fn new(user_dsn: Dsn, agent_credentials: Option<(String, String)>, max_user_connections: u32) -> Self {
        Self {
            user_dsn,
            agent_credentials,
            max_user_connections,
        }
    }

    /// DSN the agent and exporters use. Given agent credentials are only
    /// verified; otherwise the `oxmon` account is (re)provisioned with a
    /// fresh password.
    pub async fn agent_dsn(&self) -> Result<Dsn> {
        match &self.agent_credentials {
            Some((user, password)) => {
                let dsn = self.user_dsn.with_credentials(user, password);
                test_connection(&dsn).await?;
                Ok(dsn)
            }
            None => self.create_agent_user().await,
        }
    }

    async fn create_agent_user(&self) -> Result<Dsn> {
        let db = connect(&self.user_dsn).await?;
        let password = uuid::Uuid::new_v4().simple().to_string();
        let agent = self.user_dsn.with_credentials(AGENT_USER, &password);

        let mut hosts = vec![agent.grant_host().to_string()];
        // The driver resolves localhost to 127.0.0.1, which a grant @localhost does not match.
        if agent.hostname == crate::dsn::DEFAULT_HOST && agent.socket.is_none() {
            hosts.push("127.0.0.1".to_string());
        }

        for host in &hosts {
            for statement in make_grants(AGENT_USER, host, &password, self.max_user_connections) {
                db.execute_unprepared(&statement)
                    .await
                    .map_err(|source| MySqlError::Grant {
                        statement: statement.replace(&password, "***"),
                        source,
                    })?;
            }
            tracing::info!(user = AGENT_USER, host = %host, "MySQL agent account provisioned");
        }
        db.close().await?;

        test_connection(&agent).await?;
        Ok(agent)
    }

    /// Identity facts of the server behind `dsn`.
    pub async fn info(&self, dsn: &Dsn) -> Result<MySqlInfo> {
        let db = connect(dsn).await?;
        let row = db
            .query_one(Statement::from_string(
                DbBackend::MySql,
                "SELECT @@hostname AS hostname, CAST(@@port AS CHAR) AS port, \
                 @@version_comment AS distro, @@version AS version",
            ))
            .await?
            .ok_or_else(|| MySqlError::InvalidDsn(format!("{} returned no server info", dsn.hide_password())))?;

        let hostname: String = row.try_get("", "hostname")?;
        let port: String = row.try_get("", "port")?;
        let distro: String = row.try_get("", "distro")?;
        let version: String = row.try_get("", "version")?;
        db.close().await?;

        let port = port
            .parse()
            .map_err(|_| MySqlError::InvalidDsn(format!("server reported port '{port}'")))?;
        Ok(MySqlInfo {
            hostname,
            port,
            distro,
            version,
        })
    }

    pub fn user_dsn(&self) -> &Dsn {
        &self.user_dsn
    }
}

async fn connect(dsn: &Dsn) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(dsn.connection_url());
    opts.max_connections(1)
        .connect_timeout(CONNECT_TIMEOUT)
        .sqlx_logging(false);
    Database::connect(opts).await.map_err(|source| MySqlError::Connect {
        dsn: dsn.hide_password(),
        source,
    })
}

/// Opens a connection and pings the server.
pub async fn test_connection(dsn: &Dsn) -> Result<()> {
    let db = connect(dsn).await?;
    db.ping().await.map_err(|source| MySqlError::Connect {
        dsn: dsn.hide_password(),
        source,
    })?;
    db.close().await?;
    Ok(())
}

/// Statements that create or update `user@host` with the privileges the
/// exporters and the query collector need.
pub fn make_grants(user: &str, host: &str, password: &str, max_user_connections: u32) -> Vec<String> {
    let account = format!("'{}'@'{}'", escape(user), escape(host));
    let password = escape(password);
    vec![
        format!(
            "CREATE USER IF NOT EXISTS {account} IDENTIFIED BY '{password}' \
             WITH MAX_USER_CONNECTIONS {max_user_connections}"
        ),
        format!("ALTER USER {account} IDENTIFIED BY '{password}' WITH MAX_USER_CONNECTIONS {max_user_connections}"),
        format!("GRANT SUPER, PROCESS, USAGE, SELECT ON *.* TO {account}"),
        format!("GRANT UPDATE, DELETE, DROP ON performance_schema.* TO {account}"),
    ]
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_cover_global_and_performance_schema() {
        let grants = make_grants("oxmon", "localhost", "pw", 5);
        assert_eq!(grants.len(), 4);
        assert!(grants[0].starts_with("CREATE USER IF NOT EXISTS 'oxmon'@'localhost'"));
        assert!(grants[0].ends_with("WITH MAX_USER_CONNECTIONS 5"));
        assert_eq!(grants[2], "GRANT SUPER, PROCESS, USAGE, SELECT ON *.* TO 'oxmon'@'localhost'");
        assert_eq!(grants[3], "GRANT UPDATE, DELETE, DROP ON performance_schema.* TO 'oxmon'@'localhost'");
    }

    #[test]
    fn grants_escape_quotes() {
        let grants = make_grants("oxmon", "%", "it's", 10);
        assert!(grants[1].contains("IDENTIFIED BY 'it\\'s'"));
    }
}
