use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use oxmon_admin::config::DEFAULT_CONFIG_PATH;
use oxmon_admin::{Admin, LocalConfig, MongoDbInstance, MySqlInstance};
use oxmon_common::types::{InstanceKind, InstanceStatus, QuerySource};
use oxmon_mysql::{Dsn, DsnOverrides, MySqlConn};
use std::path::PathBuf;

/// Manage the instances this host exposes to the oxmon monitoring server.
#[derive(Parser, Debug)]
#[command(name = "oxmon-admin", version, about)]
pub struct Cli {
    /// Local config file.
    #[arg(long, global = true, env = "OXMON_ADMIN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show or set the monitoring server address.
    Server { address: Option<String> },
    /// Show or set this host's address as seen by the server.
    Client { address: Option<String> },
    /// Add an instance and start monitoring it.
    Add(AddArgs),
    /// Stop monitoring an instance and remove it.
    #[command(visible_alias = "rm")]
    Remove { kind: KindArg, name: String },
    /// List the instances monitored on this host.
    #[command(visible_alias = "ls")]
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show this host's OS instance.
    Info,
    /// Check that the monitoring server is reachable.
    CheckNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Os,
    Mysql,
    Mongodb,
}

impl From<KindArg> for InstanceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Os => InstanceKind::Os,
            KindArg::Mysql => InstanceKind::Mysql,
            KindArg::Mongodb => InstanceKind::Mongodb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuerySourceArg {
    Auto,
    Slowlog,
    Perfschema,
}

impl From<QuerySourceArg> for QuerySource {
    fn from(source: QuerySourceArg) -> Self {
        match source {
            QuerySourceArg::Auto => QuerySource::Auto,
            QuerySourceArg::Slowlog => QuerySource::SlowLog,
            QuerySourceArg::Perfschema => QuerySource::PerfSchema,
        }
    }
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub kind: KindArg,

    /// Address of this host (OS only; defaults to the configured client address).
    pub address: Option<String>,

    /// Create the instance without starting exporters or query collection.
    #[arg(long, default_value_t = false)]
    pub no_start: bool,

    /// Instance name (MySQL and MongoDB; defaults to the server's own name).
    #[arg(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub mysql: MySqlArgs,

    #[command(flatten)]
    pub mongodb: MongoDbArgs,
}

#[derive(Args, Debug, Clone)]
pub struct MySqlArgs {
    /// MySQL user with privileges to create the agent account.
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long, conflicts_with = "socket")]
    pub host: Option<String>,
    #[arg(long, conflicts_with = "socket")]
    pub port: Option<u16>,
    #[arg(long)]
    pub socket: Option<String>,
    /// MySQL option file whose [client] section supplies missing parameters.
    #[arg(long)]
    pub defaults_file: Option<String>,
    /// Existing account for the agent; nothing is created when given.
    #[arg(long, requires = "agent_password")]
    pub agent_user: Option<String>,
    #[arg(long, requires = "agent_user")]
    pub agent_password: Option<String>,
    #[arg(long, value_enum, default_value_t = QuerySourceArg::Auto)]
    pub query_source: QuerySourceArg,
    #[arg(long, default_value_t = 5)]
    pub max_user_connections: u32,
    #[arg(long, default_value_t = false)]
    pub old_passwords: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MongoDbArgs {
    #[arg(long, default_value = "mongodb://localhost:27017")]
    pub uri: String,
    /// Replica set name, added to the registry entry as `replset:<name>`.
    #[arg(long)]
    pub replset: Option<String>,
    /// Cluster name, added to the registry entry as `cluster:<name>`.
    #[arg(long)]
    pub cluster: Option<String>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = LocalConfig::load(&self.config)?;

        match self.command {
            Command::Server { address } => show_or_set(&mut config, &self.config, Field::Server, address),
            Command::Client { address } => show_or_set(&mut config, &self.config, Field::Client, address),
            Command::Add(args) => {
                let kind: InstanceKind = args.kind.into();
                let mut admin = Admin::new(config, &self.config)?;
                add(&mut admin, args)
                    .await
                    .with_context(|| format!("Error adding {kind}"))
            }
            Command::Remove { kind, name } => {
                let kind: InstanceKind = kind.into();
                let admin = Admin::new(config, &self.config)?;
                let removed = match kind {
                    InstanceKind::Os => admin.remove_os(&name).await,
                    InstanceKind::Mysql => admin.remove_mysql(&name).await,
                    InstanceKind::Mongodb => admin.remove_mongodb(&name).await,
                };
                removed.with_context(|| format!("Error removing {kind} {name}"))?;
                print_line(&format!("OK, removed {kind} {name}"));
                Ok(())
            }
            Command::List { format } => {
                let admin = Admin::new(config, &self.config)?;
                let rows = admin.list().await.context("Error listing instances")?;
                match format {
                    OutputFormat::Table => print_table(&rows),
                    OutputFormat::Json => print_line(&serde_json::to_string_pretty(&rows)?),
                }
                Ok(())
            }
            Command::Info => {
                let admin = Admin::new(config, &self.config)?;
                let os = admin.os().await.context("Error getting OS instance")?;
                print_line(&format!("client address  {}", admin.config().client_address));
                print_line(&format!("server address  {}", admin.config().server_address));
                print_line(&format!("OS name         {}", os.name));
                print_line(&format!("OS uuid         {}", os.uuid));
                Ok(())
            }
            Command::CheckNetwork => {
                let admin = Admin::new(config, &self.config)?;
                admin.ping().await.context("Error checking the monitoring server")?;
                print_line(&format!("OK, {} is reachable", admin.config().server_address));
                Ok(())
            }
        }
    }
}

async fn add(admin: &mut Admin, args: AddArgs) -> Result<()> {
    let start = !args.no_start;
    match args.kind {
        KindArg::Os => {
            let address = match args.address {
                Some(address) => address,
                None => admin.config().require_client()?.to_string(),
            };
            let os = admin.add_os(&address, start).await?;
            print_line(&format!("OK, added os {} at {address}", os.name));
        }
        KindArg::Mysql => {
            let mysql = prepare_mysql(admin, &args.mysql, args.name, start).await?;
            let instance = admin.add_mysql(&mysql).await?;
            print_line(&format!("OK, added mysql {} ({})", instance.name, instance.uuid));
        }
        KindArg::Mongodb => {
            let mongo = MongoDbInstance {
                name: args.name,
                uri: args.mongodb.uri,
                replset: args.mongodb.replset,
                cluster: args.mongodb.cluster,
                start,
            };
            let instance = admin.add_mongodb(&mongo).await?;
            print_line(&format!("OK, added mongodb {} ({})", instance.name, instance.uuid));
        }
    }
    Ok(())
}

/// Connects to the MySQL server, gets the agent account and reads the
/// server's identity.
async fn prepare_mysql(admin: &Admin, args: &MySqlArgs, name: Option<String>, start: bool) -> Result<MySqlInstance> {
    let user_dsn = Dsn::auto_detect(&DsnOverrides {
        user: args.user.clone(),
        password: args.password.clone(),
        host: args.host.clone(),
        port: args.port,
        socket: args.socket.clone(),
        defaults_file: args.defaults_file.clone(),
        old_passwords: args.old_passwords,
    })?;
    let agent_credentials = args.agent_user.clone().zip(args.agent_password.clone());
    let conn = MySqlConn::new(user_dsn, agent_credentials, args.max_user_connections);

    let agent_dsn = conn.agent_dsn().await?;
    let info = conn.info(&agent_dsn).await?;
    let collect_from = QuerySource::from(args.query_source).resolve(&info.hostname, admin.local_hostname());
    tracing::info!(
        dsn = %agent_dsn.hide_password(),
        hostname = %info.hostname,
        source = %collect_from,
        "MySQL server ready"
    );

    Ok(MySqlInstance {
        name: name.unwrap_or_else(|| info.instance_name()),
        dsn: agent_dsn.to_driver_dsn(),
        distro: info.distro,
        version: info.version,
        collect_from,
        start,
    })
}

enum Field {
    Server,
    Client,
}

fn show_or_set(config: &mut LocalConfig, path: &std::path::Path, field: Field, address: Option<String>) -> Result<()> {
    let slot = match field {
        Field::Server => &mut config.server_address,
        Field::Client => &mut config.client_address,
    };
    match address {
        None => {
            print_line(slot);
            Ok(())
        }
        Some(address) => {
            let address = address.trim().trim_end_matches('/').to_string();
            *slot = address.clone();
            config.save(path)?;
            print_line(&format!("OK, {address}"));
            Ok(())
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_line(line: &str) {
    println!("{line}");
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

#[allow(clippy::print_stdout)]
fn print_table(rows: &[InstanceStatus]) {
    println!("{:<8} {:<30} {:<34} {:<8} {}", "TYPE", "NAME", "UUID", "METRICS", "QUERIES");
    for row in rows {
        println!(
            "{:<8} {:<30} {:<34} {:<8} {}",
            row.kind,
            row.name,
            row.uuid.as_deref().unwrap_or("-"),
            yes_no(row.metrics),
            yes_no(row.queries),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("oxmon-admin").chain(args.iter().copied()))
    }

    #[test]
    fn socket_conflicts_with_host() {
        let err = parse(&["add", "mysql", "--socket", "/tmp/mysql.sock", "--host", "db1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn agent_user_requires_agent_password() {
        let err = parse(&["add", "mysql", "--agent-user", "mon"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(parse(&["add", "mysql", "--agent-user", "mon", "--agent-password", "pw"]).is_ok());
    }

    #[test]
    fn query_source_must_be_known() {
        let err = parse(&["add", "mysql", "--query-source", "binlog"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let cli = parse(&["add", "mysql", "--query-source", "perfschema"]).unwrap();
        match cli.command {
            Command::Add(args) => assert_eq!(QuerySource::from(args.mysql.query_source), QuerySource::PerfSchema),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn aliases_and_defaults() {
        let cli = parse(&["rm", "os", "db1"]).unwrap();
        assert!(matches!(cli.command, Command::Remove { kind: KindArg::Os, .. }));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));

        let cli = parse(&["ls", "--format", "json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::List { format: OutputFormat::Json }));
    }
}
