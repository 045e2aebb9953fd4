mod cli;

use clap::error::ErrorKind;
use clap::Parser;
use oxmon_api::error::AdminError;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for command-line errors, kept apart from operational failures.
const FLAG_ERROR_EXIT: u8 = 10;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => FLAG_ERROR_EXIT,
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    let directive = if cli.verbose { "oxmon=debug" } else { "oxmon=warn" };
    let filter = match directive.parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stderr)]
fn report(err: &anyhow::Error) {
    eprintln!("{err:#}");
    if err
        .downcast_ref::<AdminError>()
        .is_some_and(AdminError::is_host_conflict)
    {
        eprintln!("Another host is registered under this name. Run 'oxmon-admin list' to see current registrations.");
    }
}
