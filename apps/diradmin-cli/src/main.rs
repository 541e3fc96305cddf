//! diradmin CLI
//!
//! Browse an LDAP directory from the command line through a pooled,
//! paged connector.

use clap::{Parser, Subcommand};

mod commands;

use diradmin_cli::config::ConnectionArgs;
use diradmin_cli::error::CliResult;
use diradmin_cli::logging::{self, LogLevel};

/// diradmin - LDAP directory browser
#[derive(Parser)]
#[command(name = "diradmin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show pool and session lifecycle logs
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Show per-request debug logs
    #[arg(long, global = true)]
    debug: bool,

    /// Show everything, including protocol traces
    #[arg(long, global = true)]
    trace: bool,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a pool against the server and report its state
    Ping(commands::ping::PingArgs),

    /// Run a paged search
    Search(commands::search::SearchArgs),

    /// Show the resolved connection profile
    Profile(commands::profile::ProfileArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init(LogLevel::from_flags(cli.verbose, cli.debug, cli.trace));

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let profile = cli.connection.resolve()?;

    match cli.command {
        Commands::Ping(args) => commands::ping::execute(args, profile).await,
        Commands::Search(args) => commands::search::execute(args, profile).await,
        Commands::Profile(args) => commands::profile::execute(args, profile),
    }
}
