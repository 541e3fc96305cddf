//! Ping command - Open a pool and validate a session

use clap::Args;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use diradmin_cli::config::Profile;
use diradmin_cli::error::CliResult;
use diradmin_cli::output::{print_json, print_key_value, print_success};
use diradmin_connector_ldap::connect;

/// Arguments for the ping command
#[derive(Args)]
pub struct PingArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output for ping
#[derive(Serialize)]
struct PingOutput {
    server: String,
    encrypted: bool,
    pool_size: usize,
    idle: usize,
    elapsed_ms: u128,
}

/// Execute the ping command
pub async fn execute(args: PingArgs, profile: Profile) -> CliResult<()> {
    let started = Instant::now();
    let pool = connect(&profile.pool).await?;

    // A checkout runs the root DSE probe against one of the sessions.
    let checked: CliResult<()> = match pool.checkout().await {
        Ok(session) => {
            debug!(session_id = %session.id(), "Session validated");
            pool.checkin(session).map_err(Into::into)
        }
        Err(e) => Err(e.into()),
    };
    let status = pool.status();
    let elapsed = started.elapsed();
    pool.close().await;
    checked?;

    let output = PingOutput {
        server: profile.pool.address(),
        encrypted: profile.pool.tls.is_encrypted(),
        pool_size: status.capacity,
        idle: status.idle,
        elapsed_ms: elapsed.as_millis(),
    };

    if args.json {
        print_json(&output)?;
    } else {
        print_success(&format!("Connected to {}", output.server));
        print_key_value("Encrypted", if output.encrypted { "yes" } else { "no" });
        print_key_value(
            "Sessions",
            &format!("{} idle of {}", output.idle, output.pool_size),
        );
        print_key_value("Elapsed", &format!("{} ms", output.elapsed_ms));
    }

    Ok(())
}
