//! Profile command - Show the resolved connection settings

use clap::Args;

use diradmin_cli::config::{ConfigPaths, Profile};
use diradmin_cli::error::CliResult;
use diradmin_cli::output::{print_json, print_key_value};

/// Arguments for the profile command
#[derive(Args)]
pub struct ProfileArgs {
    /// Output as JSON (password omitted)
    #[arg(long)]
    pub json: bool,
}

/// Execute the profile command
pub fn execute(args: ProfileArgs, mut profile: Profile) -> CliResult<()> {
    let has_password = profile.pool.password.is_some();
    profile.pool.password = None;

    if args.json {
        print_json(&profile)?;
        return Ok(());
    }

    let pool = &profile.pool;
    if let Ok(paths) = ConfigPaths::new() {
        print_key_value("Profile", &paths.profile_file.display().to_string());
    }
    print_key_value("Server", &pool.address());
    print_key_value(
        "Security",
        if pool.tls.enabled {
            "ldaps"
        } else if pool.tls.starttls {
            "starttls"
        } else {
            "none"
        },
    );
    if !pool.tls.verify_certificate {
        print_key_value("Verify", "disabled");
    }
    if pool.username.is_empty() {
        print_key_value("Bind", "anonymous");
    } else {
        print_key_value("Bind DN", &pool.username);
        print_key_value("Password", if has_password { "set" } else { "not set" });
    }
    print_key_value("Pool size", &pool.pool_size.to_string());
    print_key_value(
        "Timeout",
        &format!("{} ms", pool.checkout_timeout().as_millis()),
    );
    if let Some(base_dn) = &profile.base_dn {
        print_key_value("Base DN", base_dn);
    }
    if let Some(page_size) = profile.page_size {
        print_key_value("Page size", &page_size.to_string());
    }

    Ok(())
}
