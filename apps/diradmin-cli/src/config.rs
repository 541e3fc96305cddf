//! Connection profiles
//!
//! A profile is a JSON file describing one directory server. Two layouts
//! are accepted: the native one (a serialized [`PoolConfig`] plus search
//! defaults) and the flat `{Addr, Port, Username, Password, Limit}` layout
//! written by the desktop client. Command-line flags and `DIRADMIN_*`
//! environment variables override whatever the file says.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use diradmin_connector::config::PoolConfig;

use crate::error::{CliError, CliResult};

/// File name of the default profile inside the config directory.
pub const PROFILE_FILE: &str = "profile.json";

/// Server settings plus search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(flatten)]
    pub pool: PoolConfig,

    /// Default search base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dn: Option<String>,

    /// Default page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            pool: PoolConfig::new(server),
            base_dn: None,
            page_size: None,
        }
    }

    /// Parse a profile in either supported layout.
    pub fn from_json(text: &str) -> CliResult<Self> {
        match serde_json::from_str::<ProfileFile>(text)? {
            ProfileFile::Native(profile) => Ok(profile),
            ProfileFile::Legacy(legacy) => legacy.into_profile(),
        }
    }

    /// Read a profile file. A missing file is not an error.
    pub fn load(path: &Path) -> CliResult<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "No profile file");
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let profile = Self::from_json(&text)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), server = %profile.pool.server, "Loaded profile");
        Ok(Some(profile))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileFile {
    Native(Profile),
    Legacy(LegacyProfile),
}

/// Profile layout written by the desktop client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyProfile {
    addr: String,
    #[serde(default)]
    port: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    /// Page size; 0 means unset.
    #[serde(default)]
    limit: i64,
}

impl LegacyProfile {
    fn into_profile(self) -> CliResult<Profile> {
        let mut pool = PoolConfig::new(self.addr.trim());

        let port = self.port.trim();
        if !port.is_empty() {
            pool.port = port
                .parse()
                .map_err(|_| CliError::Config(format!("invalid port '{}'", port)))?;
        }
        if !self.username.is_empty() {
            pool = pool.with_credentials(self.username, self.password);
        }

        Ok(Profile {
            pool,
            base_dn: None,
            page_size: u32::try_from(self.limit).ok().filter(|size| *size > 0),
        })
    }
}

/// Connection flags shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Profile file (defaults to the platform config directory)
    #[arg(long, env = "DIRADMIN_CONFIG", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory server host
    #[arg(long, short = 'H', env = "DIRADMIN_SERVER", global = true)]
    pub server: Option<String>,

    /// Directory server port
    #[arg(long, short = 'p', env = "DIRADMIN_PORT", global = true)]
    pub port: Option<u16>,

    /// Bind DN
    #[arg(long, short = 'D', env = "DIRADMIN_USERNAME", global = true)]
    pub username: Option<String>,

    /// Bind password
    #[arg(long, env = "DIRADMIN_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Number of pooled sessions
    #[arg(long, env = "DIRADMIN_POOL_SIZE", global = true)]
    pub pool_size: Option<usize>,

    /// Seconds to wait for a free session
    #[arg(long, env = "DIRADMIN_TIMEOUT", value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Connect with LDAPS
    #[arg(long, conflicts_with = "starttls", global = true)]
    pub ssl: bool,

    /// Upgrade the connection with STARTTLS
    #[arg(long, global = true)]
    pub starttls: bool,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure_skip_verify: bool,
}

impl ConnectionArgs {
    /// Load the profile file (if any) and apply the flags on top of it.
    pub fn resolve(&self) -> CliResult<Profile> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => ConfigPaths::new()?.profile_file,
        };

        let profile = Profile::load(&path)?;
        if profile.is_none() && self.config.is_some() {
            return Err(CliError::Config(format!(
                "profile {} does not exist",
                path.display()
            )));
        }
        self.apply(profile)
    }

    /// Overlay the flags on `base`.
    pub fn apply(&self, base: Option<Profile>) -> CliResult<Profile> {
        let mut profile = match (base, &self.server) {
            (Some(mut profile), Some(server)) => {
                profile.pool.server = server.clone();
                profile
            }
            (Some(profile), None) => profile,
            (None, Some(server)) => Profile::new(server.clone()),
            (None, None) => {
                return Err(CliError::Config("no directory server configured".to_string()))
            }
        };

        let pool = &mut profile.pool;
        if self.ssl {
            *pool = pool.clone().with_ssl();
        }
        if self.starttls {
            *pool = pool.clone().with_starttls();
        }
        if let Some(port) = self.port {
            pool.port = port;
        }
        if let Some(username) = &self.username {
            pool.username = username.clone();
        }
        if let Some(password) = &self.password {
            pool.password = Some(password.clone());
        }
        if let Some(size) = self.pool_size {
            pool.pool_size = size;
        }
        if let Some(secs) = self.timeout {
            *pool = pool.clone().with_timeout(Duration::from_secs(secs));
        }
        if self.insecure_skip_verify {
            *pool = pool.clone().danger_accept_invalid_certs();
        }

        pool.validate()?;
        Ok(profile)
    }
}

/// Configuration paths for the CLI
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Base configuration directory
    pub config_dir: PathBuf,
    /// Path to the default profile
    pub profile_file: PathBuf,
}

impl ConfigPaths {
    /// Get configuration paths for the current platform
    ///
    /// Paths:
    /// - Linux: ~/.config/diradmin/
    /// - macOS: ~/Library/Application Support/diradmin/
    /// - Windows: %APPDATA%\diradmin\
    pub fn new() -> CliResult<Self> {
        let config_dir = Self::get_config_dir()?;

        Ok(Self {
            profile_file: config_dir.join(PROFILE_FILE),
            config_dir,
        })
    }

    /// Get the configuration directory, respecting DIRADMIN_CONFIG_DIR
    fn get_config_dir() -> CliResult<PathBuf> {
        if let Ok(dir) = std::env::var("DIRADMIN_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }

        let base_dir = dirs::config_dir().ok_or_else(|| {
            CliError::Config("Could not determine configuration directory".to_string())
        })?;

        Ok(base_dir.join("diradmin"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_profile() {
        let profile = Profile::from_json(
            r#"{
                "server": "ldap.example.com",
                "port": 636,
                "username": "cn=admin,dc=example,dc=com",
                "password": "secret",
                "pool_size": 2,
                "tls": {"enabled": true},
                "base_dn": "dc=example,dc=com",
                "page_size": 250
            }"#,
        )
        .unwrap();

        assert_eq!(profile.pool.server, "ldap.example.com");
        assert_eq!(profile.pool.port, 636);
        assert_eq!(profile.pool.pool_size, 2);
        assert!(profile.pool.tls.enabled);
        assert_eq!(profile.base_dn.as_deref(), Some("dc=example,dc=com"));
        assert_eq!(profile.page_size, Some(250));
    }

    #[test]
    fn test_legacy_profile() {
        let profile = Profile::from_json(
            r#"{"Addr":"10.0.0.7","Port":"10389","Username":"cn=root","Password":"pw","Limit":200}"#,
        )
        .unwrap();

        assert_eq!(profile.pool.server, "10.0.0.7");
        assert_eq!(profile.pool.port, 10389);
        assert_eq!(profile.pool.username, "cn=root");
        assert_eq!(profile.pool.password.as_deref(), Some("pw"));
        assert_eq!(profile.page_size, Some(200));
        assert_eq!(profile.pool.pool_size, 5);
    }

    #[test]
    fn test_legacy_profile_defaults() {
        let profile = Profile::from_json(r#"{"Addr":"ldap","Port":"","Limit":0}"#).unwrap();
        assert_eq!(profile.pool.port, 389);
        assert_eq!(profile.page_size, None);
        assert!(profile.pool.password.is_none());
    }

    #[test]
    fn test_legacy_profile_bad_port() {
        let err = Profile::from_json(r#"{"Addr":"ldap","Port":"ldap"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid port"));
    }

    #[test]
    fn test_flags_override_profile() {
        let args = ConnectionArgs {
            server: Some("override.example.com".to_string()),
            port: Some(1389),
            pool_size: Some(1),
            timeout: Some(3),
            starttls: true,
            ..Default::default()
        };
        let profile = args
            .apply(Some(Profile::new("ldap.example.com")))
            .unwrap();

        assert_eq!(profile.pool.server, "override.example.com");
        assert_eq!(profile.pool.port, 1389);
        assert_eq!(profile.pool.pool_size, 1);
        assert_eq!(profile.pool.checkout_timeout(), Duration::from_secs(3));
        assert!(profile.pool.tls.starttls);
    }

    #[test]
    fn test_no_server_is_config_error() {
        let err = ConnectionArgs::default().apply(None).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_invalid_overlay_is_rejected() {
        let args = ConnectionArgs {
            server: Some("ldap.example.com".to_string()),
            pool_size: Some(0),
            ..Default::default()
        };
        assert!(args.apply(None).is_err());
    }
}
