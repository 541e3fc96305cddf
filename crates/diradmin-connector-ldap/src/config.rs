//! LDAP endpoint settings
//!
//! Derives the URL, `ldap3` connection settings and bind credentials from a
//! [`PoolConfig`].

use ldap3::LdapConnSettings;
use std::time::Duration;

use diradmin_connector::config::PoolConfig;
use diradmin_connector::error::ConnectorResult;
use diradmin_connector::resilience::RetryConfig;

/// Everything a session factory needs to dial and bind one server.
#[derive(Clone)]
pub struct LdapEndpoint {
    host: String,
    port: u16,
    use_ssl: bool,
    use_starttls: bool,
    verify_certificate: bool,
    bind_dn: String,
    bind_password: String,
    connection_timeout: Duration,
    operation_timeout: Duration,
    dial_retry: RetryConfig,
}

impl LdapEndpoint {
    /// Build endpoint settings from a validated pool configuration.
    pub fn from_config(config: &PoolConfig) -> ConnectorResult<Self> {
        config.validate()?;

        Ok(Self {
            host: config.server.trim().to_string(),
            port: config.port,
            use_ssl: config.tls.enabled,
            use_starttls: config.tls.starttls,
            verify_certificate: config.tls.verify_certificate,
            bind_dn: config.username.clone(),
            bind_password: config.password.clone().unwrap_or_default(),
            connection_timeout: config.connection.connection_timeout(),
            operation_timeout: config.connection.operation_timeout(),
            dial_retry: config.connection.dial_retry(),
        })
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}", scheme, self.address())
    }

    /// `host:port`, with IPv6 literals bracketed.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Connection settings for `ldap3`.
    ///
    /// The dial timeout is enforced by the factory, not here.
    pub fn conn_settings(&self) -> LdapConnSettings {
        LdapConnSettings::new()
            .set_starttls(self.use_starttls)
            .set_no_tls_verify(!self.verify_certificate)
    }

    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    pub(crate) fn bind_password(&self) -> &str {
        &self.bind_password
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Limit for the bind round trip.
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub fn dial_retry(&self) -> &RetryConfig {
        &self.dial_retry
    }

    pub fn is_encrypted(&self) -> bool {
        self.use_ssl || self.use_starttls
    }
}

impl std::fmt::Debug for LdapEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapEndpoint")
            .field("url", &self.url())
            .field("starttls", &self.use_starttls)
            .field("verify_certificate", &self.verify_certificate)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"***REDACTED***")
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}
