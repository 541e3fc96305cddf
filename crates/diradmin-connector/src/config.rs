//! Pool configuration types
//!
//! Server address, credentials and the sizing/timeout knobs for a
//! [`ConnectionPool`](crate::pool::ConnectionPool). The configuration is
//! supplied by the caller and never loaded or saved by this crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConnectorError, ConnectorResult};
use crate::resilience::RetryConfig;

/// Configuration for a pool of directory sessions.
#[derive(Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Directory server hostname or IP address.
    pub server: String,

    /// Directory server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind DN used to authenticate every session.
    #[serde(default)]
    pub username: String,

    /// Bind password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Number of sessions the pool owns.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long a checkout waits for an idle session, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Millisecond override for the checkout timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Dial and retry settings for the session factory.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Transport security.
    #[serde(default)]
    pub tls: TlsConfig,
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***REDACTED***"))
            .field("pool_size", &self.pool_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("timeout_ms", &self.timeout_ms)
            .field("connection", &self.connection)
            .field("tls", &self.tls)
            .finish()
    }
}

fn default_port() -> u16 {
    389
}

fn default_pool_size() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

impl PoolConfig {
    /// Create a new pool config for `server` with default sizing.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: default_port(),
            username: String::new(),
            password: None,
            pool_size: default_pool_size(),
            timeout_secs: default_timeout_secs(),
            timeout_ms: None,
            connection: ConnectionSettings::default(),
            tls: TlsConfig::default(),
        }
    }

    /// Set the server port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind DN and password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    /// Set the number of pooled sessions.
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the checkout timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Enable SSL (LDAPS) on port 636.
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.tls.enabled = true;
        self.tls.starttls = false;
        self.port = 636;
        self
    }

    /// Upgrade a plain connection with STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.tls.enabled = false;
        self.tls.starttls = true;
        self
    }

    /// Disable server certificate verification.
    ///
    /// This is an explicit opt-in; [`TlsConfig::validate_security`] logs a
    /// warning whenever it is in effect.
    #[must_use]
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.tls.verify_certificate = false;
        self
    }

    /// Set the dial settings.
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionSettings) -> Self {
        self.connection = connection;
        self
    }

    /// The checkout timeout as a Duration.
    ///
    /// Sub-second timeouts set through [`with_timeout`](Self::with_timeout)
    /// take precedence over `timeout_secs`.
    pub fn checkout_timeout(&self) -> Duration {
        match self.timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.timeout_secs),
        }
    }

    /// `host:port` of the directory server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.server.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "server address is required",
            ));
        }
        if self.port == 0 {
            return Err(ConnectorError::invalid_configuration(
                "port must be between 1 and 65535",
            ));
        }
        if self.pool_size == 0 {
            return Err(ConnectorError::invalid_configuration(
                "pool_size must be at least 1",
            ));
        }
        if self.checkout_timeout().is_zero() {
            return Err(ConnectorError::invalid_configuration(
                "timeout must be greater than zero",
            ));
        }
        if self.connection.connection_timeout_secs == 0 {
            return Err(ConnectorError::invalid_configuration(
                "connection_timeout_secs must be at least 1",
            ));
        }
        if self.connection.operation_timeout_secs == 0 {
            return Err(ConnectorError::invalid_configuration(
                "operation_timeout_secs must be at least 1",
            ));
        }
        if self.connection.dial_attempts == 0 {
            return Err(ConnectorError::invalid_configuration(
                "dial_attempts must be at least 1",
            ));
        }
        if self.tls.enabled && self.tls.starttls {
            return Err(ConnectorError::invalid_configuration(
                "use either SSL or STARTTLS, not both",
            ));
        }
        self.tls.validate_security();
        Ok(())
    }
}

/// Dial and retry settings used by the session factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Timeout for a single dial attempt, in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Timeout for the bind and the liveness probe, in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Total number of dial attempts before giving up.
    #[serde(default = "default_dial_attempts")]
    pub dial_attempts: u32,

    /// Delay between dial attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to add jitter to retry delays.
    #[serde(default)]
    pub jitter: bool,
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_operation_timeout() -> u64 {
    60
}

fn default_dial_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            operation_timeout_secs: default_operation_timeout(),
            dial_attempts: default_dial_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

impl ConnectionSettings {
    /// Create new connection settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dial timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Set the number of dial attempts and the delay between them.
    #[must_use]
    pub fn with_dial_attempts(mut self, attempts: u32, delay: Duration) -> Self {
        self.dial_attempts = attempts;
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Switch to exponential backoff with jitter.
    #[must_use]
    pub fn with_exponential_backoff(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self.jitter = true;
        self
    }

    /// Get the dial timeout as Duration.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get the operation timeout as Duration.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Retry policy for the dial step.
    pub fn dial_retry(&self) -> RetryConfig {
        let delay = Duration::from_millis(self.retry_delay_ms);
        RetryConfig {
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
            ..RetryConfig::fixed(self.dial_attempts, delay)
        }
    }
}

/// SSL/TLS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Connect with implicit TLS (`ldaps://`).
    #[serde(default)]
    pub enabled: bool,

    /// Upgrade a plain connection with STARTTLS.
    #[serde(default)]
    pub starttls: bool,

    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            starttls: false,
            verify_certificate: true,
        }
    }
}

impl TlsConfig {
    /// Whether the transport will be encrypted at all.
    pub fn is_encrypted(&self) -> bool {
        self.enabled || self.starttls
    }

    /// Log security warnings for insecure settings.
    pub fn validate_security(&self) {
        if self.is_encrypted() && !self.verify_certificate {
            tracing::warn!(
                target: "security",
                "SECURITY WARNING: TLS certificate verification is DISABLED. \
                 This makes the connection vulnerable to Man-in-the-Middle attacks."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::new("ldap.example.com");
        assert_eq!(config.port, 389);
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.checkout_timeout(), Duration::from_secs(30));
        assert_eq!(config.connection.dial_attempts, 3);
        assert_eq!(config.connection.retry_delay_ms, 1000);
        assert!(config.tls.verify_certificate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: PoolConfig = serde_json::from_str(r#"{"server": "10.0.0.1"}"#).unwrap();
        assert_eq!(config.server, "10.0.0.1");
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.password.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = PoolConfig::new("ldap").with_credentials("cn=admin", "hunter2");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_with_ssl() {
        let config = PoolConfig::new("ldap").with_ssl();
        assert_eq!(config.port, 636);
        assert!(config.tls.enabled);
        assert!(config.tls.is_encrypted());
    }

    #[test]
    fn test_sub_second_timeout() {
        let config = PoolConfig::new("ldap").with_timeout(Duration::from_millis(250));
        assert_eq!(config.checkout_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PoolConfig::new("").validate().is_err());
        assert!(PoolConfig::new("ldap").with_pool_size(0).validate().is_err());
        assert!(PoolConfig::new("ldap").with_port(0).validate().is_err());

        let mut both = PoolConfig::new("ldap").with_ssl();
        both.tls.starttls = true;
        assert!(both.validate().is_err());

        let no_attempts = PoolConfig::new("ldap").with_connection(
            ConnectionSettings::new().with_dial_attempts(0, Duration::from_secs(1)),
        );
        assert!(no_attempts.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_dial_and_operation_timeouts() {
        let no_dial_time = PoolConfig::new("ldap")
            .with_connection(ConnectionSettings::new().with_connection_timeout(0));
        let err = no_dial_time.validate().unwrap_err();
        assert!(err.to_string().contains("connection_timeout_secs"));

        let mut no_op_time = PoolConfig::new("ldap");
        no_op_time.connection.operation_timeout_secs = 0;
        assert!(no_op_time.validate().is_err());

        let from_profile: PoolConfig =
            serde_json::from_str(r#"{"server": "ldap", "connection": {"connection_timeout_secs": 0}}"#)
                .unwrap();
        assert!(from_profile.validate().is_err());
    }

    #[test]
    fn test_dial_retry_policy() {
        let retry = ConnectionSettings::default().dial_retry();
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.initial_delay, Duration::from_secs(1));
        assert_eq!(retry.backoff_multiplier, 1.0);
        assert!(!retry.jitter);
    }
}
