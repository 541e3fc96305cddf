//! LDAP session factory
//!
//! Dials the server (retrying the dial only) and performs a simple bind.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use diradmin_connector::config::PoolConfig;
use diradmin_connector::error::{ConnectorError, ConnectorResult};
use diradmin_connector::protocol::ResultCode;
use diradmin_connector::resilience::RetryExecutor;
use diradmin_connector::traits::SessionFactory;

use crate::config::LdapEndpoint;
use crate::session::LdapSession;

/// Opens authenticated [`LdapSession`]s against one server.
pub struct LdapSessionFactory {
    endpoint: LdapEndpoint,
    display_name: Arc<str>,
    retry: RetryExecutor,
}

impl LdapSessionFactory {
    /// Create a factory for the server described by `config`.
    pub fn new(config: &PoolConfig) -> ConnectorResult<Self> {
        let endpoint = LdapEndpoint::from_config(config)?;
        let display_name: Arc<str> = Arc::from(endpoint.address());
        let retry = RetryExecutor::new(endpoint.dial_retry().clone());

        Ok(Self {
            endpoint,
            display_name,
            retry,
        })
    }

    pub fn endpoint(&self) -> &LdapEndpoint {
        &self.endpoint
    }

    /// Open the transport and start its driver task.
    async fn dial(&self) -> ConnectorResult<Ldap> {
        let url = self.endpoint.url();
        debug!(url = %url, "Connecting to LDAP server");

        let connect = LdapConnAsync::with_settings(self.endpoint.conn_settings(), &url);
        let (conn, ldap) = tokio::time::timeout(self.endpoint.connection_timeout(), connect)
            .await
            .map_err(|_| ConnectorError::ConnectionTimeout {
                timeout_secs: self.endpoint.connection_timeout().as_secs(),
            })?
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", url),
                    e,
                )
            })?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        Ok(ldap)
    }

    /// Simple bind with the configured credentials. Never retried.
    async fn bind(&self, ldap: &mut Ldap) -> ConnectorResult<()> {
        let bind_dn = self.endpoint.bind_dn();
        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let bind = ldap.simple_bind(bind_dn, self.endpoint.bind_password());
        let result = match tokio::time::timeout(self.endpoint.operation_timeout(), bind).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return Err(ConnectorError::bind_failed_with_source(
                    format!("LDAP bind failed for {}", bind_dn),
                    e,
                ))
            }
            Err(_) => {
                return Err(ConnectorError::BindFailed {
                    message: format!(
                        "LDAP bind for {} timed out after {} seconds",
                        bind_dn,
                        self.endpoint.operation_timeout().as_secs()
                    ),
                    source: None,
                })
            }
        };

        match ResultCode(result.rc) {
            ResultCode::SUCCESS => Ok(()),
            ResultCode::INVALID_CREDENTIALS => Err(ConnectorError::AuthenticationFailed {
                bind_dn: bind_dn.to_string(),
            }),
            code => Err(ConnectorError::BindFailed {
                message: format!("LDAP bind failed with {}: {}", code, result.text),
                source: None,
            }),
        }
    }
}

#[async_trait]
impl SessionFactory for LdapSessionFactory {
    type Session = LdapSession;

    fn display_name(&self) -> &str {
        &self.display_name
    }

    #[instrument(skip(self), fields(server = %self.display_name))]
    async fn create(&self) -> ConnectorResult<LdapSession> {
        let mut ldap = self.retry.execute(|| self.dial()).await?;

        if let Err(e) = self.bind(&mut ldap).await {
            warn!(error = %e, "Bind rejected, closing transport");
            if let Err(unbind_err) = ldap.unbind().await {
                debug!(error = %unbind_err, "Unbind after failed bind reported an error");
            }
            return Err(e);
        }

        info!(
            encrypted = self.endpoint.is_encrypted(),
            "LDAP session established"
        );
        Ok(LdapSession::new(ldap, Arc::clone(&self.display_name)))
    }

    async fn close(&self, session: LdapSession) {
        session.unbind().await;
        debug!(server = %self.display_name, "LDAP session closed");
    }
}

impl std::fmt::Debug for LdapSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSessionFactory")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
