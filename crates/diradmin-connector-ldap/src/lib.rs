//! # LDAP Sessions
//!
//! `ldap3`-backed implementation of the session traits from
//! `diradmin-connector`.
//!
//! ## Features
//!
//! - LDAP v3 simple bind
//! - SSL/TLS and STARTTLS, with certificate verification on by default
//! - Dial retry with fixed or exponential backoff
//! - Simple paged results (RFC 2696)
//!
//! ## Example
//!
//! ```ignore
//! use diradmin_connector::prelude::*;
//! use diradmin_connector_ldap::connect;
//!
//! let config = PoolConfig::new("ldap.example.com")
//!     .with_credentials("cn=admin,dc=example,dc=com", "secret")
//!     .with_starttls();
//!
//! let pool = connect(&config).await?;
//! let query = Query::new("dc=example,dc=com", "(objectClass=person)")?;
//! let mut cursor = PagingCursor::new(500);
//! let page = pool.search_page(&query, &mut cursor).await?;
//! ```

pub mod config;
pub mod factory;
pub mod session;

use diradmin_connector::config::PoolConfig;
use diradmin_connector::error::ConnectorResult;
use diradmin_connector::pool::ConnectionPool;
use diradmin_connector::validator::RootDseProbe;

// Re-exports
pub use config::LdapEndpoint;
pub use factory::LdapSessionFactory;
pub use session::LdapSession;

/// A pool of LDAP sessions validated with a root DSE probe.
pub type LdapPool = ConnectionPool<LdapSessionFactory, RootDseProbe>;

/// Open a pool of `config.pool_size` authenticated LDAP sessions.
///
/// Fails if any session cannot be dialed or bound; sessions opened before
/// the failure are closed.
pub async fn connect(config: &PoolConfig) -> ConnectorResult<LdapPool> {
    let factory = LdapSessionFactory::new(config)?;
    let probe = RootDseProbe::new(config.connection.operation_timeout());
    ConnectionPool::new(factory, probe, config).await
}
