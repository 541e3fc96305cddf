//! # Directory Session Pool
//!
//! Protocol-agnostic core of the directory admin toolkit: a bounded pool of
//! authenticated sessions and a cursor-driven paged search on top of it.
//!
//! ## Architecture
//!
//! The pool is written against three capability traits:
//!
//! - [`SessionFactory`] - Dial and authenticate new sessions
//! - [`SessionValidator`] - Decide whether a pooled session is still alive
//! - [`SearchTransport`] - Run one search request over a session
//!
//! `diradmin-connector-ldap` implements them with `ldap3`; tests implement
//! them in memory.
//!
//! ## Example
//!
//! ```ignore
//! use diradmin_connector::prelude::*;
//!
//! let config = PoolConfig::new("ldap.example.com")
//!     .with_credentials("cn=admin,dc=example,dc=com", "secret")
//!     .with_pool_size(5);
//! let pool = ConnectionPool::new(factory, RootDseProbe::default(), &config).await?;
//!
//! let query = Query::new("dc=example,dc=com", "(uid=jdoe*)")?;
//! let mut cursor = PagingCursor::new(100);
//! while !cursor.is_exhausted() {
//!     let page = pool.search_page(&query, &mut cursor).await?;
//!     for entry in &page.entries {
//!         println!("{}", entry.dn);
//!     }
//! }
//! pool.close().await;
//! ```
//!
//! ## Crate Organization
//!
//! - [`ids`] - Pool and session identifiers
//! - [`error`] - Error types with transient/permanent classification
//! - [`config`] - Pool, connection and TLS configuration
//! - [`resilience`] - Dial retry policy
//! - [`operation`] - Queries, filters and directory entries
//! - [`protocol`] - Search requests, responses and controls
//! - [`traits`] - Session capability traits
//! - [`validator`] - Root DSE liveness probe
//! - [`pool`] - The connection pool
//! - [`paging`] - Paged search over a checked-out session
//!
//! [`SessionFactory`]: traits::SessionFactory
//! [`SessionValidator`]: traits::SessionValidator
//! [`SearchTransport`]: traits::SearchTransport

pub mod config;
pub mod error;
pub mod ids;
pub mod operation;
pub mod paging;
pub mod pool;
pub mod protocol;
pub mod resilience;
pub mod traits;
pub mod validator;

/// Prelude module for convenient imports.
///
/// ```
/// use diradmin_connector::prelude::*;
/// ```
pub mod prelude {
    // IDs
    pub use crate::ids::{PoolId, SessionId};

    // Error handling
    pub use crate::error::{ConnectorError, ConnectorResult};

    // Configuration
    pub use crate::config::{ConnectionSettings, PoolConfig, TlsConfig};

    // Resilience
    pub use crate::resilience::{RetryConfig, RetryExecutor};

    // Operations
    pub use crate::operation::{AttributeSelection, DirectoryEntry, Filter, Query};

    // Protocol
    pub use crate::protocol::{
        DerefPolicy, PagingControl, ResponseControl, ResultCode, SearchRequest, SearchResponse,
        SearchScope,
    };

    // Traits
    pub use crate::traits::{SearchTransport, SessionFactory, SessionValidator};

    // Pool and paging
    pub use crate::paging::{page, PagingCursor, SearchPage};
    pub use crate::pool::{ConnectionPool, PoolStatus, PooledSession};
    pub use crate::validator::RootDseProbe;
}

// Re-export async_trait for session implementors
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _id = PoolId::new();
        let _config = PoolConfig::new("ldap.example.com");
        let _cursor = PagingCursor::new(100);
        let _query = Query::new("dc=example,dc=com", "(cn=*)").unwrap();
        let _filter = Filter::eq("uid", "jdoe");
        let _probe = RootDseProbe::default();
        let _code = ResultCode::SUCCESS;
    }
}
