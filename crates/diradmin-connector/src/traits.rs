//! Session capability traits
//!
//! The pool is written against these traits so the wire protocol stays an
//! external collaborator: the LDAP crate implements them on top of `ldap3`,
//! tests implement them in memory.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::protocol::{SearchRequest, SearchResponse};

/// Creates and closes authenticated sessions against one directory server.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    /// The session handle this factory produces.
    type Session: Send + 'static;

    /// Display name for log messages (usually the server address).
    fn display_name(&self) -> &str;

    /// Dial and authenticate a new session.
    ///
    /// Fails with `ConnectionFailed`/`ConnectionTimeout` when the server cannot
    /// be reached, or `AuthenticationFailed`/`BindFailed` when the bind is
    /// rejected. A failed bind never leaves a half-open transport behind.
    async fn create(&self) -> ConnectorResult<Self::Session>;

    /// Close a session. Errors are logged, not returned.
    async fn close(&self, session: Self::Session);
}

/// Decides whether an existing session is still usable.
#[async_trait]
pub trait SessionValidator<S: Send>: Send + Sync + 'static {
    /// Return `Ok(())` if the session can serve requests.
    async fn validate(&self, session: &mut S) -> ConnectorResult<()>;
}

/// Executes search requests over a session.
#[async_trait]
pub trait SearchTransport: Send {
    /// Send one search request and collect the complete response.
    ///
    /// Non-success result codes are reported in the response, not as errors.
    /// `Err` means the request never completed (transport failure, timeout).
    async fn search(&mut self, request: &SearchRequest) -> ConnectorResult<SearchResponse>;
}
