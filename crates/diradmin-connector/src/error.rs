//! Connector error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

use crate::ids::{PoolId, SessionId};

/// Error that can occur while creating, pooling or searching with sessions.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (usually transient)
    /// Failed to establish a transport connection to the directory server.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Dialing did not complete within the configured connection timeout.
    #[error("connection timeout after {timeout_secs} seconds")]
    ConnectionTimeout { timeout_secs: u64 },

    // Authentication errors (permanent)
    /// The server rejected the bind credentials.
    #[error("authentication failed: invalid credentials for {bind_dn}")]
    AuthenticationFailed { bind_dn: String },

    /// The bind failed for a reason other than bad credentials.
    #[error("bind failed: {message}")]
    BindFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Configuration errors (permanent)
    /// Pool or connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    // Pool errors
    /// No session became idle within the checkout timeout.
    #[error("no session available within {timeout_ms} ms")]
    PoolTimeout { timeout_ms: u64 },

    /// The pool has been closed and accepts no further checkouts.
    #[error("pool {pool_id} is closed")]
    PoolClosed { pool_id: PoolId },

    /// A session was checked in to a pool that did not hand it out.
    #[error("session {session_id} does not belong to pool {pool_id}")]
    ForeignSession {
        pool_id: PoolId,
        session_id: SessionId,
    },

    /// A session was checked in while the pool had no record of it being out.
    #[error("session {session_id} is not checked out of pool {pool_id}")]
    SessionNotCheckedOut {
        pool_id: PoolId,
        session_id: SessionId,
    },

    /// Accepting a session would grow the pool beyond its capacity.
    #[error("pool {pool_id} is already holding its full capacity of {capacity} sessions")]
    CapacityExceeded { pool_id: PoolId, capacity: usize },

    /// The session failed its liveness probe.
    #[error("session is no longer usable: {message}")]
    SessionInvalid {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Search errors
    /// The search failed with a protocol or transport error.
    #[error("search failed: {message}")]
    SearchFailed {
        message: String,
        result_code: Option<u32>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The filter expression could not be used.
    #[error("invalid filter: {message}")]
    InvalidFilter { message: String },

    // Internal errors
    /// Internal error.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ConnectorError {
    /// Check if this error is transient and the operation should be retried.
    ///
    /// Only failures to reach the server are transient. A rejected bind or a
    /// failed search will fail the same way on a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed { .. }
                | ConnectorError::ConnectionTimeout { .. }
                | ConnectorError::PoolTimeout { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Check if this error reports a caller breaking the checkout/checkin contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ConnectorError::ForeignSession { .. }
                | ConnectorError::SessionNotCheckedOut { .. }
                | ConnectorError::CapacityExceeded { .. }
        )
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            ConnectorError::AuthenticationFailed { .. } => "AUTH_FAILED",
            ConnectorError::BindFailed { .. } => "BIND_FAILED",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::PoolTimeout { .. } => "POOL_TIMEOUT",
            ConnectorError::PoolClosed { .. } => "POOL_CLOSED",
            ConnectorError::ForeignSession { .. } => "FOREIGN_SESSION",
            ConnectorError::SessionNotCheckedOut { .. } => "SESSION_NOT_CHECKED_OUT",
            ConnectorError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ConnectorError::SessionInvalid { .. } => "SESSION_INVALID",
            ConnectorError::SearchFailed { .. } => "SEARCH_FAILED",
            ConnectorError::InvalidFilter { .. } => "INVALID_FILTER",
            ConnectorError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a bind failed error with source.
    pub fn bind_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::BindFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a session invalid error.
    pub fn session_invalid(message: impl Into<String>) -> Self {
        ConnectorError::SessionInvalid {
            message: message.into(),
            source: None,
        }
    }

    /// Create a session invalid error with source.
    pub fn session_invalid_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::SessionInvalid {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error carrying the server result code.
    pub fn search_failed(message: impl Into<String>, result_code: Option<u32>) -> Self {
        ConnectorError::SearchFailed {
            message: message.into(),
            result_code,
            source: None,
        }
    }

    /// Create a search failed error with source.
    pub fn search_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::SearchFailed {
            message: message.into(),
            result_code: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ConnectorError::Internal {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
