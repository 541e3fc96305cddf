//! Protocol-level search types.
//!
//! These mirror the primitives the directory protocol stack exposes:
//! a search request carrying controls, and a response carrying entries,
//! a result code and response controls. A [`SearchTransport`] turns one
//! into the other.
//!
//! [`SearchTransport`]: crate::traits::SearchTransport

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::operation::{DirectoryEntry, Query};

/// OID of the simple paged results control (RFC 2696).
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// Attribute list meaning "no attributes" (RFC 4511 section 4.5.1.8).
pub const NO_ATTRIBUTES: &str = "1.1";

/// Search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Only the base entry.
    Base,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and all its descendants.
    Subtree,
}

/// Alias dereferencing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerefPolicy {
    Never,
    InSearching,
    FindingBase,
    Always,
}

/// LDAP result code (RFC 4511 appendix A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub u32);

impl ResultCode {
    pub const SUCCESS: ResultCode = ResultCode(0);
    pub const TIME_LIMIT_EXCEEDED: ResultCode = ResultCode(3);
    pub const SIZE_LIMIT_EXCEEDED: ResultCode = ResultCode(4);
    pub const UNAVAILABLE_CRITICAL_EXTENSION: ResultCode = ResultCode(12);
    pub const NO_SUCH_OBJECT: ResultCode = ResultCode(32);
    pub const INVALID_CREDENTIALS: ResultCode = ResultCode(49);
    pub const INSUFFICIENT_ACCESS_RIGHTS: ResultCode = ResultCode(50);
    pub const BUSY: ResultCode = ResultCode(51);
    pub const UNAVAILABLE: ResultCode = ResultCode(52);
    pub const UNWILLING_TO_PERFORM: ResultCode = ResultCode(53);
    pub const OTHER: ResultCode = ResultCode(80);

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }

    /// Short name of well-known codes, for log and error messages.
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "success",
            3 => "timeLimitExceeded",
            4 => "sizeLimitExceeded",
            12 => "unavailableCriticalExtension",
            32 => "noSuchObject",
            49 => "invalidCredentials",
            50 => "insufficientAccessRights",
            51 => "busy",
            52 => "unavailable",
            53 => "unwillingToPerform",
            80 => "other",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// Request side of the paged results control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingControl {
    /// Requested page size.
    pub size: u32,
    /// Cookie from the previous page; empty on the first request.
    pub cookie: Vec<u8>,
}

/// A control returned with a search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseControl {
    /// The paged results control, with the cookie for the next page.
    Paging {
        /// Server's estimate of the total result size; 0 when unknown.
        size: u32,
        cookie: Vec<u8>,
    },
    /// Any other control, kept by OID.
    Other { oid: String, value: Option<Vec<u8>> },
}

/// A fully specified search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: SearchScope,
    pub deref: DerefPolicy,
    /// Server-side entry limit; 0 means none.
    pub size_limit: i32,
    /// Server-side time limit in seconds; 0 means none.
    pub time_limit: i32,
    pub filter: String,
    pub attributes: Vec<String>,
    pub paging: Option<PagingControl>,
}

impl SearchRequest {
    /// Subtree search for one page of `query`: aliases never dereferenced and
    /// no size or time limit.
    pub fn paged(query: &Query, paging: PagingControl) -> Self {
        Self {
            base_dn: query.base_dn().to_string(),
            scope: SearchScope::Subtree,
            deref: DerefPolicy::Never,
            size_limit: 0,
            time_limit: 0,
            filter: query.filter().to_string(),
            attributes: query.attributes().to_request_list(),
            paging: Some(paging),
        }
    }

    /// The cheapest read the server can answer: the root DSE, base scope, no
    /// attributes.
    pub fn root_probe() -> Self {
        Self {
            base_dn: String::new(),
            scope: SearchScope::Base,
            deref: DerefPolicy::Never,
            size_limit: 0,
            time_limit: 0,
            filter: crate::operation::MATCH_ALL_FILTER.to_string(),
            attributes: vec![NO_ATTRIBUTES.to_string()],
            paging: None,
        }
    }
}

/// What the server sent back for one search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    /// Entries in server order.
    pub entries: Vec<DirectoryEntry>,
    pub result_code: ResultCode,
    /// Diagnostic message from the server.
    pub message: String,
    pub controls: Vec<ResponseControl>,
}

impl SearchResponse {
    /// A successful response with no controls.
    pub fn success(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries,
            result_code: ResultCode::SUCCESS,
            message: String::new(),
            controls: Vec::new(),
        }
    }

    /// Attach a response control.
    #[must_use]
    pub fn with_control(mut self, control: ResponseControl) -> Self {
        self.controls.push(control);
        self
    }

    /// Set the result code and diagnostic message.
    #[must_use]
    pub fn with_result(mut self, code: ResultCode, message: impl Into<String>) -> Self {
        self.result_code = code;
        self.message = message.into();
        self
    }

    /// Cookie from the first paged results control, if the server sent one.
    pub fn paging_cookie(&self) -> Option<&[u8]> {
        self.controls.iter().find_map(|control| match control {
            ResponseControl::Paging { cookie, .. } => Some(cookie.as_slice()),
            ResponseControl::Other { .. } => None,
        })
    }
}
