//! Authenticated LDAP session
//!
//! Wraps an `ldap3` handle and runs [`SearchRequest`]s over it.

use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults};
use ldap3::{DerefAliases, Ldap, Scope, SearchEntry, SearchOptions, SearchResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use diradmin_connector::error::{ConnectorError, ConnectorResult};
use diradmin_connector::operation::DirectoryEntry;
use diradmin_connector::protocol::{
    DerefPolicy, ResponseControl, ResultCode, SearchRequest, SearchResponse, SearchScope,
};
use diradmin_connector::traits::SearchTransport;

/// One bound connection to a directory server.
pub struct LdapSession {
    ldap: Ldap,
    server: Arc<str>,
}

impl LdapSession {
    pub(crate) fn new(ldap: Ldap, server: Arc<str>) -> Self {
        Self { ldap, server }
    }

    /// Server this session is connected to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Unbind and drop the connection.
    pub async fn unbind(mut self) {
        if let Err(e) = self.ldap.unbind().await {
            warn!(server = %self.server, error = %e, "Error during LDAP unbind");
        }
    }
}

impl std::fmt::Debug for LdapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSession")
            .field("server", &self.server)
            .finish()
    }
}

#[async_trait]
impl SearchTransport for LdapSession {
    #[instrument(skip(self, request), fields(server = %self.server, base_dn = %request.base_dn))]
    async fn search(&mut self, request: &SearchRequest) -> ConnectorResult<SearchResponse> {
        let options = SearchOptions::new()
            .deref(deref_aliases(request.deref))
            .sizelimit(request.size_limit)
            .timelimit(request.time_limit);
        self.ldap.with_search_options(options);

        if let Some(paging) = &request.paging {
            self.ldap.with_controls(vec![PagedResults {
                size: i32::try_from(paging.size).unwrap_or(i32::MAX),
                cookie: paging.cookie.clone(),
            }
            .into()]);
        }

        let attrs: Vec<&str> = request.attributes.iter().map(String::as_str).collect();
        let SearchResult(results, outcome) = self
            .ldap
            .search(&request.base_dn, scope(request.scope), &request.filter, attrs)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("search request to {} failed", self.server),
                    e,
                )
            })?;

        let mut referrals = 0;
        let entries: Vec<DirectoryEntry> = results
            .into_iter()
            .filter(|entry| {
                let is_ref = entry.is_ref();
                if is_ref {
                    referrals += 1;
                }
                !is_ref
            })
            .map(SearchEntry::construct)
            .map(to_directory_entry)
            .collect();

        if referrals > 0 {
            debug!(referrals, "Ignored search result references");
        }

        Ok(SearchResponse {
            entries,
            result_code: ResultCode(outcome.rc),
            message: outcome.text,
            controls: to_response_controls(outcome.ctrls),
        })
    }
}

fn scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

fn deref_aliases(policy: DerefPolicy) -> DerefAliases {
    match policy {
        DerefPolicy::Never => DerefAliases::Never,
        DerefPolicy::InSearching => DerefAliases::Searching,
        DerefPolicy::FindingBase => DerefAliases::Finding,
        DerefPolicy::Always => DerefAliases::Always,
    }
}

fn to_directory_entry(entry: SearchEntry) -> DirectoryEntry {
    DirectoryEntry {
        dn: entry.dn,
        attributes: entry.attrs.into_iter().collect::<BTreeMap<_, _>>(),
        binary_attributes: entry.bin_attrs.into_iter().collect::<BTreeMap<_, _>>(),
    }
}

fn to_response_controls(controls: Vec<Control>) -> Vec<ResponseControl> {
    controls
        .into_iter()
        .map(|Control(kind, raw)| match kind {
            Some(ControlType::PagedResults) if raw.val.is_some() => {
                let paged: PagedResults = raw.parse();
                ResponseControl::Paging {
                    size: u32::try_from(paged.size).unwrap_or(0),
                    cookie: paged.cookie,
                }
            }
            _ => ResponseControl::Other {
                oid: raw.ctype,
                value: raw.val,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap3::controls::RawControl;
    use std::collections::HashMap;

    #[test]
    fn test_scope_mapping() {
        assert!(matches!(scope(SearchScope::Base), Scope::Base));
        assert!(matches!(scope(SearchScope::OneLevel), Scope::OneLevel));
        assert!(matches!(scope(SearchScope::Subtree), Scope::Subtree));
    }

    #[test]
    fn test_deref_mapping() {
        assert!(matches!(
            deref_aliases(DerefPolicy::Never),
            DerefAliases::Never
        ));
        assert!(matches!(
            deref_aliases(DerefPolicy::Always),
            DerefAliases::Always
        ));
    }

    #[test]
    fn test_entry_conversion_keeps_text_and_binary_values() {
        let mut attrs = HashMap::new();
        attrs.insert("cn".to_string(), vec!["Jane Doe".to_string()]);
        attrs.insert(
            "mail".to_string(),
            vec!["jane@example.com".to_string(), "jd@example.com".to_string()],
        );
        let mut bin_attrs = HashMap::new();
        bin_attrs.insert("jpegPhoto".to_string(), vec![vec![0xff, 0xd8, 0xff]]);

        let entry = to_directory_entry(SearchEntry {
            dn: "uid=jdoe,ou=people,dc=example,dc=com".to_string(),
            attrs,
            bin_attrs,
        });

        assert_eq!(entry.dn, "uid=jdoe,ou=people,dc=example,dc=com");
        assert_eq!(entry.first_value("CN"), Some("Jane Doe"));
        assert_eq!(entry.values("mail").len(), 2);
        assert_eq!(entry.binary_values("jpegphoto"), &[vec![0xff_u8, 0xd8, 0xff]]);
    }

    #[test]
    fn test_paged_results_control_is_decoded() {
        let raw: RawControl = PagedResults {
            size: 150,
            cookie: b"opaque".to_vec(),
        }
        .into();
        let controls = to_response_controls(vec![Control(Some(ControlType::PagedResults), raw)]);

        assert_eq!(
            controls,
            vec![ResponseControl::Paging {
                size: 150,
                cookie: b"opaque".to_vec(),
            }]
        );
    }

    #[test]
    fn test_empty_cookie_is_preserved() {
        let raw: RawControl = PagedResults {
            size: 0,
            cookie: Vec::new(),
        }
        .into();
        let controls = to_response_controls(vec![Control(Some(ControlType::PagedResults), raw)]);
        let response = SearchResponse::success(Vec::new()).with_control(controls[0].clone());

        assert_eq!(response.paging_cookie(), Some(&[][..]));
    }

    #[test]
    fn test_unknown_control_is_kept_raw() {
        let raw = RawControl {
            ctype: "1.3.6.1.4.1.42.2.27.8.5.1".to_string(),
            crit: false,
            val: Some(vec![0x30, 0x00]),
        };
        let controls = to_response_controls(vec![Control(None, raw)]);

        assert_eq!(
            controls,
            vec![ResponseControl::Other {
                oid: "1.3.6.1.4.1.42.2.27.8.5.1".to_string(),
                value: Some(vec![0x30, 0x00]),
            }]
        );
    }
}
