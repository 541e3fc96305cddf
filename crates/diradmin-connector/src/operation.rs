//! Query and entry types
//!
//! A [`Query`] names what to search for; a [`DirectoryEntry`] is one result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ConnectorError, ConnectorResult};

/// Filter matching every entry.
pub const MATCH_ALL_FILTER: &str = "(objectClass=*)";

/// Attributes shown when browsing entries without an explicit selection.
pub const DEFAULT_BROWSE_ATTRIBUTES: &[&str] = &[
    "cn",
    "sn",
    "givenName",
    "mail",
    "telephoneNumber",
    "uid",
    "uidNumber",
    "gidNumber",
    "o",
    "ou",
    "title",
    "objectClass",
    "createTimestamp",
    "modifyTimestamp",
];

/// Typed search filter rendered to RFC 4515 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    And { filters: Vec<Filter> },
    Or { filters: Vec<Filter> },
    Not { filter: Box<Filter> },
    Equals { attribute: String, value: String },
    StartsWith { attribute: String, value: String },
    Contains { attribute: String, value: String },
    EndsWith { attribute: String, value: String },
    GreaterOrEqual { attribute: String, value: String },
    LessOrEqual { attribute: String, value: String },
    Present { attribute: String },
    /// Pre-rendered filter text. Parentheses are added if missing.
    Raw { filter: String },
}

impl Filter {
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn starts_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::StartsWith {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn ends_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::EndsWith {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { filters }
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { filters }
    }

    pub fn negate(filter: Filter) -> Self {
        Filter::Not {
            filter: Box::new(filter),
        }
    }

    pub fn raw(filter: impl Into<String>) -> Self {
        Filter::Raw {
            filter: filter.into(),
        }
    }

    /// Render this filter as RFC 4515 text.
    pub fn to_ldap(&self) -> String {
        match self {
            Filter::And { filters } => {
                let inner: Vec<String> = filters.iter().map(Filter::to_ldap).collect();
                format!("(&{})", inner.join(""))
            }
            Filter::Or { filters } => {
                let inner: Vec<String> = filters.iter().map(Filter::to_ldap).collect();
                format!("(|{})", inner.join(""))
            }
            Filter::Not { filter } => format!("(!{})", filter.to_ldap()),
            Filter::Equals { attribute, value } => {
                format!("({}={})", attribute, escape_filter_value(value))
            }
            Filter::StartsWith { attribute, value } => {
                format!("({}={}*)", attribute, escape_filter_value(value))
            }
            Filter::Contains { attribute, value } => {
                format!("({}=*{}*)", attribute, escape_filter_value(value))
            }
            Filter::EndsWith { attribute, value } => {
                format!("({}=*{})", attribute, escape_filter_value(value))
            }
            Filter::GreaterOrEqual { attribute, value } => {
                format!("({}>={})", attribute, escape_filter_value(value))
            }
            Filter::LessOrEqual { attribute, value } => {
                format!("({}<={})", attribute, escape_filter_value(value))
            }
            Filter::Present { attribute } => format!("({}=*)", attribute),
            Filter::Raw { filter } => normalize_filter(filter),
        }
    }
}

/// Escape special characters in filter assertion values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Trim a filter and wrap it in parentheses when the caller left them off.
fn normalize_filter(filter: &str) -> String {
    let trimmed = filter.trim();
    if trimmed.starts_with('(') {
        trimmed.to_string()
    } else {
        format!("({})", trimmed)
    }
}

/// Which attributes a search returns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSelection {
    /// Every user attribute.
    #[default]
    All,
    /// [`DEFAULT_BROWSE_ATTRIBUTES`].
    Default,
    /// An explicit list.
    Only(Vec<String>),
}

impl AttributeSelection {
    /// Attribute names to put on the wire. `*` requests all user attributes.
    pub fn to_request_list(&self) -> Vec<String> {
        match self {
            AttributeSelection::All => vec!["*".to_string()],
            AttributeSelection::Default => DEFAULT_BROWSE_ATTRIBUTES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            AttributeSelection::Only(list) if list.is_empty() => vec!["*".to_string()],
            AttributeSelection::Only(list) => list.clone(),
        }
    }
}

/// Base DN, filter and attribute selection for one paged search sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    base_dn: String,
    filter: String,
    attributes: AttributeSelection,
}

impl Query {
    /// Create a query from a filter string.
    ///
    /// An empty filter matches every entry; a filter without enclosing
    /// parentheses is wrapped in them.
    pub fn new(base_dn: impl Into<String>, filter: impl AsRef<str>) -> ConnectorResult<Self> {
        let filter = filter.as_ref();
        let filter = if filter.trim().is_empty() {
            MATCH_ALL_FILTER.to_string()
        } else {
            normalize_filter(filter)
        };
        check_balanced(&filter)?;

        Ok(Self {
            base_dn: base_dn.into().trim().to_string(),
            filter,
            attributes: AttributeSelection::All,
        })
    }

    /// Create a query from a typed filter.
    pub fn from_filter(base_dn: impl Into<String>, filter: &Filter) -> ConnectorResult<Self> {
        Self::new(base_dn, filter.to_ldap())
    }

    /// Select the attributes to return.
    #[must_use]
    pub fn with_attributes(mut self, attributes: AttributeSelection) -> Self {
        self.attributes = attributes;
        self
    }

    /// Return only the named attributes.
    pub fn with_attribute_list<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_attributes(AttributeSelection::Only(
            names.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn attributes(&self) -> &AttributeSelection {
        &self.attributes
    }
}

/// A normalized filter must be exactly one parenthesized expression.
fn check_balanced(filter: &str) -> ConnectorResult<()> {
    let invalid = |reason: &str| {
        Err(ConnectorError::InvalidFilter {
            message: format!("{} in '{}'", reason, filter),
        })
    };

    let mut depth: u32 = 0;
    let mut escaped = false;
    for (offset, ch) in filter.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return invalid("unbalanced parentheses");
                }
                depth -= 1;
                if depth == 0 && offset + 1 < filter.len() {
                    return invalid("more than one top-level filter");
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return invalid("unbalanced parentheses");
    }
    Ok(())
}

/// One entry returned by a search, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name.
    pub dn: String,
    /// Textual attribute values.
    pub attributes: BTreeMap<String, Vec<String>>,
    /// Values that are not valid UTF-8.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_attributes: BTreeMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Default::default()
        }
    }

    /// Add a textual value.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// All values of an attribute. Attribute names are case-insensitive.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// First value of an attribute, if any.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    /// Binary values of an attribute.
    pub fn binary_values(&self, name: &str) -> &[Vec<u8>] {
        self.binary_attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }
}
