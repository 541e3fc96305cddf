//! Search command - Paged search through the pool

use clap::Args;
use serde::Serialize;
use tracing::{debug, info};

use diradmin_cli::config::Profile;
use diradmin_cli::error::{CliError, CliResult};
use diradmin_cli::output::{print_entries, print_info, print_json, print_warning};
use diradmin_connector::operation::{AttributeSelection, DirectoryEntry, Query};
use diradmin_connector::paging::{PagingCursor, DEFAULT_PAGE_SIZE};
use diradmin_connector_ldap::{connect, LdapPool};

/// Arguments for the search command
#[derive(Args)]
pub struct SearchArgs {
    /// LDAP filter, e.g. "(objectClass=person)"; matches everything if omitted
    #[arg(default_value = "")]
    pub filter: String,

    /// Search base (falls back to the profile's base_dn)
    #[arg(long, short = 'b', env = "DIRADMIN_BASE_DN")]
    pub base_dn: Option<String>,

    /// Entries per page (falls back to the profile, then 1000)
    #[arg(long, short = 'z', value_name = "N")]
    pub page_size: Option<u32>,

    /// Attributes to return, comma separated
    #[arg(long, short = 'a', value_delimiter = ',', conflicts_with = "browse")]
    pub attributes: Vec<String>,

    /// Return the browse attribute set (cn, uid, mail, objectClass, ...)
    #[arg(long)]
    pub browse: bool,

    /// Number of pages to fetch
    #[arg(long, default_value_t = 1, conflicts_with = "all")]
    pub pages: u32,

    /// Fetch every page
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    fn attribute_selection(&self) -> AttributeSelection {
        if self.browse {
            AttributeSelection::Default
        } else if self.attributes.is_empty() {
            AttributeSelection::All
        } else {
            AttributeSelection::Only(self.attributes.clone())
        }
    }

    fn page_limit(&self) -> Option<u32> {
        if self.all {
            None
        } else {
            Some(self.pages.max(1))
        }
    }
}

/// JSON output for search
#[derive(Serialize)]
struct SearchOutput {
    base_dn: String,
    filter: String,
    pages: u32,
    truncated: bool,
    has_more: bool,
    entries: Vec<DirectoryEntry>,
}

/// Execute the search command
pub async fn execute(args: SearchArgs, profile: Profile) -> CliResult<()> {
    let base_dn = args
        .base_dn
        .clone()
        .or(profile.base_dn.clone())
        .ok_or_else(|| CliError::Validation("a search base is required (--base-dn)".to_string()))?;
    let query = Query::new(base_dn, &args.filter)?.with_attributes(args.attribute_selection());
    let page_size = args
        .page_size
        .or(profile.page_size)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    // One search only ever holds one session.
    let pool = connect(&profile.pool.clone().with_pool_size(1)).await?;
    let result = run(&pool, &query, page_size, &args).await;
    pool.close().await;
    result
}

async fn run(pool: &LdapPool, query: &Query, page_size: u32, args: &SearchArgs) -> CliResult<()> {
    let mut cursor = PagingCursor::new(page_size);
    let limit = args.page_limit();
    let mut collected = Vec::new();
    let mut total = 0usize;
    let mut truncated = false;

    info!(
        base_dn = %query.base_dn(),
        filter = %query.filter(),
        page_size = cursor.page_size(),
        "Starting search"
    );

    while !cursor.is_exhausted() && limit.map_or(true, |max| cursor.pages_fetched() < max) {
        let page = pool.search_page(query, &mut cursor).await?;
        debug!(
            page = cursor.pages_fetched(),
            entries = page.len(),
            has_more = page.has_more,
            "Page received"
        );
        total += page.len();
        truncated |= page.truncated;

        if args.json {
            collected.extend(page.entries);
        } else {
            print_entries(&page.entries);
        }
    }

    let has_more = !cursor.is_exhausted();
    if args.json {
        return print_json(&SearchOutput {
            base_dn: query.base_dn().to_string(),
            filter: query.filter().to_string(),
            pages: cursor.pages_fetched(),
            truncated,
            has_more,
            entries: collected,
        })
        .map_err(Into::into);
    }

    print_info(&format!(
        "{} entries in {} page(s)",
        total,
        cursor.pages_fetched()
    ));
    if truncated {
        print_warning("The server size limit was reached; results are partial");
    }
    if has_more {
        print_info("More entries are available; rerun with --all or a larger --pages");
    }
    Ok(())
}
