//! In-memory directory used by the pool and paging tests.
//!
//! Sessions page through a fixed entry list using the decimal offset of the
//! next entry as the paging cookie.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use diradmin_connector::async_trait;
use diradmin_connector::prelude::*;

static INIT: Once = Once::new();

/// Initialize logging for tests (once). Set `RUST_LOG` to see pool events.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub fn people(count: usize) -> Vec<DirectoryEntry> {
    (0..count)
        .map(|i| {
            DirectoryEntry::new(format!("uid=user{i:03},ou=people,dc=example,dc=com"))
                .with_value("uid", format!("user{i:03}"))
                .with_value("objectClass", "inetOrgPerson")
        })
        .collect()
}

#[derive(Default)]
pub struct MockDirectory {
    entries: Vec<DirectoryEntry>,
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    /// Number of upcoming `create` calls that fail.
    create_failures: AtomicUsize,
    /// Fail every `create` once this many sessions exist.
    create_limit: Mutex<Option<usize>>,
    size_limit: Mutex<Option<usize>>,
    result_override: Mutex<Option<ResultCode>>,
    probe_delay: Mutex<Option<Duration>>,
    health: Mutex<Vec<Arc<AtomicBool>>>,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl MockDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_entries(entries: Vec<DirectoryEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries,
            ..Self::default()
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed.
    pub fn live(&self) -> usize {
        self.created() - self.closed()
    }

    pub fn fail_next_creates(&self, count: usize) {
        self.create_failures.store(count, Ordering::SeqCst);
    }

    pub fn limit_creates(&self, limit: usize) {
        *self.create_limit.lock() = Some(limit);
    }

    pub fn set_size_limit(&self, limit: usize) {
        *self.size_limit.lock() = Some(limit);
    }

    pub fn set_result(&self, code: ResultCode) {
        *self.result_override.lock() = Some(code);
    }

    pub fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock() = Some(delay);
    }

    /// Break the connection behind session `serial`.
    pub fn kill(&self, serial: usize) {
        if let Some(flag) = self.health.lock().get(serial) {
            flag.store(false, Ordering::SeqCst);
        }
    }

    pub fn kill_all(&self) {
        for flag in self.health.lock().iter() {
            flag.store(false, Ordering::SeqCst);
        }
    }

    pub fn paged_requests(&self) -> Vec<SearchRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.paging.is_some())
            .cloned()
            .collect()
    }
}

pub struct MockSession {
    pub serial: usize,
    healthy: Arc<AtomicBool>,
    directory: Arc<MockDirectory>,
}

impl MockSession {
    fn page(&self, request: &SearchRequest) -> SearchResponse {
        let paging = request.paging.clone().unwrap_or(PagingControl {
            size: u32::MAX,
            cookie: Vec::new(),
        });
        let offset: usize = std::str::from_utf8(&paging.cookie)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let total = self.directory.entries.len();
        let end = offset.saturating_add(paging.size as usize).min(total);

        if let Some(limit) = *self.directory.size_limit.lock() {
            if end > limit {
                let entries = self.directory.entries[offset.min(limit)..limit].to_vec();
                return SearchResponse::success(entries)
                    .with_result(ResultCode::SIZE_LIMIT_EXCEEDED, "size limit exceeded");
            }
        }

        let cookie = if end < total {
            end.to_string().into_bytes()
        } else {
            Vec::new()
        };
        SearchResponse::success(self.directory.entries[offset..end].to_vec()).with_control(
            ResponseControl::Paging {
                size: total as u32,
                cookie,
            },
        )
    }
}

#[async_trait]
impl SearchTransport for MockSession {
    async fn search(&mut self, request: &SearchRequest) -> ConnectorResult<SearchResponse> {
        self.directory.requests.lock().push(request.clone());

        if request.paging.is_none() {
            let delay = *self.directory.probe_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }

        if !self.healthy.load(Ordering::SeqCst) {
            return Err(ConnectorError::connection_failed("connection reset by peer"));
        }

        if request.paging.is_none() {
            return Ok(SearchResponse::success(Vec::new()));
        }

        if let Some(code) = *self.directory.result_override.lock() {
            return Ok(SearchResponse::success(Vec::new()).with_result(code, "rejected by server"));
        }

        Ok(self.page(request))
    }
}

pub struct MockFactory {
    pub directory: Arc<MockDirectory>,
}

impl MockFactory {
    pub fn new(directory: &Arc<MockDirectory>) -> Self {
        Self {
            directory: Arc::clone(directory),
        }
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    type Session = MockSession;

    fn display_name(&self) -> &str {
        "mock:389"
    }

    async fn create(&self) -> ConnectorResult<MockSession> {
        let dir = &self.directory;
        let pending_failures = dir.create_failures.load(Ordering::SeqCst);
        if pending_failures > 0 {
            dir.create_failures.store(pending_failures - 1, Ordering::SeqCst);
            return Err(ConnectorError::connection_failed("connection refused"));
        }
        if let Some(limit) = *dir.create_limit.lock() {
            if dir.created() >= limit {
                return Err(ConnectorError::AuthenticationFailed {
                    bind_dn: "cn=admin,dc=example,dc=com".to_string(),
                });
            }
        }

        let healthy = Arc::new(AtomicBool::new(true));
        let serial = {
            let mut health = dir.health.lock();
            health.push(Arc::clone(&healthy));
            health.len() - 1
        };
        dir.created.fetch_add(1, Ordering::SeqCst);

        Ok(MockSession {
            serial,
            healthy,
            directory: Arc::clone(dir),
        })
    }

    async fn close(&self, _session: MockSession) {
        self.directory.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub type MockPool = ConnectionPool<MockFactory, RootDseProbe>;

pub fn config(pool_size: usize) -> PoolConfig {
    PoolConfig::new("mock").with_pool_size(pool_size)
}

pub async fn mock_pool(directory: &Arc<MockDirectory>, config: &PoolConfig) -> MockPool {
    ConnectionPool::new(MockFactory::new(directory), RootDseProbe::default(), config)
        .await
        .expect("mock pool should build")
}

/// Let spawned close tasks run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
