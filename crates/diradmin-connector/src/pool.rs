//! Fixed-capacity session pool
//!
//! The pool owns `capacity` slots. A slot is either idle (holding an
//! authenticated session) or vacant (its session was lost and could not be
//! replaced yet). A semaphore carries one permit per slot sitting in the
//! queue, so waiting for a permit is waiting for a slot.
//!
//! Checkout takes a slot out of the queue, validates or (re)creates its
//! session and hands the session out. Until the session is handed out the
//! slot is owned by a guard that puts it back on drop, so a checkout that
//! is cancelled or fails never loses capacity.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::PoolConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::ids::{PoolId, SessionId};
use crate::operation::Query;
use crate::paging::{self, PagingCursor, SearchPage};
use crate::traits::{SearchTransport, SessionFactory, SessionValidator};

struct Tracked<S> {
    id: SessionId,
    session: S,
    created_at: Instant,
}

impl<S> Tracked<S> {
    fn new(session: S) -> Self {
        Self {
            id: SessionId::new(),
            session,
            created_at: Instant::now(),
        }
    }
}

enum Slot<S> {
    Idle(Tracked<S>),
    Vacant,
}

struct Slots<S> {
    queue: VecDeque<Slot<S>>,
    checked_out: HashSet<SessionId>,
    closed: bool,
}

struct PoolInner<F: SessionFactory, V> {
    id: PoolId,
    factory: Arc<F>,
    validator: V,
    capacity: usize,
    checkout_timeout: Duration,
    slots: Mutex<Slots<F::Session>>,
    available: Semaphore,
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub capacity: usize,
    /// Sessions waiting in the pool.
    pub idle: usize,
    /// Slots whose session was lost and will be recreated on checkout.
    pub vacant: usize,
    /// Sessions handed out to callers.
    pub checked_out: usize,
    pub closed: bool,
}

/// A bounded pool of authenticated sessions.
///
/// Cloning is cheap and yields another handle to the same pool.
pub struct ConnectionPool<F: SessionFactory, V> {
    inner: Arc<PoolInner<F, V>>,
}

impl<F: SessionFactory, V> Clone for ConnectionPool<F, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: SessionFactory, V> fmt::Debug for ConnectionPool<F, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("id", &self.inner.id)
            .field("server", &self.inner.factory.display_name())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl<F, V> ConnectionPool<F, V>
where
    F: SessionFactory,
    V: SessionValidator<F::Session>,
{
    /// Build a pool and eagerly open `config.pool_size` sessions.
    ///
    /// Construction is all or nothing: if any session cannot be created the
    /// ones already opened are closed and the error is returned.
    #[instrument(skip_all, fields(server = %factory.display_name(), pool_size = config.pool_size))]
    pub async fn new(factory: F, validator: V, config: &PoolConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let capacity = config.pool_size;
        let mut opened: Vec<Tracked<F::Session>> = Vec::with_capacity(capacity);

        for _ in 0..capacity {
            match factory.create().await {
                Ok(session) => opened.push(Tracked::new(session)),
                Err(e) => {
                    warn!(
                        opened = opened.len(),
                        error = %e,
                        "Pool construction failed, closing sessions already opened"
                    );
                    for tracked in opened {
                        factory.close(tracked.session).await;
                    }
                    return Err(e);
                }
            }
        }

        let id = PoolId::new();
        info!(pool_id = %id, capacity, "Connection pool ready");

        Ok(Self {
            inner: Arc::new(PoolInner {
                id,
                factory: Arc::new(factory),
                validator,
                capacity,
                checkout_timeout: config.checkout_timeout(),
                slots: Mutex::new(Slots {
                    queue: opened.into_iter().map(Slot::Idle).collect(),
                    checked_out: HashSet::with_capacity(capacity),
                    closed: false,
                }),
                available: Semaphore::new(capacity),
            }),
        })
    }

    /// Borrow a validated session, waiting up to the checkout timeout.
    ///
    /// An idle session that fails validation is closed and replaced by a
    /// fresh one before being handed out. If no slot frees up in time the
    /// call fails with `PoolTimeout`; if the pool is closed, `PoolClosed`.
    #[instrument(skip(self), fields(pool_id = %self.inner.id))]
    pub async fn checkout(&self) -> ConnectorResult<PooledSession<F, V>> {
        let inner = &self.inner;

        let permit = match tokio::time::timeout(inner.checkout_timeout, inner.available.acquire())
            .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ConnectorError::PoolClosed { pool_id: inner.id }),
            Err(_) => {
                let timeout_ms = u64::try_from(inner.checkout_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms, "Checkout timed out waiting for a free session");
                return Err(ConnectorError::PoolTimeout { timeout_ms });
            }
        };
        // The permit now stands for the slot this checkout owns; it is
        // re-added when the slot goes back into the queue.
        permit.forget();

        let slot = {
            let mut slots = inner.slots.lock();
            if slots.closed {
                return Err(ConnectorError::PoolClosed { pool_id: inner.id });
            }
            slots.queue.pop_front()
        };
        let Some(slot) = slot else {
            return Err(ConnectorError::internal(
                "pool granted a permit with no slot in the queue",
            ));
        };

        let mut guard = SlotGuard {
            inner: Arc::clone(inner),
            slot: Some(slot),
        };

        let verdict = match guard.slot.as_mut() {
            Some(Slot::Idle(tracked)) => Some((
                tracked.id,
                inner.validator.validate(&mut tracked.session).await,
            )),
            _ => None,
        };

        match verdict {
            Some((_, Ok(()))) => return guard.hand_out(),
            Some((session_id, Err(e))) => {
                warn!(%session_id, error = %e, "Session failed validation, replacing it");
                if let Some(Slot::Idle(dead)) = guard.slot.replace(Slot::Vacant) {
                    inner.factory.close(dead.session).await;
                }
            }
            None => debug!("Refilling vacant slot"),
        }

        if inner.slots.lock().closed {
            return Err(ConnectorError::PoolClosed { pool_id: inner.id });
        }
        // A failed create drops the guard, which puts the vacant slot back.
        let session = inner.factory.create().await?;
        let tracked = Tracked::new(session);
        debug!(session_id = %tracked.id, "Replacement session created");
        guard.slot = Some(Slot::Idle(tracked));
        guard.hand_out()
    }

    /// Return a session to the pool.
    ///
    /// Never blocks. Rejects sessions from another pool (which are routed
    /// back to their own pool), sessions that are not checked out, and
    /// returns that would push the pool past its capacity. After
    /// [`close`](Self::close) the session is closed instead of pooled.
    pub fn checkin(&self, session: PooledSession<F, V>) -> ConnectorResult<()> {
        if session.pool.id != self.inner.id {
            let err = ConnectorError::ForeignSession {
                pool_id: self.inner.id,
                session_id: session.id,
            };
            warn!(
                pool_id = %self.inner.id,
                owner = %session.pool.id,
                session_id = %session.id,
                "Rejected check-in of a session owned by another pool"
            );
            drop(session);
            return Err(err);
        }

        let (id, created_at, session) = session.detach();
        self.inner.return_session(id, created_at, session)
    }

    /// Close a checked-out session and leave its slot vacant.
    ///
    /// Use this when a caller knows the session is broken; the next checkout
    /// of the slot opens a new session.
    pub async fn discard(&self, session: PooledSession<F, V>) -> ConnectorResult<()> {
        if session.pool.id != self.inner.id {
            let err = ConnectorError::ForeignSession {
                pool_id: self.inner.id,
                session_id: session.id,
            };
            drop(session);
            return Err(err);
        }

        let (id, _, session) = session.detach();
        let requeue = {
            let mut slots = self.inner.slots.lock();
            if !slots.checked_out.remove(&id) {
                None
            } else if slots.closed {
                Some(false)
            } else {
                slots.queue.push_back(Slot::Vacant);
                Some(true)
            }
        };

        self.inner.factory.close(session).await;
        match requeue {
            None => Err(ConnectorError::SessionNotCheckedOut {
                pool_id: self.inner.id,
                session_id: id,
            }),
            Some(requeued) => {
                if requeued {
                    self.inner.available.add_permits(1);
                }
                debug!(session_id = %id, "Session discarded");
                Ok(())
            }
        }
    }

    /// Shut the pool down.
    ///
    /// Waiting and future checkouts fail with `PoolClosed`. Idle sessions are
    /// closed now; sessions still checked out are closed when they come back.
    /// Returns the number of sessions closed. Calling it again is a no-op.
    #[instrument(skip(self), fields(pool_id = %self.inner.id))]
    pub async fn close(&self) -> usize {
        let drained: Vec<Slot<F::Session>> = {
            let mut slots = self.inner.slots.lock();
            if slots.closed {
                return 0;
            }
            slots.closed = true;
            slots.queue.drain(..).collect()
        };
        self.inner.available.close();

        let mut closed = 0;
        for slot in drained {
            if let Slot::Idle(tracked) = slot {
                self.inner.factory.close(tracked.session).await;
                closed += 1;
            }
        }

        info!(closed, "Connection pool closed");
        closed
    }
}

impl<F, V> ConnectionPool<F, V>
where
    F: SessionFactory,
    F::Session: SearchTransport,
    V: SessionValidator<F::Session>,
{
    /// Check out a session, fetch the next page of `query` and check the
    /// session back in.
    pub async fn search_page(
        &self,
        query: &Query,
        cursor: &mut PagingCursor,
    ) -> ConnectorResult<SearchPage> {
        let mut session = self.checkout().await?;
        let result = paging::page(&mut *session, query, cursor).await;
        self.checkin(session)?;
        result
    }
}

impl<F: SessionFactory, V> ConnectionPool<F, V> {
    pub fn id(&self) -> PoolId {
        self.inner.id
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn checkout_timeout(&self) -> Duration {
        self.inner.checkout_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.inner.slots.lock().closed
    }

    pub fn status(&self) -> PoolStatus {
        let slots = self.inner.slots.lock();
        let vacant = slots
            .queue
            .iter()
            .filter(|slot| matches!(slot, Slot::Vacant))
            .count();
        PoolStatus {
            capacity: self.inner.capacity,
            idle: slots.queue.len() - vacant,
            vacant,
            checked_out: slots.checked_out.len(),
            closed: slots.closed,
        }
    }
}

impl<F: SessionFactory, V> PoolInner<F, V> {
    /// Put a slot back in the queue, or close its session if the pool is
    /// shut down.
    fn release_slot(&self, slot: Slot<F::Session>) {
        let rejected = {
            let mut slots = self.slots.lock();
            if slots.closed {
                Some(slot)
            } else {
                slots.queue.push_back(slot);
                None
            }
        };

        match rejected {
            None => self.available.add_permits(1),
            Some(Slot::Idle(tracked)) => self.close_detached(tracked.session),
            Some(Slot::Vacant) => {}
        }
    }

    fn return_session(
        &self,
        id: SessionId,
        created_at: Instant,
        session: F::Session,
    ) -> ConnectorResult<()> {
        let rejected = {
            let mut slots = self.slots.lock();
            if !slots.checked_out.remove(&id) {
                Some((
                    Some(ConnectorError::SessionNotCheckedOut {
                        pool_id: self.id,
                        session_id: id,
                    }),
                    session,
                ))
            } else if slots.closed {
                Some((None, session))
            } else if slots.queue.len() + slots.checked_out.len() >= self.capacity {
                Some((
                    Some(ConnectorError::CapacityExceeded {
                        pool_id: self.id,
                        capacity: self.capacity,
                    }),
                    session,
                ))
            } else {
                slots.queue.push_back(Slot::Idle(Tracked {
                    id,
                    session,
                    created_at,
                }));
                None
            }
        };

        let Some((error, session)) = rejected else {
            self.available.add_permits(1);
            debug!(pool_id = %self.id, session_id = %id, "Session checked in");
            return Ok(());
        };

        self.close_detached(session);
        match error {
            None => {
                debug!(pool_id = %self.id, session_id = %id, "Pool closed, closing returned session");
                Ok(())
            }
            Some(e) => {
                warn!(pool_id = %self.id, session_id = %id, error = %e, "Rejected session check-in");
                Err(e)
            }
        }
    }

    /// Close a session from a synchronous context.
    fn close_detached(&self, session: F::Session) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let factory = Arc::clone(&self.factory);
                handle.spawn(async move {
                    factory.close(session).await;
                });
            }
            Err(_) => drop(session),
        }
    }
}

/// Owns a slot taken from the queue until its session is handed out.
struct SlotGuard<F: SessionFactory, V> {
    inner: Arc<PoolInner<F, V>>,
    slot: Option<Slot<F::Session>>,
}

impl<F: SessionFactory, V> SlotGuard<F, V> {
    fn hand_out(mut self) -> ConnectorResult<PooledSession<F, V>> {
        let tracked = match self.slot.take() {
            Some(Slot::Idle(tracked)) => tracked,
            other => {
                self.slot = other;
                return Err(ConnectorError::internal("no session in slot to hand out"));
            }
        };

        let closed = {
            let mut slots = self.inner.slots.lock();
            if !slots.closed {
                slots.checked_out.insert(tracked.id);
            }
            slots.closed
        };
        if closed {
            debug!(pool_id = %self.inner.id, session_id = %tracked.id, "Pool closed during checkout, closing session");
            self.inner.close_detached(tracked.session);
            return Err(ConnectorError::PoolClosed {
                pool_id: self.inner.id,
            });
        }
        debug!(pool_id = %self.inner.id, session_id = %tracked.id, "Session checked out");

        Ok(PooledSession {
            pool: Arc::clone(&self.inner),
            id: tracked.id,
            created_at: tracked.created_at,
            session: Some(tracked.session),
        })
    }
}

impl<F: SessionFactory, V> Drop for SlotGuard<F, V> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.inner.release_slot(slot);
        }
    }
}

/// A session on loan from a [`ConnectionPool`].
///
/// Dereferences to the underlying session. Dropping it returns the session
/// to the pool it came from.
pub struct PooledSession<F: SessionFactory, V> {
    pool: Arc<PoolInner<F, V>>,
    id: SessionId,
    created_at: Instant,
    session: Option<F::Session>,
}

impl<F: SessionFactory, V> PooledSession<F, V> {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Pool this session belongs to.
    pub fn pool_id(&self) -> PoolId {
        self.pool.id
    }

    /// Time since the underlying session was opened.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    fn detach(mut self) -> (SessionId, Instant, F::Session) {
        let session = self
            .session
            .take()
            .expect("pooled session holds its session until detached");
        (self.id, self.created_at, session)
    }
}

impl<F: SessionFactory, V> Deref for PooledSession<F, V> {
    type Target = F::Session;

    fn deref(&self) -> &Self::Target {
        self.session
            .as_ref()
            .expect("pooled session holds its session until detached")
    }
}

impl<F: SessionFactory, V> DerefMut for PooledSession<F, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
            .as_mut()
            .expect("pooled session holds its session until detached")
    }
}

impl<F: SessionFactory, V> fmt::Debug for PooledSession<F, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("id", &self.id)
            .field("pool_id", &self.pool.id)
            .finish()
    }
}

impl<F: SessionFactory, V> Drop for PooledSession<F, V> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.pool.return_session(self.id, self.created_at, session) {
                warn!(session_id = %self.id, error = %e, "Dropped session could not be returned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        created: AtomicUsize,
        closed: AtomicUsize,
    }

    struct CountingFactory(Arc<Counting>);

    #[async_trait]
    impl SessionFactory for CountingFactory {
        type Session = usize;

        fn display_name(&self) -> &str {
            "counting"
        }

        async fn create(&self) -> ConnectorResult<usize> {
            Ok(self.0.created.fetch_add(1, Ordering::SeqCst))
        }

        async fn close(&self, _session: usize) {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct AlwaysValid;

    #[async_trait]
    impl SessionValidator<usize> for AlwaysValid {
        async fn validate(&self, _session: &mut usize) -> ConnectorResult<()> {
            Ok(())
        }
    }

    async fn pool(size: usize) -> (ConnectionPool<CountingFactory, AlwaysValid>, Arc<Counting>) {
        let counts = Arc::new(Counting::default());
        let config = PoolConfig::new("mock").with_pool_size(size);
        let pool = ConnectionPool::new(CountingFactory(Arc::clone(&counts)), AlwaysValid, &config)
            .await
            .unwrap();
        (pool, counts)
    }

    #[tokio::test]
    async fn test_status_tracks_checkouts() {
        let (pool, counts) = pool(3).await;
        assert_eq!(counts.created.load(Ordering::SeqCst), 3);

        let a = pool.checkout().await.unwrap();
        let status = pool.status();
        assert_eq!(status.idle, 2);
        assert_eq!(status.checked_out, 1);
        assert_eq!(status.vacant, 0);
        assert!(!status.closed);

        pool.checkin(a).unwrap();
        assert_eq!(pool.status().idle, 3);
        assert_eq!(pool.status().checked_out, 0);
    }

    #[tokio::test]
    async fn test_drop_returns_session() {
        let (pool, _) = pool(1).await;
        {
            let _session = pool.checkout().await.unwrap();
            assert_eq!(pool.status().idle, 0);
        }
        assert_eq!(pool.status().idle, 1);
        pool.checkout().await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_keep_identity_across_checkouts() {
        let (pool, _) = pool(1).await;
        let first = pool.checkout().await.unwrap();
        let first_id = first.id();
        let value = *first;
        pool.checkin(first).unwrap();

        let second = pool.checkout().await.unwrap();
        assert_eq!(second.id(), first_id);
        assert_eq!(*second, value);
        assert_eq!(second.pool_id(), pool.id());
    }

    #[tokio::test]
    async fn test_discard_leaves_vacant_slot() {
        let (pool, counts) = pool(1).await;
        let session = pool.checkout().await.unwrap();
        pool.discard(session).await.unwrap();

        assert_eq!(counts.closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.status().vacant, 1);

        let replacement = pool.checkout().await.unwrap();
        assert_eq!(*replacement, 1);
        assert_eq!(counts.created.load(Ordering::SeqCst), 2);
    }

    fn forge(
        pool: &ConnectionPool<CountingFactory, AlwaysValid>,
        id: SessionId,
    ) -> PooledSession<CountingFactory, AlwaysValid> {
        PooledSession {
            pool: Arc::clone(&pool.inner),
            id,
            created_at: Instant::now(),
            session: Some(99),
        }
    }

    #[tokio::test]
    async fn test_double_checkin_is_rejected() {
        let (pool, counts) = pool(2).await;
        let session = pool.checkout().await.unwrap();
        let id = session.id();
        pool.checkin(session).unwrap();

        let err = pool.checkin(forge(&pool, id)).unwrap_err();
        assert!(matches!(err, ConnectorError::SessionNotCheckedOut { .. }));
        assert_eq!(pool.status().idle, 2);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(counts.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_checkin_past_capacity_is_rejected() {
        let (pool, _) = pool(1).await;
        let stray = SessionId::new();
        pool.inner.slots.lock().checked_out.insert(stray);

        let err = pool.checkin(forge(&pool, stray)).unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::CapacityExceeded { capacity: 1, .. }
        ));
        assert_eq!(pool.status().idle, 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (pool, counts) = pool(2).await;
        assert_eq!(pool.close().await, 2);
        assert_eq!(pool.close().await, 0);
        assert!(pool.is_closed());
        assert_eq!(counts.closed.load(Ordering::SeqCst), 2);
    }
}
