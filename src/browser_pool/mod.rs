//! Bounded pool of reusable browser sessions
//!
//! Browser processes are scarce, crash-prone and exclusively held, so the
//! pool enforces three things:
//! - concurrently checked-out sessions never exceed `max_size`, at every
//!   instant, even under acquire bursts (a fair semaphore bounds capacity
//!   and creation happens only while holding a permit);
//! - waiters are served FIFO and never wait past `acquire_timeout`;
//! - every acquired session is eventually returned or destroyed, on every
//!   code path, via the RAII [`SessionGuard`].
//!
//! A session is either inside the idle deque or owned by exactly one
//! guard - checkout state is structural, not a flag, so it cannot be both
//! or neither. A sweep on every acquire evicts idle sessions older than
//! `idle_timeout`; a session whose underlying process died is caught by
//! the liveness probe at checkout instead. Either way, replacements are
//! created lazily on demand.
//!
//! The pool is generic over a [`SessionFactory`] so tests can drive the
//! acquire/release interleavings with a mock factory while production uses
//! [`ChromeFactory`](crate::browser_pool::ChromeFactory).

mod launch;

pub use launch::{ChromeFactory, ChromeSession};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::serde_duration_ms;
use crate::error::PoolError;

/// Pool sizing and timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Sessions created eagerly by `warm_up`
    pub min_size: usize,
    /// Hard cap on total sessions (checked out + idle)
    pub max_size: usize,
    /// Idle sessions older than this are evicted on the next sweep
    #[serde(with = "serde_duration_ms")]
    pub idle_timeout: Duration,
    /// Bound on the FIFO wait inside `acquire`
    #[serde(with = "serde_duration_ms")]
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 3,
            idle_timeout: Duration::from_secs(300),
            acquire_timeout: Duration::from_secs(15),
        }
    }
}

/// Creates, probes and destroys the pooled resource.
///
/// `create` runs while the caller holds a capacity permit, so the factory
/// never observes more than `max_size` live sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: Send + 'static;

    async fn create(&self) -> Result<Self::Session, PoolError>;

    /// Cheap liveness probe, e.g. a CDP `version` round-trip
    async fn is_alive(&self, session: &Self::Session) -> bool;

    async fn destroy(&self, session: Self::Session);
}

#[async_trait]
impl<F: SessionFactory> SessionFactory for Arc<F>
where
    F::Session: Sync,
{
    type Session = F::Session;

    async fn create(&self) -> Result<Self::Session, PoolError> {
        (**self).create().await
    }

    async fn is_alive(&self, session: &Self::Session) -> bool {
        (**self).is_alive(session).await
    }

    async fn destroy(&self, session: Self::Session) {
        (**self).destroy(session).await
    }
}

/// A session plus its pool metadata
#[derive(Debug)]
pub struct PooledSession<S> {
    pub id: u64,
    pub created_at: Instant,
    pub last_used: Instant,
    session: S,
}

impl<S> PooledSession<S> {
    fn new(id: u64, session: S) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_used: now,
            session,
        }
    }
}

/// Point-in-time pool accounting, exposed for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub max_size: usize,
    /// Ages of idle sessions in seconds, oldest first
    pub idle_session_age_secs: Vec<u64>,
}

struct PoolInner<S> {
    idle: VecDeque<PooledSession<S>>,
    active: usize,
}

/// Bounded browser session pool with FIFO-fair acquire
pub struct BrowserPool<F: SessionFactory> {
    factory: F,
    config: PoolConfig,
    /// Capacity permits; `tokio`'s semaphore queues waiters FIFO
    semaphore: Arc<Semaphore>,
    inner: Mutex<PoolInner<F::Session>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<F: SessionFactory> BrowserPool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Arc<Self> {
        let max_size = config.max_size.max(1);
        Arc::new(Self {
            factory,
            semaphore: Arc::new(Semaphore::new(max_size)),
            inner: Mutex::new(PoolInner {
                idle: VecDeque::new(),
                active: 0,
            }),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            config: PoolConfig { max_size, ..config },
        })
    }

    /// Eagerly create `min_size` idle sessions.
    ///
    /// Launch failures are logged and skipped; the pool recovers lazily on
    /// the next acquire.
    pub async fn warm_up(&self) {
        let target = self.config.min_size.min(self.config.max_size);
        for _ in 0..target {
            match self.factory.create().await {
                Ok(session) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    self.inner
                        .lock()
                        .await
                        .idle
                        .push_back(PooledSession::new(id, session));
                    debug!(id, "pre-warmed pool session");
                }
                Err(e) => warn!("failed to pre-warm pool session: {e}"),
            }
        }
        info!(
            idle = self.inner.lock().await.idle.len(),
            "browser pool warmed up"
        );
    }

    /// Acquire a session, waiting FIFO up to `acquire_timeout`.
    pub async fn acquire(self: &Arc<Self>) -> Result<SessionGuard<F>, PoolError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(PoolError::Closed);
        }

        let permit = match tokio::time::timeout(
            self.config.acquire_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                return Err(PoolError::AcquireTimeout {
                    waited: self.config.acquire_timeout,
                })
            }
        };

        let session = self.checkout().await?;
        debug!(id = session.id, "acquired pool session");

        Ok(SessionGuard {
            pool: Arc::clone(self),
            session: Some(session),
            permit: Some(permit),
        })
    }

    /// Acquire without waiting; fails with `Exhausted` when no capacity is
    /// instantly available.
    pub async fn try_acquire(self: &Arc<Self>) -> Result<SessionGuard<F>, PoolError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(PoolError::Closed);
        }

        let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let inner = self.inner.lock().await;
                return Err(PoolError::Exhausted {
                    active: inner.active,
                    max_size: self.config.max_size,
                });
            }
        };

        let session = self.checkout().await?;
        Ok(SessionGuard {
            pool: Arc::clone(self),
            session: Some(session),
            permit: Some(permit),
        })
    }

    /// Take an idle session or create a new one. Caller holds a permit.
    async fn checkout(&self) -> Result<PooledSession<F::Session>, PoolError> {
        self.sweep_stale().await;

        loop {
            let candidate = {
                let mut inner = self.inner.lock().await;
                inner.idle.pop_front()
            };

            match candidate {
                Some(mut pooled) => {
                    // Liveness probe happens outside the lock
                    if self.factory.is_alive(&pooled.session).await {
                        pooled.last_used = Instant::now();
                        self.inner.lock().await.active += 1;
                        return Ok(pooled);
                    }
                    warn!(id = pooled.id, "idle session failed liveness probe, destroying");
                    self.factory.destroy(pooled.session).await;
                }
                None => {
                    let session = self.factory.create().await?;
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    self.inner.lock().await.active += 1;
                    debug!(id, "created pool session on demand");
                    return Ok(PooledSession::new(id, session));
                }
            }
        }
    }

    /// Evict idle sessions past `idle_timeout`. Oldest sit at the front.
    async fn sweep_stale(&self) {
        let now = Instant::now();
        let mut stale = Vec::new();
        {
            let mut inner = self.inner.lock().await;
            while let Some(front) = inner.idle.front() {
                if now.duration_since(front.last_used) > self.config.idle_timeout {
                    if let Some(session) = inner.idle.pop_front() {
                        stale.push(session);
                    }
                } else {
                    break;
                }
            }
        }

        for pooled in stale {
            debug!(
                id = pooled.id,
                idle_for = ?now.duration_since(pooled.last_used),
                "evicting idle session"
            );
            self.factory.destroy(pooled.session).await;
        }
    }

    /// Return a session to the idle set. The permit is dropped only after
    /// the session is back in the deque, so a freed capacity slot always
    /// sees the released session.
    async fn give_back(
        &self,
        mut pooled: PooledSession<F::Session>,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        if self.closed.load(Ordering::Relaxed) {
            debug!(id = pooled.id, "pool closed, destroying released session");
            {
                let mut inner = self.inner.lock().await;
                inner.active = inner.active.saturating_sub(1);
            }
            self.factory.destroy(pooled.session).await;
            drop(permit);
            return;
        }

        let id = pooled.id;
        {
            let mut inner = self.inner.lock().await;
            inner.active = inner.active.saturating_sub(1);
            pooled.last_used = Instant::now();
            inner.idle.push_back(pooled);
        }
        drop(permit);
        debug!(id, "released session back to pool");
    }

    /// Current accounting snapshot
    pub async fn status(&self) -> PoolStatus {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        PoolStatus {
            total: inner.active + inner.idle.len(),
            active: inner.active,
            idle: inner.idle.len(),
            max_size: self.config.max_size,
            idle_session_age_secs: inner
                .idle
                .iter()
                .map(|s| now.duration_since(s.created_at).as_secs())
                .collect(),
        }
    }

    /// Stop handing out sessions and destroy the idle set. Outstanding
    /// guards destroy their sessions on release.
    pub async fn shutdown(&self) {
        info!("shutting down browser pool");
        self.closed.store(true, Ordering::Relaxed);
        self.semaphore.close();

        let drained: Vec<_> = {
            let mut inner = self.inner.lock().await;
            inner.idle.drain(..).collect()
        };
        for pooled in drained {
            self.factory.destroy(pooled.session).await;
        }
        info!("browser pool shutdown complete");
    }
}

/// RAII guard for one checked-out session.
///
/// Dropping the guard returns the session to the pool; [`release`] does the
/// same deterministically and is safe to call more than once.
///
/// [`release`]: SessionGuard::release
pub struct SessionGuard<F: SessionFactory> {
    pool: Arc<BrowserPool<F>>,
    session: Option<PooledSession<F::Session>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl<F: SessionFactory> SessionGuard<F> {
    pub fn id(&self) -> u64 {
        self.session.as_ref().map(|s| s.id).unwrap_or(u64::MAX)
    }

    pub fn session(&self) -> Option<&F::Session> {
        self.session.as_ref().map(|s| &s.session)
    }

    /// Explicitly return the session. Idempotent: a second call (or the
    /// eventual drop) is a no-op and cannot corrupt pool accounting.
    pub async fn release(&mut self) {
        if let Some(pooled) = self.session.take() {
            let permit = self.permit.take();
            self.pool.give_back(pooled, permit).await;
        }
    }
}

impl<F: SessionFactory> Drop for SessionGuard<F> {
    fn drop(&mut self) {
        if let Some(pooled) = self.session.take() {
            let permit = self.permit.take();
            let pool = Arc::clone(&self.pool);
            tokio::spawn(async move {
                pool.give_back(pooled, permit).await;
            });
        }
    }
}
