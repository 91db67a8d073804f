// Pool invariants exercised through a mock session factory: the capacity
// bound holds at every instant, double release is harmless, timeouts and
// exhaustion surface as typed errors, idle sessions are reused and swept.

use async_trait::async_trait;
use kwscout::browser_pool::{BrowserPool, PoolConfig, SessionFactory};
use kwscout::PoolError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockFactory {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    dead: Mutex<HashSet<usize>>,
    next: AtomicUsize,
}

impl MockFactory {
    fn mark_dead(&self, session: usize) {
        self.dead.lock().insert(session);
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    type Session = usize;

    async fn create(&self) -> Result<usize, PoolError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live.fetch_max(live, Ordering::SeqCst);
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }

    async fn is_alive(&self, session: &usize) -> bool {
        !self.dead.lock().contains(session)
    }

    async fn destroy(&self, _session: usize) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn pool_config(max_size: usize) -> PoolConfig {
    PoolConfig {
        min_size: 0,
        max_size,
        idle_timeout: Duration::from_secs(300),
        acquire_timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn concurrent_checkouts_never_exceed_max_size() {
    let factory = Arc::new(MockFactory::default());
    let pool = BrowserPool::new(Arc::clone(&factory), pool_config(3));

    let checked_out = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..24 {
        let pool = Arc::clone(&pool);
        let checked_out = Arc::clone(&checked_out);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            let mut guard = pool.acquire().await.expect("acquire within timeout");
            let now = checked_out.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            checked_out.fetch_sub(1, Ordering::SeqCst);
            guard.release().await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3, "checkout bound violated");
    assert!(factory.peak_live.load(Ordering::SeqCst) <= 3, "creation bound violated");
}

#[tokio::test]
async fn double_release_does_not_corrupt_accounting() {
    let factory = Arc::new(MockFactory::default());
    let pool = BrowserPool::new(Arc::clone(&factory), pool_config(2));

    let mut guard = pool.acquire().await.unwrap();
    guard.release().await;
    guard.release().await; // explicit second call: no-op by contract
    drop(guard); // and the drop path after release: also a no-op

    let status = pool.status().await;
    assert_eq!(status.active, 0);
    assert_eq!(status.idle, 1);
    assert_eq!(status.total, 1);

    // Capacity is fully available again
    let _a = pool.acquire().await.unwrap();
    let _b = pool.acquire().await.unwrap();
}

#[tokio::test]
async fn released_sessions_are_reused_not_relaunched() {
    let factory = Arc::new(MockFactory::default());
    let pool = BrowserPool::new(Arc::clone(&factory), pool_config(2));

    for _ in 0..5 {
        let mut guard = pool.acquire().await.unwrap();
        guard.release().await;
    }

    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn acquire_times_out_when_all_sessions_are_held() {
    let factory = Arc::new(MockFactory::default());
    let pool = BrowserPool::new(Arc::clone(&factory), pool_config(1));

    let _held = pool.acquire().await.unwrap();
    match pool.acquire().await {
        Err(PoolError::AcquireTimeout { .. }) => {}
        other => panic!("expected AcquireTimeout, got {:?}", other.map(|g| g.id())),
    }
}

#[tokio::test]
async fn try_acquire_fails_fast_with_exhausted() {
    let factory = Arc::new(MockFactory::default());
    let pool = BrowserPool::new(Arc::clone(&factory), pool_config(1));

    let _held = pool.acquire().await.unwrap();
    match pool.try_acquire().await {
        Err(PoolError::Exhausted { active, max_size }) => {
            assert_eq!(active, 1);
            assert_eq!(max_size, 1);
        }
        other => panic!("expected Exhausted, got {:?}", other.map(|g| g.id())),
    }
}

#[tokio::test]
async fn waiters_proceed_when_a_session_is_released() {
    let factory = Arc::new(MockFactory::default());
    let pool = BrowserPool::new(Arc::clone(&factory), pool_config(1));

    let mut held = pool.acquire().await.unwrap();
    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire().await.map(|g| g.id()) })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    held.release().await;

    let id = waiter.await.unwrap().expect("waiter served after release");
    assert_eq!(id, 0, "waiter reuses the released session");
}

#[tokio::test]
async fn dead_idle_sessions_are_destroyed_and_replaced() {
    let factory = Arc::new(MockFactory::default());
    let pool = BrowserPool::new(Arc::clone(&factory), pool_config(2));

    let first_id = {
        let mut guard = pool.acquire().await.unwrap();
        let session = *guard.session().unwrap();
        guard.release().await;
        session
    };

    factory.mark_dead(first_id);

    let guard = pool.acquire().await.unwrap();
    assert_ne!(*guard.session().unwrap(), first_id);
    assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_idle_sessions_are_swept_on_acquire() {
    let factory = Arc::new(MockFactory::default());
    let config = PoolConfig {
        idle_timeout: Duration::from_millis(30),
        ..pool_config(2)
    };
    let pool = BrowserPool::new(Arc::clone(&factory), config);

    {
        let mut guard = pool.acquire().await.unwrap();
        guard.release().await;
    }
    tokio::time::sleep(Duration::from_millis(60)).await;

    let _guard = pool.acquire().await.unwrap();
    assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1, "stale session evicted");
    assert_eq!(factory.created.load(Ordering::SeqCst), 2, "replacement created lazily");
}

#[tokio::test]
async fn warm_up_fills_idle_set_to_min_size() {
    let factory = Arc::new(MockFactory::default());
    let config = PoolConfig {
        min_size: 2,
        ..pool_config(3)
    };
    let pool = BrowserPool::new(Arc::clone(&factory), config);
    pool.warm_up().await;

    let status = pool.status().await;
    assert_eq!(status.idle, 2);
    assert_eq!(status.active, 0);
    assert_eq!(status.idle_session_age_secs.len(), 2);
}

#[tokio::test]
async fn shutdown_destroys_idle_sessions_and_rejects_acquires() {
    let factory = Arc::new(MockFactory::default());
    let pool = BrowserPool::new(Arc::clone(&factory), pool_config(2));
    pool.warm_up().await;

    {
        let mut guard = pool.acquire().await.unwrap();
        guard.release().await;
    }

    pool.shutdown().await;
    assert_eq!(factory.live.load(Ordering::SeqCst), 0, "all sessions destroyed");
    assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
}
