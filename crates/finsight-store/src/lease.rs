use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Accounting for request-scoped connections.
///
/// Each chat request holds exactly one lease for its whole lifetime; the
/// counters make leaks observable.
#[derive(Debug, Clone, Default)]
pub struct ConnectionPool {
    counters: Arc<Counters>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a lease that is released when the guard drops.
    pub fn acquire(&self) -> ConnectionGuard {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        let counters = Arc::clone(&self.counters);
        ConnectionGuard::new(move || {
            counters.released.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Leases currently held.
    pub fn active(&self) -> usize {
        self.acquired() - self.released()
    }

    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }
}

/// Runs a release hook exactly once: on [`ConnectionGuard::release`] or on
/// drop, whichever comes first. Unwinding and early returns both drop it.
pub struct ConnectionGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ConnectionGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Releases now instead of at drop.
    pub fn release(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(release) = self.release.take() {
            debug!("Releasing request connection");
            release();
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("released", &self.release.is_none())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_release_then_drop_runs_once() {
        let pool = ConnectionPool::new();
        let guard = pool.acquire();
        assert_eq!(pool.active(), 1);
        guard.release();
        assert_eq!(pool.released(), 1);
        assert_eq!(pool.active(), 0);
    }

    #[test]
    fn test_release_on_panic() {
        let pool = ConnectionPool::new();
        let inner = pool.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.acquire();
            panic!("handler blew up");
        });
        assert!(result.is_err());
        assert_eq!(pool.released(), 1);
    }

    #[tokio::test]
    async fn test_release_when_task_aborted() {
        let pool = ConnectionPool::new();
        let inner = pool.clone();
        let (held_tx, held_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            let _guard = inner.acquire();
            let _ = held_tx.send(());
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        held_rx.await.unwrap();
        handle.abort();
        let _ = handle.await;
        assert_eq!(pool.acquired(), 1);
        assert_eq!(pool.released(), 1);
    }
}
