//! Fair, non-reentrant async lock.
//!
//! [`AsyncLock`] gives strictly FIFO access to one logical resource.  It is a
//! thin wrapper over `tokio::sync::Mutex<()>`, whose waiters are served in the
//! order they queued.  Releasing is tied to dropping the [`LockGuard`], so
//! every exit path of a critical section (including `?` and panics) hands the
//! lock to the next waiter.
//!
//! The lock is **not** reentrant: a task that already holds a guard and calls
//! [`AsyncLock::acquire`] again waits forever.  Code running inside a critical
//! section must use the capabilities it was handed instead of locking again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Proof of exclusive access.  Dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    /// Release the lock explicitly.  Equivalent to dropping the guard.
    pub fn release(self) {}
}

/// FIFO mutual-exclusion queue for async callers.
#[derive(Debug, Clone, Default)]
pub struct AsyncLock {
    inner: Arc<Mutex<()>>,
}

impl AsyncLock {
    /// Create a new, unlocked lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the lock is free and take it.
    ///
    /// Resolves immediately when unlocked; otherwise the caller joins the back
    /// of the queue.  Never fails and never times out.
    pub async fn acquire(&self) -> LockGuard {
        if let Ok(guard) = Arc::clone(&self.inner).try_lock_owned() {
            return LockGuard { _guard: guard };
        }

        tracing::debug!("lock contended, queueing");
        let guard = Arc::clone(&self.inner).lock_owned().await;
        LockGuard { _guard: guard }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`.
    ///
    /// Returns `None` if the lock could not be taken in time.  A caller that
    /// gives up leaves the queue without disturbing the order of the others.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Option<LockGuard> {
        tokio::time::timeout(timeout, self.acquire()).await.ok()
    }

    /// Whether some caller currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
