//! Store configuration.
//!
//! [`StoreOptions`] controls how a blob store opens and how long callers may
//! wait for its lock.  The defaults reproduce the historical behavior: keep
//! unreadable data (fail the open instead) and wait for the lock forever.

use std::time::Duration;

/// Options applied when opening an [`EncryptedStore`](crate::EncryptedStore).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Discard a persisted entry that cannot be decrypted with the store's
    /// key instead of failing the open.
    ///
    /// Default: **false**.
    pub force: bool,

    /// Maximum time an operation waits for the store lock.  `None` waits
    /// indefinitely.
    ///
    /// Default: **None**.
    pub lock_timeout: Option<Duration>,
}

impl StoreOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable force-reset of unreadable data.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Bound lock waits by `timeout`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}
