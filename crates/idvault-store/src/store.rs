//! Encrypted, lock-serialized blob store.
//!
//! An [`EncryptedStore<T>`] binds a storage name, a [`KeyHandle`] and an
//! [`AsyncLock`].  The whole value `T` is serialized to JSON, sealed into one
//! [`Envelope`] and written under the store's name; every read decrypts the
//! whole envelope again.  Nothing is cached between calls.
//!
//! Read-modify-write sequences go through [`EncryptedStore::atomic_operation`].
//! The closure receives a [`Transaction`] whose `get`/`set`/`delete` run
//! without touching the lock, because the lock is already held for the whole
//! closure.  The transaction only exists inside the closure, so no code can
//! use it to bypass the lock once the operation has finished.
//!
//! ```text
//! atomic_operation:  acquire ─► get (decrypt) ─► mutate ─► set (encrypt, persist) ─► release
//! ```

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::StoreOptions;
use crate::crypto::{self, KeyHandle, KeySource};
use crate::envelope::Envelope;
use crate::error::{StoreError, StoreResult};
use crate::lock::{AsyncLock, LockGuard};
use crate::medium::StorageMedium;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Inner {
    name: String,
    key: KeyHandle,
    medium: Arc<dyn StorageMedium>,
    lock: AsyncLock,
    options: StoreOptions,
    deleted: AtomicBool,
}

impl Inner {
    fn ensure_live(&self) -> StoreResult<()> {
        if self.deleted.load(Ordering::SeqCst) {
            return Err(StoreError::Deleted {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    async fn lock(&self) -> StoreResult<LockGuard> {
        match self.options.lock_timeout {
            None => Ok(self.lock.acquire().await),
            Some(timeout) => self.lock.acquire_timeout(timeout).await.ok_or_else(|| {
                tracing::warn!(store = %self.name, ?timeout, "lock wait timed out");
                StoreError::LockTimeout {
                    name: self.name.clone(),
                    timeout,
                }
            }),
        }
    }

    /// Read and decrypt the current value.  Caller must hold the lock (or be
    /// opening the store).
    fn read<T: DeserializeOwned>(&self) -> StoreResult<Option<T>> {
        self.ensure_live()?;

        let Some(raw) = self.medium.get(&self.name)? else {
            tracing::debug!(store = %self.name, "no persisted value");
            return Ok(None);
        };

        let value = self.decode(&raw).map_err(|e| StoreError::BadDecrypt {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(store = %self.name, "read persisted value");
        Ok(Some(value))
    }

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> StoreResult<T> {
        let envelope = Envelope::from_json_str(raw)?;
        let plaintext = crypto::decrypt(&envelope, &self.key)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Encrypt `value` with a fresh nonce and replace the persisted entry.
    fn write<T: Serialize>(&self, value: &T) -> StoreResult<()> {
        self.ensure_live()?;

        let plaintext = serde_json::to_vec(value)?;
        let envelope = crypto::encrypt(&plaintext, &self.key)?;
        self.medium.set(&self.name, &envelope.to_json_string()?)?;

        tracing::debug!(store = %self.name, bytes = plaintext.len(), "wrote persisted value");
        Ok(())
    }

    fn remove(&self) -> StoreResult<()> {
        self.medium.remove(&self.name)?;
        self.deleted.store(true, Ordering::SeqCst);
        tracing::info!(store = %self.name, "deleted persisted value");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// One encrypted, name-addressed value of type `T`.
///
/// Cloning yields another handle to the same store (same lock, same key).
pub struct EncryptedStore<T> {
    inner: Arc<Inner>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for EncryptedStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for EncryptedStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("name", &self.inner.name)
            .field("key", &self.inner.key)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl<T> EncryptedStore<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Open the store named `name` on `medium`.
    ///
    /// Resolves the key, then probes any existing persisted value.  If it
    /// cannot be decrypted the open fails with [`StoreError::BadDecrypt`],
    /// unless [`StoreOptions::force`] is set, in which case the unreadable
    /// entry is discarded and the store starts empty.
    ///
    /// # Errors
    ///
    /// Key resolution errors, medium errors, and `BadDecrypt` without force.
    pub async fn open(
        name: impl Into<String>,
        key: impl Into<KeySource>,
        medium: Arc<dyn StorageMedium>,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let name = name.into();
        let key = key.into().resolve().await?;

        let store = Self {
            inner: Arc::new(Inner {
                name,
                key,
                medium,
                lock: AsyncLock::new(),
                options,
                deleted: AtomicBool::new(false),
            }),
            _marker: PhantomData,
        };

        store.init_storage()?;

        tracing::info!(store = %store.inner.name, "store ready");
        Ok(store)
    }

    fn init_storage(&self) -> StoreResult<()> {
        match self.inner.read::<T>() {
            Ok(_) => Ok(()),
            Err(e) if e.is_bad_decrypt() && self.inner.options.force => {
                tracing::warn!(
                    store = %self.inner.name,
                    error = %e,
                    "existing data unreadable with this key, discarding (force)"
                );
                self.inner.medium.remove(&self.inner.name)
            }
            Err(e) => Err(e),
        }
    }

    /// The storage name (the key on the medium).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Read and decrypt the whole value.  `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// [`StoreError::BadDecrypt`] if a value is stored but unreadable.
    pub async fn get(&self) -> StoreResult<Option<T>> {
        let _guard = self.inner.lock().await?;
        self.inner.read()
    }

    /// Replace the whole value.
    pub async fn set(&self, value: &T) -> StoreResult<()> {
        let _guard = self.inner.lock().await?;
        self.inner.write(value)
    }

    /// Remove the persisted entry.  Idempotent on the medium; afterwards this
    /// instance reports [`StoreError::Deleted`].
    pub async fn delete(&self) -> StoreResult<()> {
        let _guard = self.inner.lock().await?;
        self.inner.remove()
    }

    /// Whether a persisted entry exists, without decrypting it.
    pub async fn exists(&self) -> StoreResult<bool> {
        self.inner.ensure_live()?;
        Ok(self.inner.medium.get(&self.inner.name)?.is_some())
    }

    /// Whether [`delete`](Self::delete) has been called on this store.
    pub fn is_deleted(&self) -> bool {
        self.inner.deleted.load(Ordering::SeqCst)
    }

    /// Run `f` while holding the store lock exclusively.
    ///
    /// Operations on the same store run their closures one at a time, in the
    /// order they queued for the lock.  The lock is released on every exit,
    /// including when `f` fails; its error is returned unchanged.
    ///
    /// ```rust,ignore
    /// let count = store
    ///     .atomic_operation(|tx| Box::pin(async move {
    ///         let next = tx.get()?.unwrap_or(0) + 1;
    ///         tx.set(&next)?;
    ///         Ok::<_, StoreError>(next)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn atomic_operation<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction<T>) -> BoxFuture<'t, Result<R, E>> + Send,
        R: Send,
        E: From<StoreError> + Send,
    {
        let guard = self.inner.lock().await?;
        tracing::trace!(store = %self.inner.name, "entered atomic operation");

        let mut tx = Transaction {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        };
        let result = f(&mut tx).await;

        guard.release();
        tracing::trace!(store = %self.inner.name, ok = result.is_ok(), "left atomic operation");
        result
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Access to a store from inside [`EncryptedStore::atomic_operation`].
///
/// Holding a `&mut Transaction` means the lock is held; none of its methods
/// lock again.
pub struct Transaction<T> {
    inner: Arc<Inner>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Transaction<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Read and decrypt the current value.
    pub fn get(&self) -> StoreResult<Option<T>> {
        self.inner.read()
    }

    /// Replace the whole value.
    pub fn set(&mut self, value: &T) -> StoreResult<()> {
        self.inner.write(value)
    }

    /// Remove the persisted entry; the store is unusable afterwards.
    pub fn delete(&mut self) -> StoreResult<()> {
        self.inner.remove()
    }

    /// The storage name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
