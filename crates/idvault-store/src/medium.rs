//! String-keyed persistent key-value media.
//!
//! A blob store persists exactly one string per store name.  Where that
//! string lives is abstracted behind [`StorageMedium`]:
//!
//! - [`MemoryStorage`] -- a concurrent in-process map.  Clones share the same
//!   map, so several stores (or a reopened store) see each other's writes.
//! - [`FileStorage`] -- one file per key inside a directory, replaced
//!   atomically on every write.
//!
//! Media are synchronous and have no transactions; serialization of
//! read-modify-write sequences is the blob store's job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Opaque persistent string storage.
///
/// Implementations must be `Send + Sync` so stores can be shared across
/// async tasks.
pub trait StorageMedium: Send + Sync {
    /// Read the value stored under `name`, or `None` if absent.
    fn get(&self, name: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `name`, replacing any previous value.
    fn set(&self, name: &str, value: &str) -> StoreResult<()>;

    /// Remove `name`.  Removing an absent key is not an error.
    fn remove(&self, name: &str) -> StoreResult<()>;
}

impl<M: StorageMedium + ?Sized> StorageMedium for Arc<M> {
    fn get(&self, name: &str) -> StoreResult<Option<String>> {
        (**self).get(name)
    }

    fn set(&self, name: &str, value: &str) -> StoreResult<()> {
        (**self).set(name, value)
    }

    fn remove(&self, name: &str) -> StoreResult<()> {
        (**self).remove(name)
    }
}

// ---------------------------------------------------------------------------
// In-memory medium
// ---------------------------------------------------------------------------

/// In-process medium backed by a [`DashMap`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageMedium for MemoryStorage {
    fn get(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(name).map(|v| v.value().clone()))
    }

    fn set(&self, name: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> StoreResult<()> {
        self.entries.remove(name);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed medium
// ---------------------------------------------------------------------------

/// Directory-backed medium: the value for key `k` lives in `<dir>/k`.
///
/// Writes go to a hidden temporary file that is then renamed over the
/// target, so readers see either the old or the new envelope, never a torn
/// one.  On Unix the files are readable by the owner only.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the storage directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(path = %dir.display(), "opened file storage");
        Ok(Self { dir })
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> StoreResult<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::Medium {
                reason: format!("invalid storage key: {name:?}"),
            });
        }
        Ok(self.dir.join(name))
    }
}

impl StorageMedium for FileStorage {
    fn get(&self, name: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(name)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, name: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(name)?;
        let tmp = self.dir.join(format!(".{name}.tmp"));

        std::fs::write(&tmp, value)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &path)?;
        tracing::trace!(path = %path.display(), bytes = value.len(), "wrote storage file");
        Ok(())
    }

    fn remove(&self, name: &str) -> StoreResult<()> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
