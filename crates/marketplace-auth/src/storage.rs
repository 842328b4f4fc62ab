//! Key-value storage for persisted client state
//!
//! `KeyValueStore` is the seam between the client and wherever tokens live.
//! It offers plain get/set/multi-set/multi-remove with no atomicity across
//! keys: a crash between two writes of a `multi_set` may leave one key old.
//! Callers must tolerate that.
//!
//! Two implementations:
//! - `MemoryStore` for tests and short-lived processes
//! - `FileStore` backed by a JSON object file, written with temp-file + rename

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Boxed future returned by `KeyValueStore` methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Persisted string key-value storage.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn KeyValueStore>`).
pub trait KeyValueStore: Send + Sync {
    /// Read one key. Missing keys are `None`, not an error.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Write one key.
    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

    /// Write several keys.
    fn multi_set<'a>(&'a self, pairs: Vec<(String, String)>) -> StoreFuture<'a, ()>;

    /// Remove several keys. Absent keys are ignored.
    fn multi_remove<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()>;
}

/// In-process store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.state.lock().await.insert(key.to_owned(), value);
            Ok(())
        })
    }

    fn multi_set<'a>(&'a self, pairs: Vec<(String, String)>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.extend(pairs);
            Ok(())
        })
    }

    fn multi_remove<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            for key in keys {
                state.remove(*key);
            }
            Ok(())
        })
    }
}

/// JSON file store.
///
/// The whole map is held in memory behind a Mutex; every mutation rewrites
/// the file atomically while the lock is held, so concurrent writers in one
/// process serialize. Separate processes sharing the file are last-writer-wins.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Load the store from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}`.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading storage file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing storage file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded storage");
            entries
        } else {
            info!(path = %path.display(), "storage file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(key.to_owned(), value);
            debug!(key, "set storage key");
            write_atomic(&self.path, &state).await
        })
    }

    fn multi_set<'a>(&'a self, pairs: Vec<(String, String)>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let count = pairs.len();
            state.extend(pairs);
            debug!(count, "set storage keys");
            write_atomic(&self.path, &state).await
        })
    }

    fn multi_remove<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut changed = false;
            for key in keys {
                changed |= state.remove(*key).is_some();
            }
            if !changed {
                return Ok(());
            }
            debug!(?keys, "removed storage keys");
            write_atomic(&self.path, &state).await
        })
    }
}

/// Write the map to a file atomically.
///
/// Writes a temporary file in the same directory, then renames it over the
/// target. Permissions are 0600 since the file holds bearer tokens.
/// Sibling temp file for `path`, unique per target file and process.
fn temp_path(path: &Path) -> PathBuf {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "storage".to_owned());
    dir.join(format!(".{name}.tmp.{}", std::process::id()))
}

async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing storage: {e}")))?;

    let tmp_path = temp_path(path);

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp storage file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting storage file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp storage file: {e}")))?;

    debug!(path = %path.display(), "persisted storage");
    Ok(())
}
