//! Durable client-side key/value storage
//!
//! The session store writes its state here and the HTTP wrappers read the
//! bearer token back out on every request, so two processes sharing one
//! [`FileStorage`] directory observe each other's logins and logouts.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;

/// Key/value storage that survives the in-memory stores
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Read the raw value stored under `key`
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Process-local storage, mostly useful for tests and short-lived tools
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the storage root. The directory is created on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// The storage root
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        // write-then-rename so a concurrent reader never sees a torn file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read the bearer token out of the persisted session envelope
/// (`{"state":{"token":...}}`).
///
/// Missing, unreadable or corrupt state all mean "no token".
pub async fn read_token(storage: &dyn SessionStorage, key: &str) -> Option<String> {
    let raw = match storage.get_item(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Failed to read persisted session '{}': {}", key, e);
            return None;
        }
    };

    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed
        .get("state")?
        .get("token")?
        .as_str()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").await.unwrap(), None);
        storage.set_item("k", "v").await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), Some("v".to_string()));
        storage.remove_item("k").await.unwrap();
        storage.remove_item("k").await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        FileStorage::new(dir.path())
            .set_item("auth-storage", r#"{"state":{"token":"abc"}}"#)
            .await
            .unwrap();

        let reopened = FileStorage::new(dir.path());
        assert_eq!(
            read_token(&reopened, "auth-storage").await,
            Some("abc".to_string())
        );
        reopened.remove_item("auth-storage").await.unwrap();
        assert_eq!(read_token(&reopened, "auth-storage").await, None);
    }

    #[tokio::test]
    async fn test_read_token_tolerates_garbage() {
        let storage = MemoryStorage::new();
        storage.set_item("auth-storage", "{not json").await.unwrap();
        assert_eq!(read_token(&storage, "auth-storage").await, None);

        storage
            .set_item("auth-storage", r#"{"state":{"token":null}}"#)
            .await
            .unwrap();
        assert_eq!(read_token(&storage, "auth-storage").await, None);

        storage
            .set_item("auth-storage", r#"{"token":"top-level"}"#)
            .await
            .unwrap();
        assert_eq!(read_token(&storage, "auth-storage").await, None);
    }
}
