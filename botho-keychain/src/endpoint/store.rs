//! Key-value persistence for endpoint preferences.
//!
//! Values are strings; structured values (such as the user endpoint list) are
//! stored as JSON text, matching what the extension keeps in its local
//! storage area.

use crate::error::{KeychainError, KeychainResult};
use std::{
    collections::HashMap,
    fs,
    future::Future,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Asynchronous string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = KeychainResult<Option<String>>> + Send;

    fn set(&self, key: &str, value: String) -> impl Future<Output = KeychainResult<()>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = KeychainResult<()>> + Send;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }

    /// Copy of every stored entry.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.lock().unwrap().clone()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> KeychainResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> KeychainResult<()> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> KeychainResult<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object file.
///
/// The whole file is rewritten on every change through a sibling temporary
/// file that is renamed over it, with owner-only permissions on unix. File
/// access runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

#[derive(Debug)]
struct FileStoreInner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(FileStoreInner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn blocking<T, F>(&self, f: F) -> KeychainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileStoreInner) -> KeychainResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = inner
                .lock
                .lock()
                .map_err(|_| KeychainError::Storage("store lock poisoned".to_string()))?;
            f(&inner)
        })
        .await
        .map_err(|e| KeychainError::Storage(format!("storage task failed: {}", e)))?
    }

    async fn update<F>(&self, f: F) -> KeychainResult<()>
    where
        F: FnOnce(&mut HashMap<String, String>) + Send + 'static,
    {
        self.blocking(move |inner| {
            let mut values = inner.read_all()?;
            f(&mut values);
            inner.write_all(&values)
        })
        .await
    }
}

impl FileStoreInner {
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn read_all(&self) -> KeychainResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let json = fs::read_to_string(&self.path).map_err(|e| {
            KeychainError::Storage(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            KeychainError::Storage(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, values: &HashMap<String, String>) -> KeychainResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(values)?;
        let temp = self.temp_path();

        {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&temp)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o600))?;
            }
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            KeychainError::Storage(format!("failed to replace {}: {}", self.path.display(), e))
        })
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> KeychainResult<Option<String>> {
        let key = key.to_string();
        self.blocking(move |inner| Ok(inner.read_all()?.remove(&key)))
            .await
    }

    async fn set(&self, key: &str, value: String) -> KeychainResult<()> {
        let key = key.to_string();
        self.update(move |values| {
            values.insert(key, value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> KeychainResult<()> {
        let key = key.to_string();
        self.update(move |values| {
            values.remove(&key);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("rpc").await.unwrap(), None);

        store.set("rpc", "[]".to_string()).await.unwrap();
        assert_eq!(store.get("rpc").await.unwrap().as_deref(), Some("[]"));

        store.remove("rpc").await.unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("storage.json");

        let store = FileStore::new(&path);
        store
            .set("current_rpc", "https://a".to_string())
            .await
            .unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get("current_rpc").await.unwrap().as_deref(),
            Some("https://a")
        );

        reopened.remove("current_rpc").await.unwrap();
        assert_eq!(store.get("current_rpc").await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.json");
        FileStore::new(&path)
            .set("rpc", "[]".to_string())
            .await
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_file_store_replaces_file_without_leftovers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.json");
        let store = FileStore::new(&path);

        store.set("rpc", "[]".to_string()).await.unwrap();
        store
            .set("current_rpc", "https://a".to_string())
            .await
            .unwrap();
        store.set("rpc", "[\"https://b\"]".to_string()).await.unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("storage.json")]);

        let stored: HashMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["rpc"], "[\"https://b\"]");
        assert_eq!(stored["current_rpc"], "https://a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_store_concurrent_writers() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("storage.json"));

        let writes = (0..8).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.set(&format!("key{}", i), i.to_string()).await })
        });
        for handle in futures::future::join_all(writes).await {
            handle.unwrap().unwrap();
        }

        for i in 0..8 {
            assert_eq!(
                store.get(&format!("key{}", i)).await.unwrap(),
                Some(i.to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get("rpc").await,
            Err(KeychainError::Storage(_))
        ));
    }
}
