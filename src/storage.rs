// Durable key/value storage for credentials (the browser's local storage,
// expressed as a trait so the session can live in memory or on disk)

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::error::ApiError;

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";

pub trait CredentialStorage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;

    // Applies every change or none of them. `None` removes the key.
    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<(), ApiError>;

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.write_batch(&[(key, Some(value))])
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        self.write_batch(&[(key, None)])
    }
}

fn apply_changes(map: &mut HashMap<String, String>, changes: &[(&str, Option<&str>)]) {
    for (key, value) in changes {
        match value {
            Some(v) => {
                map.insert(key.to_string(), v.to_string());
            }
            None => {
                map.remove(*key);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let map = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CredentialStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<(), ApiError> {
        apply_changes(&mut self.entries.write(), changes);
        Ok(())
    }
}

/// Single JSON object on disk. Writes go to a sibling temp file which is then
/// renamed over the original, so a crash never leaves half a session behind.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, ApiError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "credential file unreadable, starting empty");
                Ok(HashMap::new())
            }
        }
    }

    fn persist(&self, map: &HashMap<String, String>) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(map)
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.get(key).cloned())
    }

    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<(), ApiError> {
        let _guard = self.lock.lock();
        let mut map = self.load()?;
        apply_changes(&mut map, changes);
        self.persist(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_storage_batch_sets_and_removes() {
        let storage = MemoryStorage::new();
        storage
            .write_batch(&[(TOKEN_KEY, Some("t-1")), (USER_KEY, Some("{}"))])
            .unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("t-1"));
        assert_eq!(storage.len(), 2);

        storage.write_batch(&[(TOKEN_KEY, None), (USER_KEY, None)]).unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session").join("credentials.json");

        let storage = FileStorage::new(&path);
        storage.set(TOKEN_KEY, "abc").unwrap();
        drop(storage);

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        reopened.remove(TOKEN_KEY).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn file_storage_missing_or_corrupt_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let storage = FileStorage::new(&path);
        assert_eq!(storage.get(USER_KEY).unwrap(), None);

        fs::write(&path, "{not json").unwrap();
        assert_eq!(storage.get(USER_KEY).unwrap(), None);
        storage.set(USER_KEY, "u").unwrap();
        assert_eq!(storage.get(USER_KEY).unwrap().as_deref(), Some("u"));
    }
}
