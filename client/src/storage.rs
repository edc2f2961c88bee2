//! Key/value storage for credentials, the local-storage of this client.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use thiserror::Error;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const LOGIN_TIME_KEY: &str = "loginTime";

/// Every key written on login and wiped on logout or 401.
pub const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, USER_KEY, LOGIN_TIME_KEY];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session file: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn clear_session(&self) -> Result<(), StorageError> {
        for key in SESSION_KEYS {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Process-local storage. Lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.read().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// Storage persisted as a flat JSON object, used by the CLI between runs.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.read().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| StorageError::Poisoned)?;
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);

        storage.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), Some("abc".to_string()));

        storage.remove(TOKEN_KEY).unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_clear_session_removes_all_keys() {
        let storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "abc").unwrap();
        storage.set(USER_KEY, "{}").unwrap();
        storage.set(LOGIN_TIME_KEY, "2024-01-01T00:00:00Z").unwrap();
        storage.set("theme", "dark").unwrap();

        storage.clear_session().unwrap();

        for key in SESSION_KEYS {
            assert_eq!(storage.get(key).unwrap(), None);
        }
        assert_eq!(storage.get("theme").unwrap(), Some("dark".to_string()));
    }

    #[test]
    fn test_file_storage_persists_between_opens() {
        let path = std::env::temp_dir()
            .join(format!("daybook-{}", uuid::Uuid::new_v4()))
            .join("session.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set(TOKEN_KEY, "persisted").unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).unwrap(), Some("persisted".to_string()));

        reopened.clear_session().unwrap();
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).unwrap(), None);

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
