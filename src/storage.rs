use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage read/write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Namespaced JSON key/value files under a data directory. Each key maps to
/// `<dir>/<key>.json` holding one JSON document.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub async fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Loads the value stored under `key`, or the default when the key has
    /// never been written. A present-but-unreadable document is an error.
    pub async fn load<T>(&self, key: &str) -> Result<T, StorageError>
    where
        T: DeserializeOwned + Default,
    {
        match fs::read(self.key_path(key)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn persist<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let payload = serde_json::to_vec_pretty(value)?;
        fs::write(self.key_path(key), payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_missing_key_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let value: Vec<String> = storage.load("nothing_here").await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dir().await.unwrap();

        let value = vec!["one".to_string(), "two".to_string()];
        storage.persist("things", &value).await.unwrap();

        let back: Vec<String> = storage.load("things").await.unwrap();
        assert_eq!(back, value);
    }

    #[tokio::test]
    async fn corrupt_document_is_an_error_not_a_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dir().await.unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{not json").unwrap();

        let result: Result<Vec<String>, _> = storage.load("broken").await;
        assert!(matches!(result, Err(StorageError::Encoding(_))));
    }
}
