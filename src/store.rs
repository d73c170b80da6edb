use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::warn;

use crate::error::Result;

/// A single persisted JSON document, read and rewritten wholesale.
///
/// Missing or unparsable files decode to the default value with a warning
/// instead of failing, so a corrupt store never takes the engine down.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load_or_default<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return T::default();
            }
        };

        if content.trim().is_empty() {
            return T::default();
        }

        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("Corrupt store {} ({}), starting empty", self.path.display(), e);
                T::default()
            }
        }
    }

    pub async fn save<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(value)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("missing.json"));
        let map: HashMap<String, String> = store.load_or_default().await;
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("data.json"));

        let mut map = HashMap::new();
        map.insert("a".to_string(), "1".to_string());
        store.save(&map).await.unwrap();

        let loaded: HashMap<String, String> = store.load_or_default().await;
        assert_eq!(loaded, map);
    }

    #[tokio::test]
    async fn test_corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = JsonStore::new(&path);
        let map: HashMap<String, String> = store.load_or_default().await;
        assert!(map.is_empty());
    }
}
