use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::storage::Storage;

/// Stores each document as a pretty-printed `.json` file under `root`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn build_path(&self, keys: &[&str]) -> CoreResult<PathBuf> {
        let Some((last, parents)) = keys.split_last() else {
            return Err(CoreError::InvalidInput("storage keys empty".to_string()));
        };
        let mut path = self.root.clone();
        for key in parents {
            validate_key(key)?;
            path.push(key);
        }
        validate_key(last)?;
        path.push(format!("{last}.json"));
        Ok(path)
    }

    fn build_dir(&self, keys: &[&str]) -> CoreResult<PathBuf> {
        let mut path = self.root.clone();
        for key in keys {
            validate_key(key)?;
            path.push(key);
        }
        Ok(path)
    }

    /// Entries of a collection directory as `(name, is_dir)`, sorted by name.
    async fn read_collection(&self, keys: &[&str]) -> CoreResult<Vec<(String, bool)>> {
        let dir = self.build_dir(keys)?;
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(CoreError::Internal(format!(
                    "failed to list storage directory {}: {error}",
                    dir.display()
                )))
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(|error| {
            CoreError::Internal(format!(
                "failed to read entry in {}: {error}",
                dir.display()
            ))
        })? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            entries.push((name, is_dir));
        }
        entries.sort();
        Ok(entries)
    }

    async fn ensure_parent_dir(path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                CoreError::Internal(format!(
                    "failed to create storage directory {}: {error}",
                    parent.display()
                ))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn write(&self, keys: &[&str], data: &Value) -> CoreResult<()> {
        let path = self.build_path(keys)?;
        Self::ensure_parent_dir(&path).await?;
        let serialized = serde_json::to_vec_pretty(data)
            .map_err(|error| CoreError::Internal(format!("storage serialize error: {error}")))?;
        tokio::fs::write(&path, serialized).await.map_err(|error| {
            CoreError::Internal(format!(
                "failed to write storage file {}: {error}",
                path.display()
            ))
        })?;
        Ok(())
    }

    async fn read(&self, keys: &[&str]) -> CoreResult<Option<Value>> {
        let path = self.build_path(keys)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(CoreError::Internal(format!(
                    "failed to read storage file {}: {error}",
                    path.display()
                )))
            }
        };
        let value = serde_json::from_slice(&bytes).map_err(|error| {
            CoreError::Internal(format!("storage parse error in {}: {error}", path.display()))
        })?;
        Ok(Some(value))
    }

    async fn delete(&self, keys: &[&str]) -> CoreResult<bool> {
        let path = self.build_path(keys)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(CoreError::Internal(format!(
                "failed to delete storage file {}: {error}",
                path.display()
            ))),
        }
    }

    async fn exists(&self, keys: &[&str]) -> CoreResult<bool> {
        let path = self.build_path(keys)?;
        tokio::fs::try_exists(&path).await.map_err(|error| {
            CoreError::Internal(format!(
                "failed to stat storage file {}: {error}",
                path.display()
            ))
        })
    }

    async fn list_documents(&self, keys: &[&str]) -> CoreResult<Vec<String>> {
        Ok(self
            .read_collection(keys)
            .await?
            .into_iter()
            .filter(|(_, is_dir)| !is_dir)
            .filter_map(|(name, _)| name.strip_suffix(".json").map(str::to_string))
            .filter(|id| !id.is_empty())
            .collect())
    }

    async fn list_collections(&self, keys: &[&str]) -> CoreResult<Vec<String>> {
        Ok(self
            .read_collection(keys)
            .await?
            .into_iter()
            .filter(|(_, is_dir)| *is_dir)
            .map(|(name, _)| name)
            .collect())
    }
}

fn validate_key(key: &str) -> CoreResult<()> {
    if key.is_empty() || key == "." || key == ".." {
        return Err(CoreError::InvalidInput(format!("invalid storage key {key:?}")));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(CoreError::InvalidInput(format!("invalid storage key {key:?}")));
    }
    Ok(())
}
