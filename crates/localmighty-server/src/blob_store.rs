use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .or_else(|_| target.strip_prefix(&canonical_base))
        .unwrap_or(target)
        .components()
    {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// Replace every character outside `[a-zA-Z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A blob written by [`BlobStore::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub id: Uuid,
    /// `<id>_<sanitized original name>`, the on-disk name and URL segment.
    pub stored_name: String,
    pub size: usize,
}

/// Flat directory of uploaded hub files.
#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl BlobStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::FileStorage(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Upload directory ready");

        Ok(Self { base_path, max_size })
    }

    pub async fn store(&self, original_name: &str, data: &[u8]) -> Result<StoredBlob, ServerError> {
        if data.len() > self.max_size {
            return Err(ServerError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let stored_name = format!("{}_{}", id, sanitize_file_name(original_name));
        let path = self.safe_path(&stored_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::FileStorage(format!("Failed to write {}: {}", stored_name, e))
        })?;

        debug!(stored_name = %stored_name, size = data.len(), "Stored upload");
        Ok(StoredBlob {
            id,
            stored_name,
            size: data.len(),
        })
    }

    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_path(stored_name)?;

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServerError::NotFound(format!("File {stored_name}")))
            }
            Err(e) => Err(ServerError::FileStorage(format!(
                "Failed to read {}: {}",
                stored_name, e
            ))),
        }
    }

    /// Remove a blob. Returns `false` if it was already gone.
    pub async fn delete(&self, stored_name: &str) -> Result<bool, ServerError> {
        let path = self.safe_path(stored_name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(stored_name = %stored_name, "Deleted upload");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServerError::FileStorage(format!(
                "Failed to delete {}: {}",
                stored_name, e
            ))),
        }
    }

    #[cfg(test)]
    pub async fn exists(&self, stored_name: &str) -> bool {
        match self.safe_path(stored_name) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Stored names are single path segments.
    fn safe_path(&self, stored_name: &str) -> Result<PathBuf, ServerError> {
        if stored_name.is_empty()
            || stored_name.contains('/')
            || stored_name.contains('\\')
            || stored_name == "."
            || stored_name == ".."
        {
            return Err(ServerError::BadRequest("Path traversal detected".to_string()));
        }
        ensure_within(&self.base_path, &self.base_path.join(stored_name))
    }
}
