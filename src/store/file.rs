use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Blob, BlobStore, StoreError};

/// Store that keeps each table in a local file under `base_dir`.
///
/// The version of a blob is the SHA-256 digest of its content, so a file
/// edited by hand or by another process is detected as a conflict.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new store rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn blob_path(&self, path: &str) -> PathBuf {
        self.base_dir.join(path)
    }
}

fn content_version(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

impl BlobStore for FileStore {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        let file = self.blob_path(path);
        if !file.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&file)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", file.display())))?;
        let version = content_version(&content);
        Ok(Some(Blob { content, version }))
    }

    fn put(
        &mut self,
        path: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        let current = self.get(path)?.map(|b| b.version);
        if current.as_deref() != expected_version {
            debug!(path, ?current, ?expected_version, "Version mismatch");
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        let file = self.blob_path(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(&file, content)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", file.display())))?;
        Ok(content_version(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_sha256_hex() {
        let version = content_version("");
        assert_eq!(
            version,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
