//! Storage backends for the trip and fuel tables.
//!
//! A backend only stores opaque text blobs under a path. [`TableStore`]
//! turns the tables into CSV text on top of any [`BlobStore`].

use std::collections::HashMap;

pub mod file;
pub mod github;
pub mod retry;
pub mod table;

pub use file::FileStore;
pub use github::GitHubStore;
pub use retry::RetryingStore;
pub use table::{Loaded, TableRow, TableStore};

/// Errors that can occur when talking to a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or answered with a failure.
    Unavailable(String),
    /// The blob changed since it was loaded.
    Conflict { path: String },
    /// The stored content could not be parsed.
    Malformed(String),
}

impl StoreError {
    /// Returns `true` if the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Conflict { path } => {
                write!(f, "{path} was changed by someone else, reload and retry")
            }
            StoreError::Malformed(msg) => write!(f, "malformed data: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Stored content together with the backend's version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content: String,
    pub version: String,
}

/// Load-all/replace-all access to text blobs.
pub trait BlobStore {
    /// Reads the blob at `path`, or `None` if it does not exist.
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError>;

    /// Replaces the blob at `path` and returns its new version.
    ///
    /// `expected_version` must match the current version of the blob, or be
    /// `None` when the blob does not exist yet. Otherwise the write is
    /// rejected with [`StoreError::Conflict`].
    fn put(
        &mut self,
        path: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError>;
}

impl<S: BlobStore + ?Sized> BlobStore for Box<S> {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        (**self).get(path)
    }

    fn put(
        &mut self,
        path: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        (**self).put(path, content, expected_version)
    }
}

/// In-process store, mostly useful for tests.
#[derive(Default)]
pub struct MemoryStore {
    blobs: HashMap<String, Blob>,
    next_version: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        Ok(self.blobs.get(path).cloned())
    }

    fn put(
        &mut self,
        path: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        let current = self.blobs.get(path).map(|b| b.version.as_str());
        if current != expected_version {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        self.next_version += 1;
        let version = self.next_version.to_string();
        self.blobs.insert(
            path.to_string(),
            Blob {
                content: content.to_string(),
                version: version.clone(),
            },
        );
        Ok(version)
    }
}
