//! Collaborator ports for binary image resolution and project persistence
//!
//! The host resolves logical image names to byte sources (documents reference
//! images that may live anywhere in the project tree, so lookup is by
//! basename, not by treating the written path as a filesystem path) and, for
//! the migration workflow, writes downloaded bytes back into the project.
//! In-memory implementations ship for testing and simple embeddings.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A readable image byte source and its display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes {
    pub display_name: String,
    pub bytes: Vec<u8>,
}

impl ImageBytes {
    pub fn new(display_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            display_name: display_name.into(),
            bytes,
        }
    }
}

/// Resolves a logical image name to at most one byte source
///
/// Zero results is a per-item failure recorded in the run summary, never an
/// abort.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, logical_name: &str) -> Option<ImageBytes>;
}

/// Writes image bytes into the project during the migration workflow
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist `bytes` under `name`; returns the project-relative path the
    /// mark should be rewritten to
    async fn persist(&self, name: &str, bytes: &[u8]) -> std::io::Result<String>;
}

/// In-memory resolver implementation for testing
#[derive(Debug, Default)]
pub struct MemoryResolver {
    entries: Mutex<HashMap<String, ImageBytes>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        let entry = ImageBytes::new(name.clone(), bytes);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(name, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ImageResolver for MemoryResolver {
    async fn resolve(&self, logical_name: &str) -> Option<ImageBytes> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(logical_name).cloned())
    }
}

/// In-memory store implementation for testing
#[derive(Debug)]
pub struct MemoryStore {
    directory: String,
    saved: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// `directory` becomes the prefix of every returned project-relative path
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            saved: Mutex::new(HashMap::new()),
        }
    }

    pub fn saved_names(&self) -> Vec<String> {
        self.saved
            .lock()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn persist(&self, name: &str, bytes: &[u8]) -> std::io::Result<String> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| std::io::Error::other("store lock poisoned"))?;
        saved.insert(name.to_string(), bytes.to_vec());
        Ok(format!("{}/{}", self.directory.trim_end_matches('/'), name))
    }
}
