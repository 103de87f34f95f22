//! Storage backends and the keyed client registry for markhoist
//!
//! Heterogeneous cloud upload APIs (bucket-style object stores, Git content
//! APIs, configurable multipart hosts, external-uploader processes) are
//! normalized behind the [`markhoist::StorageClient`] capability. The
//! [`ClientRegistry`] caches one instance per backend and rebuilds it lazily
//! whenever the configuration fingerprint changes.

pub mod backends;
pub mod clipboard;
pub mod config;
pub mod hash;
pub mod registry;
pub mod url;

// Re-export core types
pub use backends::{CommandClient, GiteeClient, GithubClient, HttpFormClient, S3Client};
pub use clipboard::{Clipboard, OsClipboard};
pub use config::{
    CommandSettings, GiteeSettings, GithubSettings, HttpFormSettings, HttpVerb, MemorySettings,
    NetworkSettings, S3Settings, SettingsStore, StorageSettings,
};
pub use hash::config_hash;
pub use registry::{BackendId, ClientRegistry};
