//! Keyed storage-client registry
//!
//! One cache entry per backend id, recording the configuration hash the
//! client was built from. A lookup whose live hash no longer matches rebuilds
//! the client from the current snapshot and replaces the entry atomically
//! under the cache lock; invalidation is lazy, nothing watches the settings.
//! Clients are immutable once built, so handing out shared `Arc`s across
//! concurrent runs is safe.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use markhoist::{ConfigError, StorageClient};

use crate::backends::{CommandClient, GiteeClient, GithubClient, HttpFormClient, S3Client};
use crate::config::{SettingsStore, StorageSettings};

/// Identifies one storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
    S3,
    Github,
    Gitee,
    HttpForm,
    Command,
}

impl BackendId {
    pub const ALL: [BackendId; 5] = [
        BackendId::S3,
        BackendId::Github,
        BackendId::Gitee,
        BackendId::HttpForm,
        BackendId::Command,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::S3 => "s3",
            BackendId::Github => "github",
            BackendId::Gitee => "gitee",
            BackendId::HttpForm => "http-form",
            BackendId::Command => "command",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct CachedClient {
    config_hash: String,
    client: Arc<dyn StorageClient>,
}

/// Factory and cache over the storage-client capability
pub struct ClientRegistry {
    store: Arc<dyn SettingsStore>,
    cache: Mutex<HashMap<BackendId, CachedClient>>,
}

impl ClientRegistry {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Cached client for `id`, rebuilt when its configuration changed
    ///
    /// Construction reads credentials and settings exactly once per
    /// (re)build, not per upload call.
    pub fn get(&self, id: BackendId) -> Result<Arc<dyn StorageClient>, ConfigError> {
        let settings = self.store.snapshot();
        let live_hash = Self::hash_for(id, &settings);

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| ConfigError::Registry("client cache lock poisoned".to_string()))?;
        if let Some(entry) = cache.get(&id) {
            if entry.config_hash == live_hash {
                return Ok(entry.client.clone());
            }
            debug!(backend = %id, "configuration changed, discarding cached client");
        }

        let client = Self::build(id, &settings, self.store.as_ref())?;
        debug!(backend = %id, "built storage client");
        cache.insert(
            id,
            CachedClient {
                config_hash: live_hash,
                client: client.clone(),
            },
        );
        Ok(client)
    }

    fn hash_for(id: BackendId, settings: &StorageSettings) -> String {
        match id {
            BackendId::S3 => settings.s3.config_hash(),
            BackendId::Github => settings.github.config_hash(),
            BackendId::Gitee => settings.gitee.config_hash(),
            BackendId::HttpForm => settings.http_form.config_hash(),
            BackendId::Command => settings.command.config_hash(),
        }
    }

    fn build(
        id: BackendId,
        settings: &StorageSettings,
        store: &dyn SettingsStore,
    ) -> Result<Arc<dyn StorageClient>, ConfigError> {
        Ok(match id {
            BackendId::S3 => Arc::new(S3Client::new(&settings.s3, &settings.network, store)?),
            BackendId::Github => {
                Arc::new(GithubClient::new(&settings.github, &settings.network, store)?)
            }
            BackendId::Gitee => {
                Arc::new(GiteeClient::new(&settings.gitee, &settings.network, store)?)
            }
            BackendId::HttpForm => Arc::new(HttpFormClient::new(
                &settings.http_form,
                &settings.network,
                store,
            )?),
            BackendId::Command => Arc::new(CommandClient::new(&settings.command)?),
        })
    }
}
