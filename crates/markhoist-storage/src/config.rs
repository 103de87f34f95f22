//! Typed backend configuration
//!
//! Each backend consumes a statically typed settings struct; the embedding
//! host populates them (from its settings UI, environment, or files) and
//! exposes the snapshot through [`SettingsStore`]. Credentials are looked up
//! through the store by an opaque attributes id, so secret values never enter
//! the configuration hash or log output; only the id does.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use markhoist::ConfigError;

use crate::hash::config_hash;

/// Configuration snapshot + secret lookup the registry reads from
pub trait SettingsStore: Send + Sync {
    /// Current configuration snapshot
    fn snapshot(&self) -> StorageSettings;

    /// Opaque credential lookup
    fn secret(&self, attributes_id: &str) -> Option<String>;
}

/// All backend settings, plus shared network limits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub network: NetworkSettings,
    pub s3: S3Settings,
    pub github: GithubSettings,
    pub gitee: GiteeSettings,
    pub http_form: HttpFormSettings,
    pub command: CommandSettings,
}

/// Per-call network limits; a timeout expiring is a per-item failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        }
    }
}

/// Bucket-style object store settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    /// Attributes id the upload token is stored under
    pub secret_attributes_id: String,
    pub custom_endpoint_enabled: bool,
    pub custom_endpoint: String,
    pub path_prefix: String,
}

impl S3Settings {
    /// Load settings from environment variables
    ///
    /// Expects S3_BUCKET, S3_ENDPOINT, S3_ACCESS_KEY_ID and
    /// S3_SECRET_ATTRIBUTES_ID; S3_CUSTOM_ENDPOINT and S3_PATH_PREFIX are
    /// optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let custom_endpoint = std::env::var("S3_CUSTOM_ENDPOINT").unwrap_or_default();
        Ok(Self {
            bucket: require_env("s3", "S3_BUCKET")?,
            endpoint: require_env("s3", "S3_ENDPOINT")?,
            access_key_id: require_env("s3", "S3_ACCESS_KEY_ID")?,
            secret_attributes_id: require_env("s3", "S3_SECRET_ATTRIBUTES_ID")?,
            custom_endpoint_enabled: !custom_endpoint.is_empty(),
            custom_endpoint,
            path_prefix: std::env::var("S3_PATH_PREFIX").unwrap_or_default(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require("s3", "bucket", &self.bucket)?;
        require("s3", "endpoint", &self.endpoint)?;
        require("s3", "access_key_id", &self.access_key_id)?;
        require("s3", "secret_attributes_id", &self.secret_attributes_id)?;
        if self.custom_endpoint_enabled {
            require("s3", "custom_endpoint", &self.custom_endpoint)?;
        }
        Ok(())
    }

    pub fn config_hash(&self) -> String {
        config_hash([
            self.bucket.as_str(),
            self.endpoint.as_str(),
            self.access_key_id.as_str(),
            self.secret_attributes_id.as_str(),
            if self.custom_endpoint_enabled { "1" } else { "0" },
            self.custom_endpoint.as_str(),
            self.path_prefix.as_str(),
        ])
    }
}

/// GitHub content-API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubSettings {
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    /// Attributes id the access token is stored under
    pub token_attributes_id: String,
    pub path_prefix: String,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            repo: String::new(),
            branch: "main".to_string(),
            token_attributes_id: String::new(),
            path_prefix: String::new(),
        }
    }
}

impl GithubSettings {
    /// Load settings from environment variables
    ///
    /// Expects GITHUB_REPO and GITHUB_TOKEN_ATTRIBUTES_ID; GITHUB_BRANCH
    /// defaults to `main`, GITHUB_PATH_PREFIX to empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            repo: require_env("github", "GITHUB_REPO")?,
            branch: std::env::var("GITHUB_BRANCH").unwrap_or_else(|_| "main".to_string()),
            token_attributes_id: require_env("github", "GITHUB_TOKEN_ATTRIBUTES_ID")?,
            path_prefix: std::env::var("GITHUB_PATH_PREFIX").unwrap_or_default(),
        })
    }

    /// Validate for write use; a `master` branch is rejected to steer users
    /// toward the renamed default branch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("github", "repo", &self.repo)?;
        if !self.repo.contains('/') {
            return Err(ConfigError::InvalidValue {
                backend: "github".into(),
                field: "repo".into(),
                reason: "expected owner/name".into(),
            });
        }
        require("github", "branch", &self.branch)?;
        if self.branch == "master" {
            return Err(ConfigError::ProtectedBranch);
        }
        require("github", "token_attributes_id", &self.token_attributes_id)
    }

    pub fn config_hash(&self) -> String {
        config_hash([
            self.repo.as_str(),
            self.branch.as_str(),
            self.token_attributes_id.as_str(),
            self.path_prefix.as_str(),
        ])
    }
}

/// Gitee content-API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiteeSettings {
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    /// Attributes id the access token is stored under
    pub token_attributes_id: String,
    pub path_prefix: String,
}

impl Default for GiteeSettings {
    fn default() -> Self {
        Self {
            repo: String::new(),
            branch: "master".to_string(),
            token_attributes_id: String::new(),
            path_prefix: String::new(),
        }
    }
}

impl GiteeSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("gitee", "repo", &self.repo)?;
        if !self.repo.contains('/') {
            return Err(ConfigError::InvalidValue {
                backend: "gitee".into(),
                field: "repo".into(),
                reason: "expected owner/name".into(),
            });
        }
        require("gitee", "branch", &self.branch)?;
        require("gitee", "token_attributes_id", &self.token_attributes_id)
    }

    pub fn config_hash(&self) -> String {
        config_hash([
            self.repo.as_str(),
            self.branch.as_str(),
            self.token_attributes_id.as_str(),
            self.path_prefix.as_str(),
        ])
    }
}

/// HTTP verb the generic form backend sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HttpVerb {
    #[default]
    Post,
    Put,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
        }
    }
}

/// Generic multipart backend, driven entirely by configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpFormSettings {
    pub endpoint: String,
    pub verb: HttpVerb,
    /// Multipart field name the file is attached under
    pub file_field: String,
    /// JSON pointer to the returned URL in the response body
    pub url_pointer: String,
    /// Attributes id of a bearer token; blank means unauthenticated
    pub token_attributes_id: String,
}

impl Default for HttpFormSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            verb: HttpVerb::Post,
            file_field: "file".to_string(),
            url_pointer: "/url".to_string(),
            token_attributes_id: String::new(),
        }
    }
}

impl HttpFormSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("http_form", "endpoint", &self.endpoint)?;
        require("http_form", "file_field", &self.file_field)?;
        require("http_form", "url_pointer", &self.url_pointer)?;
        if !self.url_pointer.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                backend: "http_form".into(),
                field: "url_pointer".into(),
                reason: "JSON pointer must start with `/`".into(),
            });
        }
        Ok(())
    }

    pub fn config_hash(&self) -> String {
        config_hash([
            self.endpoint.as_str(),
            self.verb.as_str(),
            self.file_field.as_str(),
            self.url_pointer.as_str(),
            self.token_attributes_id.as_str(),
        ])
    }
}

/// External-uploader backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSettings {
    pub program: String,
    /// Arguments, with `{file}` replaced by the staged temp-file path
    pub args: Vec<String>,
    /// Clipboard polling budget
    pub retries: u32,
    pub poll_delay_ms: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: vec!["{file}".to_string()],
            retries: 10,
            poll_delay_ms: 500,
        }
    }
}

impl CommandSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("command", "program", &self.program)?;
        if self.retries == 0 {
            return Err(ConfigError::InvalidValue {
                backend: "command".into(),
                field: "retries".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn config_hash(&self) -> String {
        let retries = self.retries.to_string();
        let delay = self.poll_delay_ms.to_string();
        let mut fields = vec![self.program.as_str()];
        fields.extend(self.args.iter().map(String::as_str));
        fields.push(retries.as_str());
        fields.push(delay.as_str());
        config_hash(fields)
    }
}

fn require(backend: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            backend: backend.to_string(),
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_env(backend: &str, var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingField {
        backend: backend.to_string(),
        field: var.to_string(),
    })
}

/// In-memory settings store for testing and simple embeddings
#[derive(Debug, Default)]
pub struct MemorySettings {
    settings: Mutex<StorageSettings>,
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new(settings: StorageSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            secrets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_secret(self, attributes_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(attributes_id.into(), value.into());
        self
    }

    /// Mutate the live settings; cached clients go stale on the next lookup
    pub fn update(&self, mutate: impl FnOnce(&mut StorageSettings)) {
        let mut settings = self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        mutate(&mut settings);
    }
}

impl SettingsStore for MemorySettings {
    fn snapshot(&self) -> StorageSettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn secret(&self, attributes_id: &str) -> Option<String> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(attributes_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_s3() -> S3Settings {
        S3Settings {
            bucket: "pics".into(),
            endpoint: "oss.example.com".into(),
            access_key_id: "AKID".into(),
            secret_attributes_id: "s3-secret".into(),
            ..S3Settings::default()
        }
    }

    #[test]
    fn s3_blank_bucket_is_a_missing_field() {
        let settings = S3Settings {
            bucket: "  ".into(),
            ..valid_s3()
        };
        assert_eq!(
            settings.validate(),
            Err(ConfigError::MissingField {
                backend: "s3".into(),
                field: "bucket".into(),
            })
        );
    }

    #[test]
    fn s3_custom_endpoint_required_when_enabled() {
        let settings = S3Settings {
            custom_endpoint_enabled: true,
            custom_endpoint: String::new(),
            ..valid_s3()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn s3_hash_covers_the_custom_endpoint_flag() {
        let base = valid_s3();
        let flagged = S3Settings {
            custom_endpoint_enabled: true,
            custom_endpoint: "img.example.com".into(),
            ..valid_s3()
        };
        assert_ne!(base.config_hash(), flagged.config_hash());
    }

    #[test]
    fn github_master_branch_is_rejected_for_write() {
        let settings = GithubSettings {
            repo: "alice/assets".into(),
            branch: "master".into(),
            token_attributes_id: "gh".into(),
            ..GithubSettings::default()
        };
        assert_eq!(settings.validate(), Err(ConfigError::ProtectedBranch));
    }

    #[test]
    fn github_repo_must_be_owner_slash_name() {
        let settings = GithubSettings {
            repo: "assets".into(),
            token_attributes_id: "gh".into(),
            ..GithubSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn http_form_pointer_must_be_a_json_pointer() {
        let settings = HttpFormSettings {
            endpoint: "https://sm.ms/api/v2/upload".into(),
            url_pointer: "data.url".into(),
            ..HttpFormSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn command_needs_a_nonzero_retry_budget() {
        let settings = CommandSettings {
            program: "picgo-upload".into(),
            retries: 0,
            ..CommandSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn memory_settings_snapshot_and_update() {
        let store = MemorySettings::new(StorageSettings {
            s3: valid_s3(),
            ..StorageSettings::default()
        })
        .with_secret("s3-secret", "hunter2");

        assert_eq!(store.snapshot().s3.bucket, "pics");
        assert_eq!(store.secret("s3-secret").as_deref(), Some("hunter2"));
        assert_eq!(store.secret("other"), None);

        store.update(|s| s.s3.bucket = "photos".into());
        assert_eq!(store.snapshot().s3.bucket, "photos");
    }

    #[test]
    fn s3_from_env_reports_the_missing_variable() {
        // Mirrors the environment the registry would see on a fresh machine.
        unsafe {
            std::env::remove_var("S3_BUCKET");
            std::env::remove_var("S3_ENDPOINT");
            std::env::remove_var("S3_ACCESS_KEY_ID");
            std::env::remove_var("S3_SECRET_ATTRIBUTES_ID");
        }
        match S3Settings::from_env() {
            Err(ConfigError::MissingField { field, .. }) => assert_eq!(field, "S3_BUCKET"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }
}
