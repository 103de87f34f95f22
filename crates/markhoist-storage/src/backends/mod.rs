//! Storage client implementations
//!
//! Every backend implements the one [`markhoist::StorageClient`] capability;
//! shared construction helpers live here.

use std::time::Duration;

use markhoist::ConfigError;

use crate::config::NetworkSettings;

pub mod command;
pub mod gitee;
pub mod github;
pub mod http_form;
pub mod s3;

pub use command::CommandClient;
pub use gitee::GiteeClient;
pub use github::GithubClient;
pub use http_form::HttpFormClient;
pub use s3::S3Client;

/// HTTP client with the configured per-call timeouts applied
pub(crate) fn http_client(network: &NetworkSettings) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
        .timeout(Duration::from_secs(network.read_timeout_secs))
        .build()
        .map_err(|err| ConfigError::InvalidValue {
            backend: "network".into(),
            field: "timeouts".into(),
            reason: err.to_string(),
        })
}

/// Content type inferred from the logical name's extension
pub(crate) fn content_type_for(logical_name: &str) -> &'static str {
    match logical_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
        .as_str()
    {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}
