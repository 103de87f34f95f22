//! GitHub content-API backend
//!
//! Uploads through `PUT /repos/{repo}/contents/{path}` with a base64 body and
//! returns the raw.githubusercontent.com URL for the committed file. Writing
//! to a branch configured as `master` is rejected at construction; read URLs
//! for a `master` configuration are remapped to `main`.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};

use markhoist::{ConfigError, StorageClient, UploadError};

use super::http_client;
use crate::config::{GithubSettings, NetworkSettings, SettingsStore};
use crate::url::{github_raw_url, join_key};

const API_ROOT: &str = "https://api.github.com";
const AGENT: &str = concat!("markhoist/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
pub struct GithubClient {
    http: reqwest::Client,
    repo: String,
    branch: String,
    token: String,
    path_prefix: String,
}

impl GithubClient {
    pub fn new(
        settings: &GithubSettings,
        network: &NetworkSettings,
        store: &dyn SettingsStore,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let token = store.secret(&settings.token_attributes_id).ok_or_else(|| {
            ConfigError::MissingSecret {
                attributes_id: settings.token_attributes_id.clone(),
            }
        })?;
        Ok(Self {
            http: http_client(network)?,
            repo: settings.repo.clone(),
            branch: settings.branch.clone(),
            token,
            path_prefix: settings.path_prefix.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for GithubClient {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn upload(&self, data: &[u8], logical_name: &str) -> Result<String, UploadError> {
        let key = join_key(&self.path_prefix, logical_name);
        let api_url = format!("{API_ROOT}/repos/{}/contents/{key}", self.repo);
        let body = serde_json::json!({
            "message": format!("upload {logical_name}"),
            "branch": self.branch,
            "content": BASE64.encode(data),
        });

        let response = self
            .http
            .put(&api_url)
            .bearer_auth(&self.token)
            .header(USER_AGENT, AGENT)
            .header(ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(github_raw_url(&self.repo, &self.branch, &key));
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UploadError::Auth(body));
        }
        Err(UploadError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemorySettings, StorageSettings};

    #[test]
    fn master_branch_cannot_be_constructed_for_write() {
        let store =
            MemorySettings::new(StorageSettings::default()).with_secret("gh-token", "t0ken");
        let err = GithubClient::new(
            &GithubSettings {
                repo: "alice/assets".into(),
                branch: "master".into(),
                token_attributes_id: "gh-token".into(),
                ..GithubSettings::default()
            },
            &NetworkSettings::default(),
            &store,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::ProtectedBranch);
    }

    #[test]
    fn construction_resolves_the_token_once() {
        let store =
            MemorySettings::new(StorageSettings::default()).with_secret("gh-token", "t0ken");
        let client = GithubClient::new(
            &GithubSettings {
                repo: "alice/assets".into(),
                branch: "main".into(),
                token_attributes_id: "gh-token".into(),
                ..GithubSettings::default()
            },
            &NetworkSettings::default(),
            &store,
        )
        .unwrap();
        assert_eq!(client.token, "t0ken");
        assert_eq!(client.name(), "github");
    }
}
