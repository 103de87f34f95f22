//! Gitee content-API backend
//!
//! Same capability as the GitHub backend against Gitee's v5 API: file
//! creation is a POST carrying the access token in the body, and the public
//! URL uses the `https://gitee.com/{repo}/raw/{branch}/{key}` form.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;

use markhoist::{ConfigError, StorageClient, UploadError};

use super::http_client;
use crate::config::{GiteeSettings, NetworkSettings, SettingsStore};
use crate::url::{gitee_raw_url, join_key};

const API_ROOT: &str = "https://gitee.com/api/v5";

pub struct GiteeClient {
    http: reqwest::Client,
    repo: String,
    branch: String,
    token: String,
    path_prefix: String,
}

impl GiteeClient {
    pub fn new(
        settings: &GiteeSettings,
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
impl StorageClient for GiteeClient {
    fn name(&self) -> &'static str {
        "gitee"
    }

    async fn upload(&self, data: &[u8], logical_name: &str) -> Result<String, UploadError> {
        let key = join_key(&self.path_prefix, logical_name);
        let api_url = format!("{API_ROOT}/repos/{}/contents/{key}", self.repo);
        let body = serde_json::json!({
            "access_token": self.token,
            "message": format!("upload {logical_name}"),
            "branch": self.branch,
            "content": BASE64.encode(data),
        });

        let response = self.http.post(&api_url).json(&body).send().await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(gitee_raw_url(&self.repo, &self.branch, &key));
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
    fn gitee_keeps_master_as_a_writable_branch() {
        // The protected-branch guard is a GitHub quirk; Gitee repos still
        // default to master.
        let store = MemorySettings::new(StorageSettings::default()).with_secret("ge", "tok");
        let client = GiteeClient::new(
            &GiteeSettings {
                repo: "bob/assets".into(),
                branch: "master".into(),
                token_attributes_id: "ge".into(),
                ..GiteeSettings::default()
            },
            &NetworkSettings::default(),
            &store,
        )
        .unwrap();
        assert_eq!(client.branch, "master");
    }
}
