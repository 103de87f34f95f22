//! Generic configurable multipart backend
//!
//! Covers one-endpoint image hosts (SM.MS-style APIs, self-hosted uploaders)
//! without a dedicated client: endpoint, verb, multipart field name, and the
//! JSON pointer to the returned URL all come from configuration.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};

use markhoist::{ConfigError, StorageClient, UploadError};

use super::{content_type_for, http_client};
use crate::config::{HttpFormSettings, HttpVerb, NetworkSettings, SettingsStore};

pub struct HttpFormClient {
    http: reqwest::Client,
    endpoint: String,
    verb: HttpVerb,
    file_field: String,
    url_pointer: String,
    token: Option<String>,
}

impl HttpFormClient {
    pub fn new(
        settings: &HttpFormSettings,
        network: &NetworkSettings,
        store: &dyn SettingsStore,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let token = if settings.token_attributes_id.is_empty() {
            None
        } else {
            Some(
                store
                    .secret(&settings.token_attributes_id)
                    .ok_or_else(|| ConfigError::MissingSecret {
                        attributes_id: settings.token_attributes_id.clone(),
                    })?,
            )
        };
        Ok(Self {
            http: http_client(network)?,
            endpoint: settings.endpoint.clone(),
            verb: settings.verb,
            file_field: settings.file_field.clone(),
            url_pointer: settings.url_pointer.clone(),
            token,
        })
    }
}

#[async_trait]
impl StorageClient for HttpFormClient {
    fn name(&self) -> &'static str {
        "http-form"
    }

    async fn upload(&self, data: &[u8], logical_name: &str) -> Result<String, UploadError> {
        let part = Part::bytes(data.to_vec())
            .file_name(logical_name.to_string())
            .mime_str(content_type_for(logical_name))
            .map_err(|err| UploadError::Network(err.to_string()))?;
        let form = Form::new().part(self.file_field.clone(), part);

        let request = match self.verb {
            HttpVerb::Post => self.http.post(&self.endpoint),
            HttpVerb::Put => self.http.put(&self.endpoint),
        };
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UploadError::Auth(body));
        }
        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }
        extract_url(&body, &self.url_pointer)
    }
}

/// Pull the result URL out of the response body at the configured pointer.
pub(crate) fn extract_url(body: &str, pointer: &str) -> Result<String, UploadError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| UploadError::ResponseShape(format!("response is not JSON: {err}")))?;
    match value.pointer(pointer).and_then(|v| v.as_str()) {
        Some(url) => Ok(url.to_string()),
        None => Err(UploadError::ResponseShape(format!(
            "no string at `{pointer}` in response"
        ))),
    }
}
