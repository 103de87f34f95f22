//! Bucket-style object-store backend
//!
//! Works against S3-compatible endpoints (AWS, MinIO, Aliyun OSS, Tencent
//! COS) fronted by a signature-terminating gateway: the upload is a plain
//! authenticated PUT of the object body, and the public URL follows the
//! `https://{bucket}.{endpoint}/{key}` form unless a custom endpoint override
//! is configured.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

use markhoist::{ConfigError, StorageClient, UploadError};

use super::{content_type_for, http_client};
use crate::config::{NetworkSettings, S3Settings, SettingsStore};
use crate::url::{bucket_object_url, join_key};

#[derive(Debug)]
pub struct S3Client {
    http: reqwest::Client,
    bucket: String,
    endpoint: String,
    custom_endpoint: Option<String>,
    access_key_id: String,
    secret: String,
    path_prefix: String,
}

impl S3Client {
    /// Build a client from validated settings, resolving the secret once
    pub fn new(
        settings: &S3Settings,
        network: &NetworkSettings,
        store: &dyn SettingsStore,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let secret = store.secret(&settings.secret_attributes_id).ok_or_else(|| {
            ConfigError::MissingSecret {
                attributes_id: settings.secret_attributes_id.clone(),
            }
        })?;
        Ok(Self {
            http: http_client(network)?,
            bucket: settings.bucket.clone(),
            endpoint: settings.endpoint.clone(),
            custom_endpoint: settings
                .custom_endpoint_enabled
                .then(|| settings.custom_endpoint.clone()),
            access_key_id: settings.access_key_id.clone(),
            secret,
            path_prefix: settings.path_prefix.clone(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        bucket_object_url(
            &self.bucket,
            &self.endpoint,
            self.custom_endpoint.as_deref(),
            key,
        )
    }
}

#[async_trait]
impl StorageClient for S3Client {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn upload(&self, data: &[u8], logical_name: &str) -> Result<String, UploadError> {
        let key = join_key(&self.path_prefix, logical_name);
        let url = self.object_url(&key);

        let response = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, content_type_for(logical_name))
            .header("x-amz-meta-uploader", self.access_key_id.as_str())
            .bearer_auth(&self.secret)
            .body(data.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(url);
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
