//! Download stage: fetch network-referenced images for migration
//!
//! Each fetched payload is staged through a temp file owned by the run, so
//! every exit path (finalize, abort, cancel, drop) releases it. Fetch errors
//! and timeouts are per-item failures, never a run abort.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{Handler, PipelineContext, Signal};
use crate::error::{FailureReason, HoistError, UploadError};
use crate::resolve::ImageBytes;

pub struct DownloadHandler;

#[async_trait]
impl Handler for DownloadHandler {
    fn name(&self) -> &'static str {
        "download"
    }

    async fn handle(&self, ctx: &mut PipelineContext) -> Signal {
        let timeout = Duration::from_secs(ctx.options.download_timeout_secs);
        let http = match reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                return Signal::Abort(HoistError::Task(format!("http client: {err}")));
            }
        };

        for group_index in 0..ctx.groups.len() {
            for ref_index in 0..ctx.groups[group_index].refs.len() {
                let (name, path, network) = {
                    let r = &ctx.groups[group_index].refs[ref_index];
                    (r.resolved_image_name.clone(), r.path.clone(), !r.is_local())
                };
                if !network || name.is_empty() || ctx.files.contains_key(&name) {
                    continue;
                }

                match fetch(&http, &path).await {
                    Ok(bytes) => match stage(&bytes) {
                        Ok(file) => {
                            debug!(image = %name, url = %path, size = bytes.len(), "downloaded");
                            ctx.stage_temp(file);
                            ctx.files
                                .insert(name.clone(), ImageBytes::new(name, bytes));
                        }
                        Err(err) => {
                            ctx.record_failure(name, FailureReason::Download(err.to_string()))
                        }
                    },
                    Err(err) => {
                        ctx.record_failure(name, FailureReason::Download(err.to_string()))
                    }
                }
            }
        }
        Signal::Continue
    }
}

async fn fetch(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, UploadError> {
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(UploadError::Status {
            status: response.status().as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.bytes().await?.to_vec())
}

fn stage(bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    Ok(file)
}
