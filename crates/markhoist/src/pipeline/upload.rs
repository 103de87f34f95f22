//! Upload stage: push each resolved local image through the storage client
//!
//! Aborts before any mutation if no client is attached. Everything after that
//! is per item: a missing binary records a not-found failure, a backend error
//! records an upload failure with the raw backend message preserved, and the
//! remaining items keep going either way.

use async_trait::async_trait;
use tracing::debug;

use super::{Handler, PipelineContext, Signal};
use crate::error::{ConfigError, FailureReason};

pub struct UploadHandler;

#[async_trait]
impl Handler for UploadHandler {
    fn name(&self) -> &'static str {
        "upload"
    }

    async fn handle(&self, ctx: &mut PipelineContext) -> Signal {
        let Some(client) = ctx.client.clone() else {
            return Signal::Abort(ConfigError::NoClient.into());
        };

        for group_index in 0..ctx.groups.len() {
            for ref_index in 0..ctx.groups[group_index].refs.len() {
                let (name, local) = {
                    let r = &ctx.groups[group_index].refs[ref_index];
                    (r.resolved_image_name.clone(), r.is_local())
                };
                if !local {
                    continue;
                }

                let uploaded = match ctx.files.get(&name) {
                    Some(file) => Some(client.upload(&file.bytes, &name).await),
                    None => None,
                };
                match uploaded {
                    None => ctx.record_not_found(name),
                    Some(Ok(url)) => {
                        debug!(backend = client.name(), image = %name, %url, "uploaded");
                        ctx.groups[group_index].refs[ref_index].uploaded_url = Some(url);
                    }
                    Some(Err(err)) => {
                        ctx.record_failure(name, FailureReason::Upload(err.to_string()))
                    }
                }
            }
        }
        Signal::Continue
    }
}
