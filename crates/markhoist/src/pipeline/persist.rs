//! Persist stage: copy downloaded images into the project
//!
//! Aborts before any mutation if no image store is attached. References whose
//! download already failed have no bytes in the file map and are skipped;
//! their failure is on record.

use async_trait::async_trait;
use tracing::debug;

use super::{Handler, PipelineContext, Signal};
use crate::error::{ConfigError, FailureReason};

pub struct PersistHandler;

#[async_trait]
impl Handler for PersistHandler {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn handle(&self, ctx: &mut PipelineContext) -> Signal {
        let Some(store) = ctx.store.clone() else {
            return Signal::Abort(ConfigError::NoStore.into());
        };

        for group_index in 0..ctx.groups.len() {
            for ref_index in 0..ctx.groups[group_index].refs.len() {
                let (name, network) = {
                    let r = &ctx.groups[group_index].refs[ref_index];
                    (r.resolved_image_name.clone(), !r.is_local())
                };
                if !network {
                    continue;
                }

                let persisted = match ctx.files.get(&name) {
                    Some(file) => Some(store.persist(&name, &file.bytes).await),
                    None => None,
                };
                match persisted {
                    None => {}
                    Some(Ok(relative_path)) => {
                        debug!(image = %name, path = %relative_path, "persisted");
                        ctx.groups[group_index].refs[ref_index].uploaded_url =
                            Some(relative_path);
                    }
                    Some(Err(err)) => {
                        ctx.record_failure(name, FailureReason::Persist(err.to_string()))
                    }
                }
            }
        }
        Signal::Continue
    }
}
