//! Finalize stage: aggregate the summary and release per-run resources

use async_trait::async_trait;
use tracing::info;

use super::{Handler, PipelineContext, Signal};

pub struct FinalizeHandler;

#[async_trait]
impl Handler for FinalizeHandler {
    fn name(&self) -> &'static str {
        "finalize"
    }

    async fn handle(&self, ctx: &mut PipelineContext) -> Signal {
        ctx.clear_temp();
        let summary = ctx.summary();
        info!(
            action = %ctx.action,
            processed = summary.processed,
            failed = summary.failed,
            not_found = summary.not_found_names.len(),
            "pipeline finished"
        );
        Signal::Stop
    }
}
