//! Ordered processing pipeline
//!
//! Each submodule implements exactly one stage. A stage is a stateless
//! strategy object operating on the shared [`PipelineContext`]; it returns a
//! [`Signal`] telling the engine whether to continue, stop early, or abort the
//! whole run. Stages may also record per-item failures without aborting; the
//! pipeline's job is to finish every item that can still progress.
//!
//! ## Workflows
//!
//! ```text
//! upload:  compress ──▶ upload ──▶ relabel ──▶ write-back ──▶ finalize
//! migrate: download ──▶ persist ──▶ relabel ──▶ write-back ──▶ finalize
//! ```
//!
//! Abort-capable preconditions fire before any mutation stage, so an aborted
//! run leaves every document untouched. Cancellation is checked at the top of
//! each stage.

pub mod compress;
pub mod context;
pub mod download;
pub mod finalize;
pub mod persist;
pub mod relabel;
pub mod upload;
pub mod write_back;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::HoistError;
pub use context::{PipelineContext, RunSummary};

/// Verdict a stage returns to the engine
pub enum Signal {
    /// Advance to the next stage
    Continue,
    /// End the pipeline successfully; no later stage is needed
    Stop,
    /// End the pipeline and mark the whole run failed
    Abort(HoistError),
}

/// One pipeline stage
///
/// Stateless by contract: a handler only operates on the context passed to it
/// and holds no reference to other handlers, so ordering and short-circuit
/// behavior stay test-visible.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &mut PipelineContext) -> Signal;
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted(String),
    Cancelled,
}

/// Final report of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub summary: RunSummary,
}

/// Execute `handlers` strictly in order against `ctx`.
pub async fn run(ctx: &mut PipelineContext, handlers: &[Box<dyn Handler>]) -> RunReport {
    for handler in handlers {
        if ctx.cancel.is_cancelled() {
            info!(action = %ctx.action, stage = handler.name(), "run cancelled");
            ctx.clear_temp();
            return RunReport {
                outcome: RunOutcome::Cancelled,
                summary: ctx.summary(),
            };
        }
        debug!(action = %ctx.action, stage = handler.name(), "entering stage");
        match handler.handle(ctx).await {
            Signal::Continue => {}
            Signal::Stop => break,
            Signal::Abort(err) => {
                error!(action = %ctx.action, stage = handler.name(), error = %err, "run aborted");
                ctx.clear_temp();
                return RunReport {
                    outcome: RunOutcome::Aborted(err.to_string()),
                    summary: ctx.summary(),
                };
            }
        }
    }
    RunReport {
        outcome: RunOutcome::Completed,
        summary: ctx.summary(),
    }
}

/// The canonical upload workflow stage ordering
pub fn upload_workflow() -> Vec<Box<dyn Handler>> {
    vec![
        Box::new(compress::CompressHandler),
        Box::new(upload::UploadHandler),
        Box::new(relabel::RelabelHandler),
        Box::new(write_back::WriteBackHandler),
        Box::new(finalize::FinalizeHandler),
    ]
}

/// The canonical download/migration workflow stage ordering
pub fn migrate_workflow() -> Vec<Box<dyn Handler>> {
    vec![
        Box::new(download::DownloadHandler),
        Box::new(persist::PersistHandler),
        Box::new(relabel::RelabelHandler),
        Box::new(write_back::WriteBackHandler),
        Box::new(finalize::FinalizeHandler),
    ]
}
