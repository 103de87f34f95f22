//! Background task runner
//!
//! The host issues pipeline runs from its own thread; the runner hands each
//! run to a tokio task immediately so the issuing thread never blocks on
//! network I/O. Completion is surfaced through a collaborator-supplied sink.
//! Every spawn gets an independent context; the runner's write gate is the
//! piece shared across runs so concurrent write-backs to one buffer identity
//! stay serialized.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::buffer::WriteGate;
use crate::error::HoistError;
use crate::pipeline::context::{CancelFlag, PipelineContext};
use crate::pipeline::{self, Handler, RunReport};

/// Receives the run summary at completion, for display to the user
pub trait ResultSink: Send + Sync {
    fn on_complete(&self, report: &RunReport);
}

/// Schedules pipeline runs off the caller's thread
#[derive(Default)]
pub struct TaskRunner {
    write_gate: Arc<WriteGate>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh per-run context wired to this runner's write gate
    pub fn context(&self, action: impl Into<String>) -> PipelineContext {
        PipelineContext::new(action).with_write_gate(self.write_gate.clone())
    }

    /// Start a run in the background and return a handle to it
    pub fn spawn(
        &self,
        mut ctx: PipelineContext,
        handlers: Vec<Box<dyn Handler>>,
        sink: Arc<dyn ResultSink>,
    ) -> RunHandle {
        let cancel = ctx.cancel.clone();
        info!(action = %ctx.action, stages = handlers.len(), "scheduling pipeline run");
        let join = tokio::spawn(async move {
            let report = pipeline::run(&mut ctx, &handlers).await;
            sink.on_complete(&report);
            report
        });
        RunHandle { cancel, join }
    }
}

/// Handle to one in-flight pipeline run
pub struct RunHandle {
    cancel: CancelFlag,
    join: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Request cancellation; the engine checks the flag at the top of each
    /// stage and performs no write-back for items not yet committed
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish and return its report
    pub async fn wait(self) -> crate::Result<RunReport> {
        self.join
            .await
            .map_err(|err| HoistError::Task(format!("pipeline task failed: {err}")))
    }
}
