//! Markhoist migrates images referenced inside text documents to remote
//! object storage.
//!
//! The library is the engineering core of an editor-side migration tool,
//! stripped of any IDE wiring: a byte-accurate image mark parser, an ordered
//! processing pipeline that pushes each discovered image through
//! compress/upload/relabel/write-back stages, and a task runner that keeps the
//! whole run off the caller's thread. Storage backends implement the
//! [`StorageClient`] capability trait and live in the `markhoist-storage`
//! crate.

pub mod buffer;
pub mod error;
pub mod mark;
pub mod pipeline;
pub mod resolve;
pub mod runner;
pub mod storage;

// Re-export core types
pub use buffer::{MemoryBuffer, Replacement, TextBuffer, WriteGate, apply_replacements};
pub use error::{ConfigError, FailureReason, HoistError, ItemFailure, Result, UploadError};
pub use mark::{ImageLocation, ImageReference, MarkKind, parse_line};
pub use pipeline::context::{
    CancelFlag, MarkGroup, MarkWrap, PipelineContext, PipelineOptions, RunSummary,
};
pub use pipeline::{
    Handler, RunOutcome, RunReport, Signal, migrate_workflow, run, upload_workflow,
};
pub use resolve::{ImageBytes, ImageResolver, ImageStore, MemoryResolver, MemoryStore};
pub use runner::{ResultSink, RunHandle, TaskRunner};
pub use storage::StorageClient;

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
