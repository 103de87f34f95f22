//! Per-run pipeline state
//!
//! A [`PipelineContext`] is owned exclusively by one pipeline execution.
//! Concurrent runs each get their own instance; the only state shared across
//! runs is the write gate (and, outside this crate, the storage-client
//! registry cache).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::buffer::{TextBuffer, WriteGate};
use crate::error::{FailureReason, ItemFailure};
use crate::mark::{ImageLocation, ImageReference};
use crate::resolve::{ImageBytes, ImageResolver, ImageStore};
use crate::storage::StorageClient;

/// Anchor wrap applied to rewritten marks by the relabel stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkWrap {
    /// Keep the bare bracket form
    #[default]
    None,
    /// Wrap in the lightbox anchor form
    Large,
    /// Wrap in the open-in-new-tab anchor form
    Common,
}

/// Per-run behavior switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Re-encode local raster images before upload
    pub compress: bool,
    /// JPEG quality used when compressing (1-100)
    pub compress_quality: u8,
    pub wrap: MarkWrap,
    /// Per-call timeout for the download stage, seconds
    pub download_timeout_secs: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            compress: true,
            compress_quality: 75,
            wrap: MarkWrap::None,
            download_timeout_secs: 30,
        }
    }
}

/// Cooperative cancellation flag checked between stages
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// References grouped by the text buffer that owns them
pub struct MarkGroup {
    pub buffer: Arc<Mutex<dyn TextBuffer>>,
    pub refs: Vec<ImageReference>,
}

/// Aggregated result of one run, handed to the result sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub not_found_names: Vec<String>,
}

/// The shared bag of state one pipeline execution operates on
pub struct PipelineContext {
    /// Free-form action tag for diagnostics
    pub action: String,
    /// Local binary files keyed by logical name
    pub files: HashMap<String, ImageBytes>,
    pub groups: Vec<MarkGroup>,
    pub client: Option<Arc<dyn StorageClient>>,
    pub store: Option<Arc<dyn ImageStore>>,
    pub options: PipelineOptions,
    pub cancel: CancelFlag,
    pub write_gate: Arc<WriteGate>,
    pub(crate) processed: usize,
    pub(crate) failures: Vec<ItemFailure>,
    pub(crate) temp: Vec<NamedTempFile>,
}

impl PipelineContext {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            files: HashMap::new(),
            groups: Vec::new(),
            client: None,
            store: None,
            options: PipelineOptions::default(),
            cancel: CancelFlag::new(),
            write_gate: Arc::new(WriteGate::new()),
            processed: 0,
            failures: Vec::new(),
            temp: Vec::new(),
        }
    }

    pub fn with_client(mut self, client: Arc<dyn StorageClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_write_gate(mut self, gate: Arc<WriteGate>) -> Self {
        self.write_gate = gate;
        self
    }

    pub fn add_group(&mut self, buffer: Arc<Mutex<dyn TextBuffer>>, refs: Vec<ImageReference>) {
        self.groups.push(MarkGroup { buffer, refs });
    }

    pub fn add_file(&mut self, logical_name: impl Into<String>, file: ImageBytes) {
        self.files.insert(logical_name.into(), file);
    }

    /// Fill the file map by resolving every local reference's basename
    ///
    /// Names that resolve to nothing stay absent; the upload stage records
    /// them as not found when it looks them up.
    pub async fn resolve_local(&mut self, resolver: &dyn ImageResolver) {
        for group in &self.groups {
            for r in &group.refs {
                if r.location != ImageLocation::Local
                    || r.resolved_image_name.is_empty()
                    || self.files.contains_key(&r.resolved_image_name)
                {
                    continue;
                }
                if let Some(found) = resolver.resolve(&r.resolved_image_name).await {
                    self.files.insert(r.resolved_image_name.clone(), found);
                }
            }
        }
    }

    pub fn record_failure(&mut self, image: impl Into<String>, reason: FailureReason) {
        let failure = ItemFailure {
            image: image.into(),
            reason,
        };
        warn!(action = %self.action, %failure, "item failed");
        self.failures.push(failure);
    }

    pub fn record_not_found(&mut self, image: impl Into<String>) {
        self.record_failure(image, FailureReason::NotFound);
    }

    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    pub(crate) fn add_processed(&mut self, count: usize) {
        self.processed += count;
    }

    /// Track a temp file owned by this run; dropped (and deleted) in finalize
    /// or, on any other exit path, when the context itself is dropped
    pub(crate) fn stage_temp(&mut self, file: NamedTempFile) {
        self.temp.push(file);
    }

    pub(crate) fn clear_temp(&mut self) {
        self.temp.clear();
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            processed: self.processed,
            failed: self.failures.len(),
            not_found_names: self
                .failures
                .iter()
                .filter(|f| f.reason == FailureReason::NotFound)
                .map(|f| f.image.clone())
                .collect(),
        }
    }
}
