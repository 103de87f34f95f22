//! Error types for the markhoist library
//!
//! Failures are partitioned by how they affect a run: configuration and
//! precondition errors abort before any document mutation, per-item failures
//! are recorded on the run and never abort it, and a line that simply carries
//! no image mark is not an error at all (the parser returns `None`).

use thiserror::Error;

/// Root error type for markhoist operations
#[derive(Error, Debug)]
pub enum HoistError {
    /// Configuration or precondition errors; raised before any write-back
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend upload errors escalated out of a run
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Task scheduling and runtime errors
    #[error("Task error: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and precondition errors
///
/// Any of these aborts a pipeline run before the first mutation, so the
/// document is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Backend {backend}: required field `{field}` is missing or blank")]
    MissingField { backend: String, field: String },

    #[error("Backend {backend}: invalid `{field}`: {reason}")]
    InvalidValue {
        backend: String,
        field: String,
        reason: String,
    },

    #[error("Branch `master` cannot be written to; the default branch is `main`")]
    ProtectedBranch,

    #[error("No secret stored under `{attributes_id}`")]
    MissingSecret { attributes_id: String },

    #[error("No storage client selected for this run")]
    NoClient,

    #[error("No image store attached for this run")]
    NoStore,

    #[error("Storage registry unavailable: {0}")]
    Registry(String),
}

/// Per-call upload failures
///
/// Recorded per item with the backend's raw message preserved for display;
/// the run continues with the remaining items.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response shape mismatch: {0}")]
    ResponseShape(String),

    #[error("Uploader process failed: {0}")]
    Process(String),

    #[error("No URL appeared on the clipboard after {attempts} attempts")]
    ClipboardExhausted { attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for UploadError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => UploadError::Status {
                status: status.as_u16(),
                body: error.to_string(),
            },
            None => UploadError::Network(error.to_string()),
        }
    }
}

/// Why a single item failed while the run went on
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("image not found in project")]
    NotFound,

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("persist failed: {0}")]
    Persist(String),

    #[error("buffer changed since parse (expected `{expected}`, found `{found}`)")]
    WriteBackConflict { expected: String, found: String },
}

/// A recorded per-item failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Logical image name the failure belongs to
    pub image: String,
    pub reason: FailureReason,
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.image, self.reason)
    }
}

/// Shorthand result type for markhoist operations
pub type Result<T> = std::result::Result<T, HoistError>;
