//! Storage client capability contract
//!
//! Every cloud backend is normalized behind this single upload capability, so
//! the pipeline's upload stage never branches on backend type. Concrete
//! backends and the keyed registry that caches them live in the
//! `markhoist-storage` crate.

use async_trait::async_trait;

use crate::error::UploadError;

/// Abstraction over heterogeneous cloud upload APIs
///
/// A client owns nothing beyond its immutable configuration (keys, bucket,
/// repo, base URL), so one instance is safe to share across calls and runs as
/// long as the configuration is unchanged.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;

    /// Upload `data` under `logical_name` and return the public URL the mark
    /// should be rewritten to
    async fn upload(&self, data: &[u8], logical_name: &str) -> Result<String, UploadError>;
}

impl std::fmt::Debug for dyn StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("name", &self.name())
            .finish()
    }
}
