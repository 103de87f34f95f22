//! External-uploader backend
//!
//! Invokes a configured program (a PicGo-style CLI uploader) on a staged temp
//! file, then recovers the result URL from the system clipboard with bounded
//! retry. The clipboard is a race-prone channel, so this backend is
//! best-effort by contract: exhausting the retry budget fails the item
//! instead of waiting longer.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use markhoist::{ConfigError, StorageClient, UploadError};

use crate::clipboard::{Clipboard, OsClipboard};
use crate::config::CommandSettings;

pub struct CommandClient {
    program: String,
    args: Vec<String>,
    retries: u32,
    poll_delay: Duration,
    clipboard: Arc<dyn Clipboard>,
}

impl CommandClient {
    pub fn new(settings: &CommandSettings) -> Result<Self, ConfigError> {
        Self::with_clipboard(settings, Arc::new(OsClipboard))
    }

    /// Construct with an explicit clipboard implementation
    pub fn with_clipboard(
        settings: &CommandSettings,
        clipboard: Arc<dyn Clipboard>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
            retries: settings.retries,
            poll_delay: Duration::from_millis(settings.poll_delay_ms),
            clipboard,
        })
    }

    async fn poll_clipboard(&self) -> Option<String> {
        for attempt in 1..=self.retries {
            let clipboard = self.clipboard.clone();
            let text = tokio::task::spawn_blocking(move || clipboard.read_text())
                .await
                .ok()
                .flatten();
            if let Some(text) = text {
                let text = text.trim();
                if text.starts_with("http://") || text.starts_with("https://") {
                    debug!(attempt, "url recovered from clipboard");
                    return Some(text.to_string());
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(self.poll_delay).await;
            }
        }
        None
    }
}

#[async_trait]
impl StorageClient for CommandClient {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn upload(&self, data: &[u8], logical_name: &str) -> Result<String, UploadError> {
        let mut staged = NamedTempFile::new()?;
        staged.write_all(data)?;
        let staged_path = staged.path().display().to_string();

        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{file}", &staged_path))
            .collect();
        debug!(program = %self.program, image = %logical_name, "invoking external uploader");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|err| UploadError::Process(format!("{}: {err}", self.program)))?;
        if !output.status.success() {
            return Err(UploadError::Process(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        self.poll_clipboard()
            .await
            .ok_or(UploadError::ClipboardExhausted {
                attempts: self.retries,
            })
    }
}
