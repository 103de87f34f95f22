//! Clipboard access port for the external-uploader backend
//!
//! The command backend recovers its result URL from the system clipboard, so
//! clipboard access is a one-method port: tests script it, and the shipped
//! implementation shells out to the platform paste utility.

use std::process::Command;

pub trait Clipboard: Send + Sync {
    /// Current clipboard text, if any
    fn read_text(&self) -> Option<String>;
}

/// Reads the clipboard through the platform paste utility
#[derive(Debug, Default)]
pub struct OsClipboard;

#[cfg(target_os = "macos")]
const PASTE_COMMANDS: &[(&str, &[&str])] = &[("pbpaste", &[])];

#[cfg(target_os = "windows")]
const PASTE_COMMANDS: &[(&str, &[&str])] =
    &[("powershell", &["-NoProfile", "-Command", "Get-Clipboard"])];

#[cfg(all(unix, not(target_os = "macos")))]
const PASTE_COMMANDS: &[(&str, &[&str])] = &[
    ("wl-paste", &["--no-newline"]),
    ("xclip", &["-selection", "clipboard", "-o"]),
    ("xsel", &["--clipboard", "--output"]),
];

impl Clipboard for OsClipboard {
    fn read_text(&self) -> Option<String> {
        for (program, args) in PASTE_COMMANDS {
            let Ok(output) = Command::new(program).args(*args).output() else {
                continue;
            };
            if !output.status.success() {
                continue;
            }
            if let Ok(text) = String::from_utf8(output.stdout) {
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }
}
