use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::ClientError;

pub const COPY_FEEDBACK_DURATION: Duration = Duration::from_secs(2);
pub const COPY_FAILED_ALERT: &str = "Failed to copy code. Please select and copy manually.";

pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), ClientError>;
}

/// System clipboard through arboard. The handle is opened per copy so a missing display server
/// only fails the copy, not startup.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClientError> {
        let mut clipboard = arboard::Clipboard::new().map_err(|err| {
            warn!(error = %err, "clipboard unavailable");
            ClientError::Clipboard(err.to_string())
        })?;
        clipboard.set_text(text.to_string()).map_err(|err| {
            warn!(error = %err, "clipboard write failed");
            ClientError::Clipboard(err.to_string())
        })
    }
}

/// Per-code-block "Copied!" labels that fall back to "Copy" after a fixed delay.
#[derive(Debug, Default)]
pub struct CopyFeedback {
    copied_at: HashMap<usize, Instant>,
}

impl CopyFeedback {
    pub fn mark_copied(&mut self, index: usize, now: Instant) {
        self.copied_at.insert(index, now);
    }

    pub fn is_copied(&self, index: usize, now: Instant) -> bool {
        self.copied_at
            .get(&index)
            .is_some_and(|at| now.saturating_duration_since(*at) < COPY_FEEDBACK_DURATION)
    }

    pub fn label(&self, index: usize, now: Instant) -> &'static str {
        if self.is_copied(index, now) {
            "Copied!"
        } else {
            "Copy"
        }
    }

    /// Drops expired entries; returns true when any label changed back.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.copied_at.len();
        self.copied_at
            .retain(|_, at| now.saturating_duration_since(*at) < COPY_FEEDBACK_DURATION);
        before != self.copied_at.len()
    }

    pub fn clear(&mut self) {
        self.copied_at.clear();
    }
}
