use std::collections::VecDeque;

use chrono::{Local, NaiveTime};
use ratatui::text::Line;

use crate::markdown::to_lines;
use crate::protocol::ProgressUpdate;

pub const ACTIVITY_LOG_CAPACITY: usize = 10;
pub const TRANSCRIPT_CAPACITY: usize = 100;

const ACTIVE_STAGES: [&str; 4] = [
    "searching",
    "analyzing_query",
    "processing_sources",
    "compiling",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    InProgress,
    Completed,
    Failed,
}

impl RequestPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// `None` unless both counters are present and non-zero.
pub fn progress_percent(step: Option<u32>, total: Option<u32>) -> Option<f64> {
    match (step, total) {
        (Some(step), Some(total)) if step > 0 && total > 0 => {
            Some(f64::from(step) / f64::from(total) * 100.0)
        }
        _ => None,
    }
}

pub fn stage_icon(status: &str) -> &'static str {
    match status {
        "generating_queries" => "🤖",
        "queries_generated" | "searches_complete" | "analysis_complete"
        | "all_analysis_complete" => "✅",
        "searching" => "🔍",
        "search_complete" => "📄",
        "analyzing" => "🧠",
        "analyzing_query" => "🔬",
        "processing_sources" => "📊",
        "synthesizing" => "🔗",
        "compiling" => "📝",
        "finalizing" => "✨",
        "completed" => "🎉",
        _ => "•",
    }
}

pub fn is_active_stage(status: &str) -> bool {
    ACTIVE_STAGES.contains(&status)
}

/// What the progress section shows for the most recent progress event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub status: String,
    pub step: Option<u32>,
    pub total: Option<u32>,
    pub percent: Option<f64>,
    pub message: String,
}

impl ProgressView {
    pub fn starting() -> Self {
        Self {
            status: String::new(),
            step: None,
            total: None,
            percent: Some(0.0),
            message: "Starting research...".to_string(),
        }
    }

    pub fn from_update(update: &ProgressUpdate) -> Self {
        Self {
            status: update.status.clone(),
            step: update.step,
            total: update.total,
            percent: progress_percent(update.step, update.total),
            message: update.message.clone(),
        }
    }

    pub fn has_counters(&self) -> bool {
        self.percent.is_some() && self.step.is_some()
    }

    pub fn headline(&self) -> String {
        match (self.step, self.total, self.has_counters()) {
            (Some(step), Some(total), true) => format!("Step {step}/{total}: {}", self.message),
            _ if self.message.trim().is_empty() => "Processing...".to_string(),
            _ => self.message.clone(),
        }
    }

    pub fn percent_label(&self) -> Option<String> {
        self.percent.map(|percent| format!("{}%", percent.round() as i64))
    }

    /// Width of the bar fill; the percentage itself is never clamped.
    pub fn fill_ratio(&self) -> f64 {
        self.percent.map(|p| (p / 100.0).clamp(0.0, 1.0)).unwrap_or(0.0)
    }

    pub fn is_active(&self) -> bool {
        is_active_stage(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub at: NaiveTime,
    pub status: String,
    pub message: String,
}

impl ActivityEntry {
    pub fn now(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            at: Local::now().time(),
            status: status.into(),
            message: message.into(),
        }
    }

    pub fn time_label(&self) -> String {
        self.at.format("%H:%M:%S").to_string()
    }
}

/// Newest-first log with a fixed capacity.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: ActivityEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn newest(&self) -> Option<&ActivityEntry> {
        self.entries.front()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptKind {
    User,
    Progress,
    ResearchStep,
    SearchResult,
    Thinking,
    FinalAnswer,
    Error,
    System,
}

impl TranscriptKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "you",
            Self::Progress => "progress",
            Self::ResearchStep => "research",
            Self::SearchResult => "source",
            Self::Thinking => "thinking",
            Self::FinalAnswer => "done",
            Self::Error => "error",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptMessage {
    pub kind: TranscriptKind,
    /// Terminal rendering, built once when the message arrives.
    pub lines: Vec<Line<'static>>,
}

impl TranscriptMessage {
    #[cfg(test)]
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Oldest-first message window; the oldest message is dropped past capacity.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: VecDeque<TranscriptMessage>,
    capacity: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::with_capacity(TRANSCRIPT_CAPACITY)
    }
}

impl Transcript {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, kind: TranscriptKind, markdown: impl AsRef<str>) {
        self.messages.push_back(TranscriptMessage {
            kind,
            lines: to_lines(markdown.as_ref()),
        });
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &TranscriptMessage> {
        self.messages.iter()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&TranscriptMessage> {
        self.messages.back()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
