use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::attachment::{
    AttachmentCandidate, AttachmentRead, AttachmentReader, validate_candidate,
};
use crate::clipboard::{COPY_FAILED_ALERT, ClipboardSink, CopyFeedback};
use crate::composer::{Composer, SessionRequest};
use crate::config::{ClientConfig, ClientVariant};
use crate::connection::{ConnectionEvent, ConnectionStatus, QueryChannel};
use crate::export::save_download;
use crate::markdown::plain_text;
use crate::progress::{
    ActivityEntry, ActivityLog, ProgressView, RequestPhase, Transcript, TranscriptKind, stage_icon,
};
use crate::protocol::InboundEvent;
use crate::report::{ResultView, download_file_name, share_url};

const COMMAND_INDEX: [(&str, &str); 12] = [
    ("/attach", "Attach a text file: /attach <path>"),
    ("/detach", "Remove the attached file"),
    ("/searches", "Searches per query: /searches <n>"),
    ("/rewordings", "Rewordings per query: /rewordings <n>"),
    ("/toggle", "Expand or collapse a research step: /toggle <n>"),
    ("/copy", "Copy a code block: /copy <n>"),
    ("/share", "Copy the share link"),
    ("/download", "Save the results as text"),
    ("/export-html", "Save the results as an HTML page"),
    ("/clear", "Clear the log and results"),
    ("/quit", "Quit app"),
    ("/exit", "Quit app"),
];
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error. Please refresh the page.";
const NO_RESULTS_TO_EXPORT: &str = "No results to export";
pub const RESULT_READY_MESSAGE: &str = "Research completed! See results in the right panel.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSuggestion {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Composer,
    Feed,
    Result,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Alert(String),
    ManualCopy { title: String, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Attach(String),
    Detach,
    Searches(String),
    Rewordings(String),
    Toggle(String),
    Copy(String),
    Share,
    Download,
    ExportHtml,
    Clear,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if !trimmed.starts_with('/') {
            return None;
        }
        let (name, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim().to_string()),
            None => (trimmed, String::new()),
        };
        Some(match name {
            "/attach" => Self::Attach(arg),
            "/detach" => Self::Detach,
            "/searches" => Self::Searches(arg),
            "/rewordings" => Self::Rewordings(arg),
            "/toggle" => Self::Toggle(arg),
            "/copy" => Self::Copy(arg),
            "/share" => Self::Share,
            "/download" => Self::Download,
            "/export-html" => Self::ExportHtml,
            "/clear" => Self::Clear,
            "/quit" | "/exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Collaborators a submit or command may reach out to.
pub struct Ports<'a> {
    pub channel: &'a dyn QueryChannel,
    pub clipboard: &'a mut dyn ClipboardSink,
    pub attachments: &'a AttachmentReader,
}

/// Everything the client shows, owned in one place and mutated only from the UI loop.
#[derive(Debug)]
pub struct App {
    pub running: bool,
    pub ticks: u64,
    pub active_pane: Pane,
    pub composer: Composer,
    variant: ClientVariant,
    origin: String,
    download_dir: PathBuf,
    connection: ConnectionStatus,
    phase: RequestPhase,
    progress: Option<ProgressView>,
    activity: ActivityLog,
    transcript: Transcript,
    result: Option<ResultView>,
    error: Option<String>,
    modal: Option<Modal>,
    notice: Option<String>,
    copy_feedback: CopyFeedback,
    selected_step: usize,
    selected_code: usize,
    feed_scroll: u16,
    feed_follow: bool,
    result_scroll: u16,
}

impl Default for App {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl App {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            running: true,
            ticks: 0,
            active_pane: Pane::Composer,
            composer: Composer::with_settings(config.settings),
            variant: config.variant,
            origin: config.origin.clone(),
            download_dir: config.download_dir.clone(),
            connection: ConnectionStatus::Connecting,
            phase: RequestPhase::Idle,
            progress: None,
            activity: ActivityLog::default(),
            transcript: Transcript::default(),
            result: None,
            error: None,
            modal: None,
            notice: None,
            copy_feedback: CopyFeedback::default(),
            selected_step: 0,
            selected_code: 0,
            feed_scroll: 0,
            feed_follow: true,
            result_scroll: 0,
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.ticks = self.ticks.saturating_add(1);
        self.copy_feedback.expire(now);
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn variant(&self) -> ClientVariant {
        self.variant
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection
    }

    #[cfg(test)]
    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase == RequestPhase::InProgress
    }

    pub fn progress(&self) -> Option<&ProgressView> {
        self.progress.as_ref()
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn result(&self) -> Option<&ResultView> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn copy_feedback(&self) -> &CopyFeedback {
        &self.copy_feedback
    }

    pub fn selected_step(&self) -> usize {
        self.selected_step
    }

    pub fn selected_code(&self) -> usize {
        self.selected_code
    }

    pub fn dismiss_modal(&mut self) -> bool {
        self.modal.take().is_some()
    }

    fn alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(alert = %message, "alert shown");
        self.modal = Some(Modal::Alert(message));
    }

    fn note(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }

    pub fn next_pane(&mut self) {
        self.active_pane = match self.active_pane {
            Pane::Composer => Pane::Feed,
            Pane::Feed => Pane::Result,
            Pane::Result => Pane::Composer,
        };
    }

    pub fn prev_pane(&mut self) {
        self.active_pane = match self.active_pane {
            Pane::Composer => Pane::Result,
            Pane::Feed => Pane::Composer,
            Pane::Result => Pane::Feed,
        };
    }

    pub fn feed_scroll(&self) -> u16 {
        self.feed_scroll
    }

    #[cfg(test)]
    pub fn is_feed_following(&self) -> bool {
        self.feed_follow
    }

    pub fn result_scroll(&self) -> u16 {
        self.result_scroll
    }

    pub fn scroll_feed_up(&mut self) {
        self.feed_follow = false;
        self.feed_scroll = self.feed_scroll.saturating_sub(1);
    }

    /// Reaching the bottom resumes following new entries.
    pub fn scroll_feed_down(&mut self, max_scroll: u16) {
        self.feed_scroll = (self.feed_scroll + 1).min(max_scroll);
        self.feed_follow = self.feed_scroll >= max_scroll;
    }

    pub fn sync_feed_scroll(&mut self, max_scroll: u16) {
        if self.feed_follow || self.feed_scroll > max_scroll {
            self.feed_scroll = max_scroll;
        }
    }

    pub fn scroll_result_up(&mut self) {
        self.result_scroll = self.result_scroll.saturating_sub(1);
    }

    pub fn scroll_result_down(&mut self, max_scroll: u16) {
        self.result_scroll = (self.result_scroll + 1).min(max_scroll);
    }

    pub fn select_prev_step(&mut self) {
        self.selected_step = self.selected_step.saturating_sub(1);
    }

    pub fn select_next_step(&mut self) {
        let count = self.result.as_ref().map_or(0, |r| r.steps.len());
        if count > 0 {
            self.selected_step = (self.selected_step + 1).min(count - 1);
        }
    }

    pub fn toggle_selected_step(&mut self) -> bool {
        let index = self.selected_step;
        self.result
            .as_mut()
            .is_some_and(|result| result.toggle_step(index))
    }

    pub fn select_prev_code(&mut self) {
        self.selected_code = self.selected_code.saturating_sub(1);
    }

    pub fn select_next_code(&mut self) {
        let count = self.result.as_ref().map_or(0, |r| r.code_blocks().count());
        if count > 0 {
            self.selected_code = (self.selected_code + 1).min(count - 1);
        }
    }

    pub fn command_suggestions(&self) -> Vec<CommandSuggestion> {
        let Some(query) = command_query(self.composer.input()) else {
            return Vec::new();
        };
        COMMAND_INDEX
            .iter()
            .filter(|(command, _)| command.starts_with(query))
            .map(|(command, description)| CommandSuggestion {
                command,
                description,
            })
            .collect()
    }

    pub fn should_show_command_index(&self) -> bool {
        self.modal.is_none() && !self.command_suggestions().is_empty()
    }

    pub fn autocomplete_top_command(&mut self) -> bool {
        let Some(top) = self.command_suggestions().first().copied() else {
            return false;
        };
        if self.composer.input().trim() == top.command {
            return false;
        }
        self.composer.set_input(top.command);
        true
    }

    /// Handles Enter in the composer: a slash command runs locally, anything else is sent.
    pub fn submit(&mut self, ports: &mut Ports<'_>, now: Instant, wall: NaiveDateTime) {
        if let Some(command) = Command::parse(self.composer.input()) {
            self.composer.clear_input();
            self.run_command(command, ports, now, wall);
            return;
        }
        let Some(request) = self.composer.compose() else {
            return;
        };
        if !self.begin_request() {
            self.note("A request is already in progress");
            return;
        }
        match ports.channel.send_query(&request.to_message(self.variant)) {
            Ok(()) => self.request_sent(&request),
            Err(err) => self.request_failed(err.to_string()),
        }
    }

    /// Clears the previous outcome and enters `InProgress`; refuses while a request is in flight.
    pub fn begin_request(&mut self) -> bool {
        if self.phase == RequestPhase::InProgress {
            debug!("submit refused while a request is in flight");
            return false;
        }
        self.phase = RequestPhase::InProgress;
        self.progress = Some(ProgressView::starting());
        self.error = None;
        self.notice = None;
        match self.variant {
            ClientVariant::Report => self.activity.clear(),
            ClientVariant::Transcript => self.transcript.clear(),
        }
        self.result = None;
        self.result_scroll = 0;
        self.copy_feedback.clear();
        true
    }

    pub fn request_sent(&mut self, request: &SessionRequest) {
        info!(
            chars = request.question.chars().count(),
            attachment = request.attachment.as_ref().map(|f| f.name.as_str()),
            "query sent"
        );
        match self.variant {
            ClientVariant::Report => self
                .activity
                .push(ActivityEntry::now("sent", "Query sent to server")),
            ClientVariant::Transcript => {
                let mut text = request.question.clone();
                if let Some(file) = &request.attachment {
                    text.push_str(&format!("\n\n📎 {} ({})", file.name, file.size_label()));
                }
                self.transcript.push(TranscriptKind::User, text);
            }
        }
        self.composer.mark_sent();
    }

    pub fn request_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "request failed");
        self.fail(reason);
    }

    fn fail(&mut self, message: String) {
        self.phase = RequestPhase::Failed;
        self.progress = None;
        match self.variant {
            ClientVariant::Report => self.activity.clear(),
            ClientVariant::Transcript => self
                .transcript
                .push(TranscriptKind::Error, format!("**Error:** {message}")),
        }
        self.error = Some(message);
    }

    /// The render-state transition for one server event.
    pub fn apply_inbound(&mut self, event: InboundEvent) {
        if event_is_absorbed(self.phase, &event) {
            debug!(phase = ?self.phase, "event ignored after terminal state");
            return;
        }
        match event {
            InboundEvent::Progress(update) => {
                self.phase = RequestPhase::InProgress;
                let view = ProgressView::from_update(&update);
                match self.variant {
                    ClientVariant::Report if view.has_counters() => self
                        .activity
                        .push(ActivityEntry::now(update.status.clone(), view.headline())),
                    ClientVariant::Report => {}
                    ClientVariant::Transcript => self.transcript.push(
                        TranscriptKind::Progress,
                        format!("{} {}", stage_icon(&update.status), view.headline()),
                    ),
                }
                self.progress = Some(view);
            }
            InboundEvent::Result(result) => {
                info!(session_id = %result.session_id, steps = result.research_steps.len(), "result received");
                let view = ResultView::from_result(&result);
                self.phase = RequestPhase::Completed;
                self.progress = None;
                self.error = None;
                match self.variant {
                    ClientVariant::Report => self.activity.clear(),
                    ClientVariant::Transcript => self
                        .transcript
                        .push(TranscriptKind::FinalAnswer, RESULT_READY_MESSAGE),
                }
                self.result = Some(view);
                self.selected_step = 0;
                self.selected_code = 0;
                self.result_scroll = 0;
                self.copy_feedback.clear();
            }
            InboundEvent::Error(message) => self.fail(message),
            InboundEvent::ResearchStep(text) => self.log_detail(TranscriptKind::ResearchStep, text),
            InboundEvent::SearchResult(text) => self.log_detail(TranscriptKind::SearchResult, text),
            InboundEvent::Thinking(text) => self.log_detail(TranscriptKind::Thinking, text),
            InboundEvent::System(text) => self.log_detail(TranscriptKind::System, text),
        }
    }

    fn log_detail(&mut self, kind: TranscriptKind, text: String) {
        match self.variant {
            ClientVariant::Transcript => self.transcript.push(kind, text),
            ClientVariant::Report if self.phase == RequestPhase::InProgress => {
                self.activity.push(ActivityEntry::now(kind.label(), text))
            }
            ClientVariant::Report => debug!(kind = kind.label(), "detail outside a request"),
        }
    }

    pub fn apply_connection(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Status(status) => {
                if status != self.connection {
                    info!(status = status.label(), "connection status");
                }
                self.connection = status;
            }
            ConnectionEvent::Inbound(event) => self.apply_inbound(event),
            ConnectionEvent::TransportError(message) => {
                warn!(error = %message, "transport error");
                self.connection = ConnectionStatus::Error;
                if self.phase == RequestPhase::InProgress {
                    self.fail(CONNECTION_ERROR_MESSAGE.to_string());
                }
            }
        }
    }

    pub fn apply_attachment(&mut self, read: AttachmentRead) {
        match read {
            AttachmentRead::Loaded(file) => {
                let label = format!("Attached {} ({})", file.name, file.size_label());
                if let Some(previous) = self.composer.attach(file) {
                    debug!(replaced = %previous.name, "attachment replaced");
                }
                self.note(label);
            }
            AttachmentRead::Failed(error) => self.alert(error.to_string()),
        }
    }

    pub fn run_command(
        &mut self,
        command: Command,
        ports: &mut Ports<'_>,
        now: Instant,
        wall: NaiveDateTime,
    ) {
        debug!(?command, "command");
        match command {
            Command::Attach(path) => self.request_attachment(&path, ports.attachments),
            Command::Detach => match self.composer.detach() {
                Some(file) => self.note(format!("Removed {}", file.name)),
                None => self.note("No file attached"),
            },
            Command::Searches(raw) => {
                self.composer.set_num_searches(raw);
                let value = self.composer.settings().num_searches;
                self.note(format!("Searches per query: {value}"));
            }
            Command::Rewordings(raw) => {
                self.composer.set_num_rewordings(raw);
                let value = self.composer.settings().num_rewordings;
                self.note(format!("Rewordings per query: {value}"));
            }
            Command::Toggle(raw) => match raw.trim().parse::<usize>() {
                Ok(number) if number > 0 => {
                    let toggled = self
                        .result
                        .as_mut()
                        .is_some_and(|result| result.toggle_step(number - 1));
                    if toggled {
                        self.selected_step = number - 1;
                    } else {
                        self.note(format!("No research step {number}"));
                    }
                }
                _ => self.note("Usage: /toggle <step number>"),
            },
            Command::Copy(raw) => match raw.trim().parse::<usize>() {
                Ok(index) => {
                    self.copy_code(index, ports.clipboard, now);
                }
                Err(_) if raw.trim().is_empty() => {
                    let index = self.selected_code;
                    self.copy_code(index, ports.clipboard, now);
                }
                Err(_) => self.note("Usage: /copy <code block number>"),
            },
            Command::Share => self.share(ports.clipboard),
            Command::Download => {
                self.download(wall);
            }
            Command::ExportHtml => {
                self.export_html(wall);
            }
            Command::Clear => self.clear_display(),
            Command::Quit => self.quit(),
            Command::Unknown(name) => self.note(format!("Unknown command {name}")),
        }
    }

    /// Validates synchronously and hands the read to the background reader.
    pub fn request_attachment(&mut self, raw_path: &str, reader: &AttachmentReader) {
        let raw_path = raw_path.trim();
        if raw_path.is_empty() {
            self.note("Usage: /attach <path>");
            return;
        }
        let candidate = match AttachmentCandidate::from_path(raw_path) {
            Ok(candidate) => candidate,
            Err(err) => return self.alert(err.to_string()),
        };
        if let Err(err) = validate_candidate(&candidate) {
            return self.alert(err.to_string());
        }
        self.note(format!("Reading {}...", candidate.name));
        reader.request(candidate);
    }

    pub fn copy_code(&mut self, index: usize, clipboard: &mut dyn ClipboardSink, now: Instant) -> bool {
        let Some(code) = self
            .result
            .as_ref()
            .and_then(|result| result.code_block(index))
            .map(|block| block.code.clone())
        else {
            self.note(format!("No code block {index}"));
            return false;
        };
        match clipboard.set_text(&code) {
            Ok(()) => {
                self.selected_code = index;
                self.copy_feedback.mark_copied(index, now);
                true
            }
            Err(_) => {
                self.alert(COPY_FAILED_ALERT);
                false
            }
        }
    }

    pub fn copy_selected_code(&mut self, clipboard: &mut dyn ClipboardSink, now: Instant) -> bool {
        let index = self.selected_code;
        self.copy_code(index, clipboard, now)
    }

    pub fn share(&mut self, clipboard: &mut dyn ClipboardSink) {
        let Some(session_id) = self
            .result
            .as_ref()
            .map(|result| result.session_id.clone())
            .filter(|id| !id.is_empty())
        else {
            self.note("No session to share yet");
            return;
        };
        let url = share_url(&self.origin, &session_id);
        match clipboard.set_text(&url) {
            Ok(()) => self.note("Share link copied to clipboard"),
            Err(_) => {
                self.modal = Some(Modal::ManualCopy {
                    title: "Copy this link".to_string(),
                    text: url,
                })
            }
        }
    }

    /// Text the download action saves for the current variant.
    pub fn download_text(&self) -> Option<String> {
        match self.variant {
            ClientVariant::Report => self.result.as_ref().map(ResultView::transcript_text),
            ClientVariant::Transcript => {
                let text = self
                    .result
                    .as_ref()
                    .map(|result| plain_text(&result.answer_markdown))
                    .filter(|text| !text.trim().is_empty());
                Some(text.unwrap_or_else(|| NO_RESULTS_TO_EXPORT.to_string()))
            }
        }
    }

    pub fn download(&mut self, wall: NaiveDateTime) -> Option<PathBuf> {
        let Some(text) = self.download_text() else {
            self.note("No results to download yet");
            return None;
        };
        let session_id = self.result.as_ref().map(|result| result.session_id.clone());
        let name = download_file_name(self.variant, session_id.as_deref(), wall);
        self.save(&name, &text)
    }

    pub fn export_html(&mut self, wall: NaiveDateTime) -> Option<PathBuf> {
        let Some(document) = self.result.as_ref().map(ResultView::html_document) else {
            self.note("No results to export yet");
            return None;
        };
        let name = format!("rag-report-{}.html", wall.format("%Y-%m-%dT%H-%M-%S"));
        self.save(&name, &document)
    }

    fn save(&mut self, name: &str, text: &str) -> Option<PathBuf> {
        match save_download(&self.download_dir, name, text) {
            Ok(path) => {
                self.note(format!("Saved {}", path.display()));
                Some(path)
            }
            Err(err) => {
                self.alert(err.to_string());
                None
            }
        }
    }

    pub fn clear_display(&mut self) {
        if self.is_busy() {
            self.note("Wait for the current request to finish");
            return;
        }
        self.phase = RequestPhase::Idle;
        self.progress = None;
        self.activity.clear();
        self.transcript.clear();
        self.result = None;
        self.error = None;
        self.copy_feedback.clear();
        self.feed_scroll = 0;
        self.feed_follow = true;
        self.result_scroll = 0;
        self.note("Cleared");
    }
}

// Terminal states hold until the next submit; detail messages are never absorbed.
fn event_is_absorbed(phase: RequestPhase, event: &InboundEvent) -> bool {
    phase.is_terminal() && event.is_terminal()
        || phase.is_terminal() && matches!(event, InboundEvent::Progress(_))
}

fn command_query(input: &str) -> Option<&str> {
    let trimmed = input.trim_start();
    if !trimmed.starts_with('/') {
        return None;
    }
    Some(trimmed.split_whitespace().next().unwrap_or(trimmed))
}

#[cfg(test)]
#[path = "../tests/unit/app_tests.rs"]
mod tests;
