use super::*;
use crate::attachment::AttachedFile;
use crate::error::{AttachmentError, ClientError};
use crate::protocol::{OutboundMessage, parse_inbound};
use chrono::NaiveDate;
use std::cell::RefCell;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static TEMP_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let counter = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!("research-console-{prefix}-{nanos}-{counter}"));
        Self { path }
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

#[derive(Default)]
struct RecordingChannel {
    sent: RefCell<Vec<OutboundMessage>>,
    closed: bool,
}

impl QueryChannel for RecordingChannel {
    fn send_query(&self, message: &OutboundMessage) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::NotConnected);
        }
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FakeClipboard {
    copied: Vec<String>,
    broken: bool,
}

impl ClipboardSink for FakeClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClientError> {
        if self.broken {
            return Err(ClientError::Clipboard("no display".to_string()));
        }
        self.copied.push(text.to_string());
        Ok(())
    }
}

struct Harness {
    channel: RecordingChannel,
    clipboard: FakeClipboard,
    attachments: AttachmentReader,
}

impl Harness {
    fn new() -> Self {
        Self {
            channel: RecordingChannel::default(),
            clipboard: FakeClipboard::default(),
            attachments: AttachmentReader::default(),
        }
    }

    fn submit(&mut self, app: &mut App, text: &str) {
        app.composer.set_input(text);
        let mut ports = Ports {
            channel: &self.channel,
            clipboard: &mut self.clipboard,
            attachments: &self.attachments,
        };
        app.submit(&mut ports, Instant::now(), wall());
    }
}

fn wall() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|date| date.and_hms_opt(9, 30, 15))
        .expect("valid timestamp")
}

fn app_for(variant: ClientVariant) -> App {
    App::new(&ClientConfig {
        variant,
        ..ClientConfig::default()
    })
}

fn progress(step: u32, total: u32, message: &str) -> InboundEvent {
    parse_inbound(&format!(
        r#"{{"type":"progress","content":{{"status":"searching","step":{step},"total":{total},"message":"{message}"}}}}"#
    ))
}

fn result_event() -> InboundEvent {
    parse_inbound(
        r#"{"type":"result","content":{
            "answer":"**Hi**\n\n```rust\nfn main() {}\n```",
            "research_steps":[{"step_number":1,"query":"q1","analysis":"Looked at `x`\n\n```\nls\n```"}],
            "session_id":"abc123",
            "evaluation_result":{"overall_score":8.2,"metrics":{"accuracy":8,"completeness":7,"relevance":9,"clarity":8,"confidence":7.5},"reasoning":"solid"}
        }}"#,
    )
}

#[test]
fn report_flow_ends_with_rendered_result() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "  What is Rust?  ");

    assert_eq!(app.phase(), RequestPhase::InProgress);
    assert!(app.is_busy());
    assert_eq!(app.composer.input(), "");
    let sent = harness.channel.sent.borrow();
    assert_eq!(sent.len(), 1);
    let OutboundMessage::Query { content, settings } = &sent[0];
    assert_eq!(content, "What is Rust?");
    assert_eq!(settings.num_searches, 3);
    drop(sent);

    app.apply_inbound(progress(1, 3, "Generating queries"));
    let view = app.progress().expect("progress");
    assert_eq!(view.headline(), "Step 1/3: Generating queries");
    assert_eq!(view.percent_label().as_deref(), Some("33%"));

    app.apply_inbound(progress(3, 3, "Finalizing"));
    assert_eq!(app.progress().and_then(|p| p.percent_label()).as_deref(), Some("100%"));
    assert_eq!(
        app.activity().newest().map(|e| e.message.as_str()),
        Some("Step 3/3: Finalizing")
    );

    app.apply_inbound(result_event());
    assert_eq!(app.phase(), RequestPhase::Completed);
    assert!(!app.is_busy());
    assert!(app.progress().is_none());
    assert!(app.activity().is_empty());
    let result = app.result().expect("result");
    assert!(result.answer.html.contains("<strong>Hi</strong>"));
    assert_eq!(result.session_id, "abc123");
    assert_eq!(result.code_blocks().count(), 2);
}

#[test]
fn error_event_fails_and_reenables_submission() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    app.apply_inbound(progress(1, 3, "Generating queries"));
    assert!(!app.activity().is_empty());
    app.apply_inbound(parse_inbound(r#"{"type":"error","content":"model overloaded"}"#));

    assert_eq!(app.phase(), RequestPhase::Failed);
    assert_eq!(app.error(), Some("model overloaded"));
    assert!(app.progress().is_none());
    assert!(app.activity().is_empty());

    harness.submit(&mut app, "again");
    assert_eq!(app.phase(), RequestPhase::InProgress);
    assert_eq!(app.error(), None);
    assert_eq!(harness.channel.sent.borrow().len(), 2);
}

#[test]
fn terminal_state_absorbs_late_events() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    app.apply_inbound(result_event());

    app.apply_inbound(progress(2, 3, "late"));
    app.apply_inbound(parse_inbound(r#"{"type":"error","content":"late error"}"#));

    assert_eq!(app.phase(), RequestPhase::Completed);
    assert!(app.progress().is_none());
    assert_eq!(app.error(), None);
    assert!(app.result().is_some());
}

#[test]
fn second_submit_is_refused_while_in_flight() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "first");
    harness.submit(&mut app, "second");

    assert_eq!(harness.channel.sent.borrow().len(), 1);
    assert_eq!(app.composer.input(), "second");
    assert_eq!(app.notice(), Some("A request is already in progress"));
}

#[test]
fn blank_input_sends_nothing() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "   ");
    assert!(harness.channel.sent.borrow().is_empty());
    assert_eq!(app.phase(), RequestPhase::Idle);
}

#[test]
fn closed_channel_fails_the_request_with_refresh_hint() {
    let mut harness = Harness::new();
    harness.channel.closed = true;
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");

    assert_eq!(app.phase(), RequestPhase::Failed);
    assert_eq!(
        app.error(),
        Some("WebSocket connection not available. Please refresh the page.")
    );
    assert_eq!(app.composer.input(), "question");
}

#[test]
fn transport_error_fails_in_flight_request_only() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);

    app.apply_connection(ConnectionEvent::TransportError("reset".to_string()));
    assert_eq!(app.connection_status(), ConnectionStatus::Error);
    assert_eq!(app.phase(), RequestPhase::Idle);

    harness.submit(&mut app, "question");
    app.apply_connection(ConnectionEvent::TransportError("reset".to_string()));
    assert_eq!(app.phase(), RequestPhase::Failed);
    assert_eq!(app.error(), Some(CONNECTION_ERROR_MESSAGE));
}

#[test]
fn close_without_error_keeps_request_in_flight() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    app.apply_connection(ConnectionEvent::Status(ConnectionStatus::Disconnected));
    assert_eq!(app.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(app.phase(), RequestPhase::InProgress);
}

#[test]
fn progress_without_counters_only_updates_the_headline() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    let before = app.activity().len();

    app.apply_inbound(parse_inbound(
        r#"{"type":"progress","content":{"status":"searching","message":"no counters"}}"#,
    ));
    assert_eq!(app.activity().len(), before);
    assert_eq!(app.progress().map(|p| p.headline()).as_deref(), Some("no counters"));

    app.apply_inbound(progress(0, 4, "warming up"));
    assert_eq!(app.activity().len(), before);
    assert_eq!(app.progress().map(|p| p.headline()).as_deref(), Some("warming up"));

    app.apply_inbound(progress(1, 4, "searching"));
    assert_eq!(app.activity().len(), before + 1);
}

#[test]
fn activity_log_keeps_ten_newest() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    for step in 1..=15 {
        app.apply_inbound(progress(step, 15, &format!("update {step}")));
    }
    assert_eq!(app.activity().len(), 10);
    assert_eq!(
        app.activity().newest().map(|e| e.message.as_str()),
        Some("Step 15/15: update 15")
    );
}

#[test]
fn transcript_variant_records_every_message() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Transcript);
    app.composer.attach(AttachedFile {
        name: "notes.md".to_string(),
        content: "# Notes".to_string(),
        size: 7,
    });
    harness.submit(&mut app, "Summarize");

    let sent = harness.channel.sent.borrow();
    let OutboundMessage::Query { content, .. } = &sent[0];
    assert!(content.starts_with("Here is the content of the uploaded file:"));
    assert!(content.ends_with("Summarize"));
    drop(sent);
    assert!(app.composer.attachment().is_none());

    app.apply_inbound(progress(1, 2, "Searching"));
    app.apply_inbound(parse_inbound(r#"{"type":"thinking","content":"hmm"}"#));
    app.apply_inbound(result_event());

    let kinds: Vec<_> = app.transcript().messages().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TranscriptKind::User,
            TranscriptKind::Progress,
            TranscriptKind::Thinking,
            TranscriptKind::FinalAnswer,
        ]
    );
    assert!(app.transcript().messages().next().is_some_and(|m| m.text().contains("📎 notes.md")));
    assert_eq!(
        app.transcript().last().map(|m| m.text()).as_deref(),
        Some(RESULT_READY_MESSAGE)
    );
    assert!(app.transcript().messages().all(|m| !m.text().contains("fn main")));
}

#[test]
fn transcript_submit_clears_the_previous_research() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Transcript);
    harness.submit(&mut app, "first");
    app.apply_inbound(result_event());
    let now = Instant::now();
    assert!(app.copy_code(0, &mut harness.clipboard, now));
    assert!(app.result().is_some());

    harness.submit(&mut app, "second");
    assert!(app.is_busy());
    assert!(app.result().is_none());
    assert!(!app.copy_feedback().is_copied(0, now));
    let kinds: Vec<_> = app.transcript().messages().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![TranscriptKind::User]);
    assert_eq!(app.transcript().last().map(|m| m.text()).as_deref(), Some("second"));
    assert_eq!(app.download_text().as_deref(), Some("No results to export"));
}

#[test]
fn detail_messages_after_result_still_reach_the_transcript() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Transcript);
    harness.submit(&mut app, "question");
    app.apply_inbound(result_event());
    app.apply_inbound(parse_inbound(r#"{"type":"system","content":"bye"}"#));
    assert_eq!(
        app.transcript().last().map(|m| m.kind),
        Some(TranscriptKind::System)
    );
}

#[test]
fn copy_marks_feedback_and_expires() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    app.apply_inbound(result_event());

    let now = Instant::now();
    assert!(app.copy_code(1, &mut harness.clipboard, now));
    assert_eq!(harness.clipboard.copied, vec!["ls\n".to_string()]);
    assert_eq!(app.copy_feedback().label(1, now), "Copied!");
    assert_eq!(app.selected_code(), 1);

    app.on_tick(now + Duration::from_secs(3));
    assert_eq!(app.copy_feedback().label(1, now + Duration::from_secs(3)), "Copy");
}

#[test]
fn copy_failure_shows_alert() {
    let mut harness = Harness::new();
    harness.clipboard.broken = true;
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    app.apply_inbound(result_event());

    assert!(!app.copy_code(0, &mut harness.clipboard, Instant::now()));
    assert_eq!(app.modal(), Some(&Modal::Alert(COPY_FAILED_ALERT.to_string())));
    assert!(app.dismiss_modal());
    assert!(app.modal().is_none());
}

#[test]
fn share_copies_link_or_falls_back_to_manual_copy() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    app.apply_inbound(result_event());

    app.share(&mut harness.clipboard);
    assert_eq!(
        harness.clipboard.copied,
        vec!["http://localhost:8000/?session=abc123".to_string()]
    );

    harness.clipboard.broken = true;
    app.share(&mut harness.clipboard);
    assert_eq!(
        app.modal(),
        Some(&Modal::ManualCopy {
            title: "Copy this link".to_string(),
            text: "http://localhost:8000/?session=abc123".to_string(),
        })
    );
}

#[test]
fn download_saves_report_text_by_session() {
    let dir = TempDirGuard::new("app-download");
    let mut harness = Harness::new();
    let mut app = App::new(&ClientConfig {
        download_dir: dir.path.clone(),
        ..ClientConfig::default()
    });
    harness.submit(&mut app, "question");
    app.apply_inbound(result_event());

    let path = app.download(wall()).expect("saved");
    assert_eq!(path, dir.path.join("rag-session-abc123.txt"));
    let text = fs::read_to_string(&path).expect("read download");
    assert!(text.starts_with("Research Results"));
    assert!(text.contains("Session ID: abc123"));

    let html = app.export_html(wall()).expect("exported");
    assert_eq!(html, dir.path.join("rag-report-2024-05-01T09-30-15.html"));
}

#[test]
fn transcript_download_without_result_says_so() {
    let app = app_for(ClientVariant::Transcript);
    assert_eq!(app.download_text().as_deref(), Some("No results to export"));
    assert_eq!(app_for(ClientVariant::Report).download_text(), None);
}

#[test]
fn slash_commands_run_locally() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "/searches 7");
    harness.submit(&mut app, "/rewordings nope");
    assert_eq!(app.composer.settings().num_searches, 7);
    assert_eq!(app.composer.settings().num_rewordings, 3);
    assert!(harness.channel.sent.borrow().is_empty());

    harness.submit(&mut app, "/bogus");
    assert_eq!(app.notice(), Some("Unknown command /bogus"));

    harness.submit(&mut app, "/quit");
    assert!(!app.running);
}

#[test]
fn attach_command_rejects_disallowed_types() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    let dir = TempDirGuard::new("app-attach");
    fs::create_dir_all(&dir.path).expect("dir");
    let exe = dir.path.join("setup.exe");
    fs::write(&exe, b"MZ").expect("write");

    harness.submit(&mut app, &format!("/attach {}", exe.display()));
    assert!(matches!(app.modal(), Some(Modal::Alert(message)) if message.starts_with("Please upload a text file")));
    assert!(app.composer.attachment().is_none());
}

#[test]
fn loaded_attachment_lands_in_composer() {
    let mut app = app_for(ClientVariant::Report);
    app.apply_attachment(AttachmentRead::Loaded(AttachedFile {
        name: "a.txt".to_string(),
        content: "abc".to_string(),
        size: 3,
    }));
    assert_eq!(app.composer.attachment().map(|f| f.name.as_str()), Some("a.txt"));
    assert!(app.notice().is_some_and(|n| n.starts_with("Attached a.txt")));
}

#[test]
fn failed_attachment_read_shows_alert() {
    let mut app = app_for(ClientVariant::Report);
    app.apply_attachment(AttachmentRead::Failed(AttachmentError::Read {
        name: "gone.txt".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
    }));
    assert!(matches!(app.modal(), Some(Modal::Alert(message)) if message.contains("gone.txt")));
    assert!(app.composer.attachment().is_none());
}

#[test]
fn toggle_and_selection_follow_result_steps() {
    let mut harness = Harness::new();
    let mut app = app_for(ClientVariant::Report);
    harness.submit(&mut app, "question");
    app.apply_inbound(result_event());

    assert!(app.toggle_selected_step());
    assert!(app.result().is_some_and(|r| r.steps[0].is_expanded()));
    app.select_next_step();
    assert_eq!(app.selected_step(), 0);
    harness.submit(&mut app, "/toggle 2");
    assert_eq!(app.notice(), Some("No research step 2"));

    app.select_next_code();
    app.select_next_code();
    assert_eq!(app.selected_code(), 1);
}

#[test]
fn command_suggestions_filter_by_prefix() {
    let mut app = App::default();
    app.composer.set_input("/ex");
    let names: Vec<_> = app.command_suggestions().iter().map(|s| s.command).collect();
    assert_eq!(names, vec!["/export-html", "/exit"]);
    assert!(app.should_show_command_index());
    assert!(app.autocomplete_top_command());
    assert_eq!(app.composer.input(), "/export-html");

    app.composer.set_input("plain question");
    assert!(app.command_suggestions().is_empty());
    assert!(!app.should_show_command_index());
}

#[test]
fn parses_commands_with_arguments() {
    assert_eq!(
        Command::parse(" /attach  notes.md "),
        Some(Command::Attach("notes.md".to_string()))
    );
    assert_eq!(Command::parse("/exit"), Some(Command::Quit));
    assert_eq!(Command::parse("hello /attach"), None);
}

#[test]
fn pane_focus_cycles_both_ways() {
    let mut app = App::default();
    app.next_pane();
    assert_eq!(app.active_pane, Pane::Feed);
    app.next_pane();
    app.next_pane();
    assert_eq!(app.active_pane, Pane::Composer);
    app.prev_pane();
    assert_eq!(app.active_pane, Pane::Result);
}

#[test]
fn feed_scroll_follows_until_user_scrolls_up() {
    let mut app = App::default();
    app.sync_feed_scroll(12);
    assert_eq!(app.feed_scroll(), 12);
    app.scroll_feed_up();
    assert!(!app.is_feed_following());
    app.sync_feed_scroll(20);
    assert_eq!(app.feed_scroll(), 11);
    for _ in 0..20 {
        app.scroll_feed_down(20);
    }
    assert!(app.is_feed_following());
    assert_eq!(app.feed_scroll(), 20);
}
