use super::*;
use crate::app::{Modal, Ports};
use crate::attachment::AttachmentReader;
use crate::clipboard::ClipboardSink;
use crate::config::ClientConfig;
use crate::connection::{ConnectionEvent, QueryChannel};
use crate::error::ClientError;
use crate::protocol::{OutboundMessage, parse_inbound};
use chrono::NaiveDate;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;

struct AcceptAll;

impl QueryChannel for AcceptAll {
    fn send_query(&self, _message: &OutboundMessage) -> Result<(), ClientError> {
        Ok(())
    }
}

struct NoClipboard;

impl ClipboardSink for NoClipboard {
    fn set_text(&mut self, _text: &str) -> Result<(), ClientError> {
        Err(ClientError::Clipboard("unavailable".to_string()))
    }
}

fn render_text(app: &App, width: u16, height: u16) -> String {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).expect("test terminal should initialize");
    let theme = Theme::default();
    terminal
        .draw(|frame| render(frame, app, &theme))
        .expect("render should succeed");
    buffer_to_string(terminal.backend().buffer())
}

fn buffer_to_string(buffer: &Buffer) -> String {
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

fn app_for(variant: ClientVariant) -> App {
    App::new(&ClientConfig {
        variant,
        ..ClientConfig::default()
    })
}

fn submit(app: &mut App, text: &str) {
    let reader = AttachmentReader::default();
    let mut clipboard = NoClipboard;
    let mut ports = Ports {
        channel: &AcceptAll,
        clipboard: &mut clipboard,
        attachments: &reader,
    };
    app.composer.set_input(text);
    let wall = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("timestamp");
    app.submit(&mut ports, Instant::now(), wall);
}

fn finished_app(variant: ClientVariant) -> App {
    let mut app = app_for(variant);
    submit(&mut app, "What is Rust?");
    app.apply_inbound(parse_inbound(
        r#"{"type":"result","content":{
            "answer":"Rust is **fast**.",
            "research_steps":[{"query":"rust speed","analysis":"Benchmarks agree."}],
            "session_id":"abc123",
            "evaluation_result":{"overall_score":8.5,"metrics":{"accuracy":9,"completeness":8,"relevance":9,"clarity":8,"confidence":8},"reasoning":"well sourced"}
        }}"#,
    ));
    app
}

#[test]
fn report_layout_shows_panes_and_help() {
    let text = render_text(&app_for(ClientVariant::Report), 140, 36);
    assert!(text.contains("Research Progress"));
    assert!(text.contains("Ask a Question"));
    assert!(text.contains("Research Results"));
    assert!(text.contains("Connecting..."));
    assert!(text.contains("Ctrl+Y copy code"));
    assert!(text.contains("Type a research question"));
}

#[test]
fn transcript_layout_uses_its_own_titles() {
    let text = render_text(&app_for(ClientVariant::Transcript), 140, 36);
    assert!(text.contains("Transcript"));
    assert!(text.contains("Output"));
    assert!(text.contains("No messages yet."));
}

#[test]
fn progress_renders_headline_and_gauge_label() {
    let mut app = app_for(ClientVariant::Report);
    submit(&mut app, "question");
    app.apply_inbound(parse_inbound(
        r#"{"type":"progress","content":{"status":"searching","step":1,"total":2,"message":"Searching the web"}}"#,
    ));
    let text = render_text(&app, 140, 36);
    assert!(text.contains("Step 1/2: Searching the web"));
    assert!(text.contains("50%"));
    assert!(text.contains("Researching"));
}

#[test]
fn result_card_shows_answer_steps_and_evaluation() {
    let app = finished_app(ClientVariant::Report);
    let text = render_text(&app, 160, 40);
    assert!(text.contains("Rust is fast."));
    assert!(text.contains("▼ Step 1: rust speed"));
    assert!(!text.contains("Benchmarks agree."));
    assert!(text.contains("8.5/10 (Excellent)"));
    assert!(text.contains("Accuracy"));
    assert!(text.contains("Session ID: abc123"));
}

#[test]
fn expanded_step_shows_its_analysis() {
    let mut app = finished_app(ClientVariant::Report);
    assert!(app.toggle_selected_step());
    let text = render_text(&app, 160, 40);
    assert!(text.contains("▲ Step 1: rust speed"));
    assert!(text.contains("Benchmarks agree."));
}

#[test]
fn transcript_lists_labelled_messages() {
    let app = finished_app(ClientVariant::Transcript);
    let lines = feed_lines(&app, &Theme::default());
    let rendered: Vec<String> = lines
        .iter()
        .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
        .collect();
    assert_eq!(rendered.first().map(String::as_str), Some("you:"));
    assert!(rendered.iter().any(|line| line == "done:"));
    assert!(rendered.iter().any(|line| line.contains("Research completed!")));
    assert!(!rendered.iter().any(|line| line.contains("Rust is fast.")));

    let output = render_text(&app, 160, 40);
    assert!(output.contains("Rust is fast."));
}

#[test]
fn transcript_output_waits_for_the_next_answer() {
    let mut app = finished_app(ClientVariant::Transcript);
    submit(&mut app, "Another question");
    let text = render_text(&app, 160, 40);
    assert!(text.contains("Research started... waiting for results."));
    assert!(!text.contains("Rust is fast."));
    assert!(!text.contains("Session ID: abc123"));
}

#[test]
fn error_shows_in_report_feed() {
    let mut app = app_for(ClientVariant::Report);
    submit(&mut app, "question");
    app.apply_inbound(parse_inbound(r#"{"type":"error","content":"rate limited"}"#));
    let text = render_text(&app, 140, 36);
    assert!(text.contains("Error: rate limited"));
}

#[test]
fn connection_status_is_rendered() {
    let mut app = app_for(ClientVariant::Report);
    app.apply_connection(ConnectionEvent::Status(ConnectionStatus::Connected));
    assert!(render_text(&app, 140, 36).contains("Connected"));
    app.apply_connection(ConnectionEvent::Status(ConnectionStatus::Disconnected));
    assert!(render_text(&app, 140, 36).contains("Disconnected"));
}

#[test]
fn command_index_overlays_when_typing_slash() {
    let mut app = app_for(ClientVariant::Report);
    app.composer.set_input("/sh");
    let text = render_text(&app, 140, 36);
    assert!(text.contains("/share"));
    assert!(text.contains("Copy the share link"));
}

#[test]
fn manual_copy_modal_shows_link() {
    let mut app = finished_app(ClientVariant::Report);
    let mut clipboard = NoClipboard;
    app.share(&mut clipboard);
    assert!(matches!(app.modal(), Some(Modal::ManualCopy { .. })));
    let text = render_text(&app, 140, 36);
    assert!(text.contains("Copy this link"));
    assert!(text.contains("http://localhost:8000/?session=abc123"));
    assert!(text.contains("Esc to dismiss"));
}

#[test]
fn copy_bar_lists_code_blocks() {
    let mut app = app_for(ClientVariant::Report);
    submit(&mut app, "question");
    app.apply_inbound(parse_inbound(
        r#"{"type":"result","content":{"answer":"```sh\necho hi\n```","session_id":"s"}}"#,
    ));
    let lines = result_lines(&app, &Theme::default(), Instant::now());
    let flat: Vec<String> = lines
        .iter()
        .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
        .collect();
    assert!(flat.iter().any(|line| line.contains("[0] Copy")));
}

#[test]
fn small_terminal_does_not_panic() {
    let app = finished_app(ClientVariant::Report);
    let _ = render_text(&app, 20, 8);
}

#[test]
fn pane_hit_test_identifies_each_pane() {
    let screen = Rect::new(0, 0, 120, 30);
    let areas = pane_areas(screen);
    assert_eq!(pane_hit_test(screen, areas.feed.x + 1, areas.feed.y + 1), Some(Pane::Feed));
    assert_eq!(
        pane_hit_test(screen, areas.composer.x + 1, areas.composer.y + 1),
        Some(Pane::Composer)
    );
    assert_eq!(
        pane_hit_test(screen, areas.result.x + 1, areas.result.y + 1),
        Some(Pane::Result)
    );
    assert_eq!(pane_hit_test(screen, areas.status.x, areas.status.y), None);
}

#[test]
fn working_dots_animate_over_ticks() {
    assert_eq!(working_dots(0), "[   ]");
    assert_eq!(working_dots(2), "[.  ]");
    assert_eq!(working_dots(12), "[   ]");
}
