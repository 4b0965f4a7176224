use std::time::Instant;

use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Gauge, Padding, Paragraph, Wrap};

use crate::app::{App, CommandSuggestion, Modal, Pane};
use crate::config::ClientVariant;
use crate::connection::ConnectionStatus;
use crate::progress::{TranscriptKind, stage_icon};
use crate::report::{EvaluationView, ResultView};
use crate::text_layout::{layout_input, wrapped_height};
use crate::theme::Theme;

const MAX_INPUT_TEXT_LINES: u16 = 5;
const TEXT_PADDING: u16 = 1;
const STATUS_HEIGHT: u16 = 3;
const TITLE_BAR_HEIGHT: u16 = 3;
const GAUGE_HEIGHT: u16 = 1;
const BAR_CELLS: usize = 20;
const ACTIVE_TITLE_BG: Color = Color::Rgb(90, 145, 200);
const ACTIVE_TITLE_FG: Color = Color::Black;
const STATUS_HELP_TEXT: &str = "Tab focus | Enter send | Space toggle step | Ctrl+Y copy code | Ctrl+L share | Ctrl+S save | Ctrl+C quit";
const INPUT_PLACEHOLDER: &str = "Type a research question, or / for commands";

struct PaneAreas {
    feed: Rect,
    composer: Rect,
    result: Rect,
    status: Rect,
}

fn pane_areas(screen: Rect) -> PaneAreas {
    let [body, status] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(STATUS_HEIGHT)]).areas(screen);
    let [left, result] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(body);
    let [feed, composer] =
        Layout::vertical([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(left);
    PaneAreas {
        feed,
        composer,
        result,
        status,
    }
}

fn content_area(pane: Rect) -> Rect {
    let [_title, content] =
        Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)]).areas(pane);
    content
}

fn text_width(area: Rect) -> u16 {
    area.width.saturating_sub(TEXT_PADDING * 2).max(1)
}

fn feed_text_area(screen: Rect, app: &App) -> Rect {
    let content = content_area(pane_areas(screen).feed);
    if app.variant() == ClientVariant::Report && app.progress().is_some() {
        let [_gauge, rest] =
            Layout::vertical([Constraint::Length(GAUGE_HEIGHT), Constraint::Min(0)]).areas(content);
        return rest;
    }
    content
}

pub fn composer_text_width(screen: Rect) -> u16 {
    text_width(content_area(pane_areas(screen).composer))
}

pub fn feed_max_scroll(screen: Rect, app: &App, theme: &Theme) -> u16 {
    let area = feed_text_area(screen, app);
    if area.width < 1 || area.height < 1 {
        return 0;
    }
    let total = wrapped_height(&feed_lines(app, theme), text_width(area));
    total.saturating_sub(area.height.saturating_sub(TEXT_PADDING * 2))
}

pub fn result_max_scroll(screen: Rect, app: &App, theme: &Theme) -> u16 {
    let area = content_area(pane_areas(screen).result);
    if area.width < 1 || area.height < 1 {
        return 0;
    }
    let total = wrapped_height(&result_lines(app, theme, Instant::now()), text_width(area));
    total.saturating_sub(area.height.saturating_sub(TEXT_PADDING * 2))
}

pub fn pane_hit_test(screen: Rect, x: u16, y: u16) -> Option<Pane> {
    let areas = pane_areas(screen);
    if point_in_rect(areas.feed, x, y) {
        return Some(Pane::Feed);
    }
    if point_in_rect(areas.composer, x, y) {
        return Some(Pane::Composer);
    }
    if point_in_rect(areas.result, x, y) {
        return Some(Pane::Result);
    }
    None
}

pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    let areas = pane_areas(frame.area());
    let (feed_title, result_title) = match app.variant() {
        ClientVariant::Report => ("Research Progress", "Research Results"),
        ClientVariant::Transcript => ("Transcript", "Output"),
    };

    render_feed_pane(frame, areas.feed, feed_title, app, theme);
    render_composer_pane(frame, areas.composer, app, theme);
    render_result_pane(frame, areas.result, result_title, app, theme);
    render_status_bar(frame, areas.status, app, theme);

    if let Some(modal) = app.modal() {
        render_modal(frame, modal, theme);
    }
}

fn render_title_bar(frame: &mut Frame, area: Rect, title: &str, base: Color, active: bool, theme: &Theme) {
    let title_bg = title_bar_bg(base, active);
    let title_fg = if active {
        ACTIVE_TITLE_FG
    } else {
        theme.muted_fg
    };
    frame.render_widget(
        Paragraph::new(title.to_string())
            .style(Style::default().bg(title_bg).fg(title_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(title_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        area,
    );
}

fn render_feed_pane(frame: &mut Frame, area: Rect, title: &str, app: &App, theme: &Theme) {
    let [title_area, content] =
        Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)]).areas(area);
    let active = app.active_pane == Pane::Feed;
    render_title_bar(frame, title_area, title, theme.pane_bg, active, theme);
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.pane_bg)),
        content,
    );

    let text_area = feed_text_area(frame.area(), app);
    if app.variant() == ClientVariant::Report
        && content.width > TEXT_PADDING * 2
        && content.height > 0
        && let Some(progress) = app.progress()
    {
        let gauge_area = Rect::new(
            content.x.saturating_add(TEXT_PADDING),
            content.y,
            text_width(content),
            GAUGE_HEIGHT,
        );
        frame.render_widget(
            Gauge::default()
                .ratio(progress.fill_ratio())
                .label(progress.percent_label().unwrap_or_default())
                .gauge_style(Style::default().fg(theme.gauge_fg).bg(theme.input_bg)),
            gauge_area,
        );
    }

    let scroll = app
        .feed_scroll()
        .min(feed_max_scroll(frame.area(), app, theme));
    frame.render_widget(
        Paragraph::new(feed_lines(app, theme))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .style(Style::default().bg(theme.pane_bg).fg(theme.text_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.pane_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        text_area,
    );
}

pub(crate) fn feed_lines(app: &App, theme: &Theme) -> Vec<Line<'static>> {
    match app.variant() {
        ClientVariant::Report => report_feed_lines(app, theme),
        ClientVariant::Transcript => transcript_lines(app, theme),
    }
}

fn report_feed_lines(app: &App, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(progress) = app.progress() {
        let style = if progress.is_active() {
            Style::default().fg(theme.active_fg).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text_fg)
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{} ", stage_icon(&progress.status))),
            Span::styled(progress.headline(), style),
        ]));
        lines.push(Line::default());
    }
    if let Some(error) = app.error() {
        lines.push(Line::styled(
            format!("Error: {error}"),
            Style::default().fg(theme.error_fg).add_modifier(Modifier::BOLD),
        ));
        lines.push(Line::default());
    }
    for entry in app.activity().entries() {
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", entry.time_label()),
                Style::default().fg(theme.muted_fg),
            ),
            Span::raw(format!("{} ", stage_icon(&entry.status))),
            Span::raw(entry.message.clone()),
        ]));
    }
    if lines.is_empty() {
        lines.push(Line::styled(
            "Submit a question to start research.",
            Style::default().fg(theme.muted_fg),
        ));
    }
    lines
}

fn transcript_lines(app: &App, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in app.transcript().messages() {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        let label_style = match message.kind {
            TranscriptKind::User => Style::default().fg(theme.active_fg).add_modifier(Modifier::BOLD),
            TranscriptKind::Error => Style::default().fg(theme.error_fg).add_modifier(Modifier::BOLD),
            TranscriptKind::FinalAnswer => Style::default().fg(theme.success_fg).add_modifier(Modifier::BOLD),
            _ => Style::default().fg(theme.muted_fg),
        };
        lines.push(Line::styled(format!("{}:", message.kind.label()), label_style));
        lines.extend(message.lines.iter().cloned());
    }
    if lines.is_empty() {
        lines.push(Line::styled(
            "No messages yet.",
            Style::default().fg(theme.muted_fg),
        ));
    }
    lines
}

fn render_composer_pane(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let [title_area, content] =
        Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)]).areas(area);
    let active = app.active_pane == Pane::Composer;
    let title = if app.is_busy() {
        format!("Ask a Question (waiting for results {})", working_dots(app.ticks))
    } else {
        "Ask a Question".to_string()
    };
    render_title_bar(frame, title_area, &title, theme.pane_bg, active, theme);
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.pane_bg)),
        content,
    );
    if content.width < 1 || content.height < 2 {
        return;
    }

    let width = text_width(content);
    let layout = layout_input(app.composer.input(), width);
    let (cursor_line, cursor_col) = app.composer.cursor_line_col(width);
    let max_input_height = content.height.saturating_sub(1).max(1);
    let (input_height, input_scroll) =
        input_box_metrics(layout.line_count, cursor_line, max_input_height);
    let [info_area, input_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(input_height)]).areas(content);

    frame.render_widget(
        Paragraph::new(composer_info_lines(app, theme))
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(theme.pane_bg).fg(theme.text_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.pane_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        info_area,
    );

    let input = if app.composer.input().is_empty() {
        Paragraph::new(Line::styled(
            INPUT_PLACEHOLDER,
            Style::default().fg(theme.muted_fg),
        ))
    } else {
        Paragraph::new(layout.rendered.clone())
            .style(Style::default().fg(theme.text_fg))
            .scroll((input_scroll, 0))
    };
    frame.render_widget(
        input.block(
            Block::default()
                .style(Style::default().bg(theme.input_bg))
                .padding(Padding::uniform(TEXT_PADDING)),
        ),
        input_area,
    );

    if app.should_show_command_index() {
        render_command_index(frame, app.command_suggestions(), frame.area(), input_area, theme);
    }

    if active && app.modal().is_none() {
        let input_inner = input_area.inner(Margin {
            horizontal: TEXT_PADDING,
            vertical: TEXT_PADDING,
        });
        if input_inner.width > 0 && input_inner.height > 0 {
            let visible_cursor_line = cursor_line.saturating_sub(input_scroll);
            if visible_cursor_line < input_inner.height {
                frame.set_cursor_position((
                    input_inner
                        .x
                        .saturating_add(cursor_col.min(input_inner.width.saturating_sub(1))),
                    input_inner.y.saturating_add(visible_cursor_line),
                ));
            }
        }
    }
}

fn composer_info_lines(app: &App, theme: &Theme) -> Vec<Line<'static>> {
    let settings = app.composer.settings();
    let mut lines = vec![Line::from(vec![
        Span::styled("Searches: ", Style::default().fg(theme.muted_fg)),
        Span::raw(settings.num_searches.to_string()),
        Span::styled("  Rewordings: ", Style::default().fg(theme.muted_fg)),
        Span::raw(settings.num_rewordings.to_string()),
    ])];
    match app.composer.attachment() {
        Some(file) => {
            lines.push(Line::from(vec![
                Span::styled("📎 ", Style::default().fg(theme.active_fg)),
                Span::styled(file.name.clone(), Style::default().fg(theme.active_fg)),
                Span::styled(
                    format!(" ({})  Ctrl+X to remove", file.size_label()),
                    Style::default().fg(theme.muted_fg),
                ),
            ]));
            lines.push(Line::styled(
                file.preview(),
                Style::default().fg(theme.muted_fg).add_modifier(Modifier::DIM),
            ));
        }
        None => lines.push(Line::styled(
            "/attach <path> adds a text file",
            Style::default().fg(theme.muted_fg),
        )),
    }
    lines
}

fn render_result_pane(frame: &mut Frame, area: Rect, title: &str, app: &App, theme: &Theme) {
    let [title_area, content] =
        Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)]).areas(area);
    let active = app.active_pane == Pane::Result;
    render_title_bar(frame, title_area, title, theme.result_bg, active, theme);

    let scroll = app
        .result_scroll()
        .min(result_max_scroll(frame.area(), app, theme));
    frame.render_widget(
        Paragraph::new(result_lines(app, theme, Instant::now()))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .style(Style::default().bg(theme.result_bg).fg(theme.text_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.result_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        content,
    );

    if app.is_busy() && app.result().is_none() && app.variant() == ClientVariant::Report {
        render_center_overlay(frame, content, "Researching...");
    }
}

pub(crate) fn result_lines(app: &App, theme: &Theme, now: Instant) -> Vec<Line<'static>> {
    let Some(result) = app.result() else {
        let hint = match app.variant() {
            ClientVariant::Report => "Results appear here when research completes.",
            ClientVariant::Transcript if app.is_busy() => "Research started... waiting for results.",
            ClientVariant::Transcript => "Final answers appear here.",
        };
        return vec![Line::styled(hint, Style::default().fg(theme.muted_fg))];
    };
    let heading = Style::default()
        .fg(theme.active_fg)
        .add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::styled("Answer", heading), Line::default()];
    lines.extend(result.answer_lines.iter().cloned());

    if app.variant() == ClientVariant::Report {
        if !result.steps.is_empty() {
            lines.push(Line::default());
            lines.push(Line::styled("Research Steps", heading));
            lines.extend(step_lines(app, result, theme));
        }
        if let Some(evaluation) = &result.evaluation {
            lines.push(Line::default());
            lines.extend(evaluation_lines(evaluation, theme));
        }
    }

    let code_count = result.code_blocks().count();
    if code_count > 0 {
        lines.push(Line::default());
        lines.push(copy_bar(app, code_count, theme, now));
    }
    if !result.session_id.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(vec![
            Span::styled("Session ID: ", Style::default().fg(theme.muted_fg)),
            Span::raw(result.session_id.clone()),
        ]));
    }
    lines
}

fn step_lines(app: &App, result: &ResultView, theme: &Theme) -> Vec<Line<'static>> {
    let focused = app.active_pane == Pane::Result;
    let mut lines = Vec::new();
    for (idx, step) in result.steps.iter().enumerate() {
        let mut style = Style::default().fg(theme.text_fg);
        if focused && idx == app.selected_step() {
            style = style.fg(theme.active_fg).add_modifier(Modifier::REVERSED);
        }
        lines.push(Line::styled(
            format!("{} Step {}: {}", step.arrow(), step.number, step.query),
            style,
        ));
        if step.is_expanded() {
            for line in &step.analysis_lines {
                let mut spans = vec![Span::raw("   ")];
                spans.extend(line.spans.iter().cloned());
                lines.push(Line::from(spans).style(line.style));
            }
        }
    }
    lines
}

fn evaluation_lines(evaluation: &EvaluationView, theme: &Theme) -> Vec<Line<'static>> {
    let tier_style = Style::default()
        .fg(theme.tier_fg(evaluation.tier))
        .add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::from(vec![
        Span::styled(
            "Evaluation  ",
            Style::default().fg(theme.active_fg).add_modifier(Modifier::BOLD),
        ),
        Span::styled(evaluation.score_label(), tier_style),
    ])];
    for bar in &evaluation.bars {
        let filled = ((bar.width_percent() / 100.0) * BAR_CELLS as f64).round() as usize;
        let filled = filled.min(BAR_CELLS);
        lines.push(Line::from(vec![
            Span::styled(format!("{:<13}", bar.name), Style::default().fg(theme.muted_fg)),
            Span::styled("█".repeat(filled), Style::default().fg(theme.gauge_fg)),
            Span::styled(
                "░".repeat(BAR_CELLS - filled),
                Style::default().fg(theme.muted_fg),
            ),
            Span::raw(format!(" {}", bar.display())),
        ]));
    }
    if !evaluation.reasoning.trim().is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Reasoning: ", Style::default().fg(theme.muted_fg)),
            Span::raw(evaluation.reasoning.trim().to_string()),
        ]));
    }
    if let Some(action) = evaluation.action.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(Line::from(vec![
            Span::styled("Action: ", Style::default().fg(theme.muted_fg)),
            Span::raw(action.to_string()),
        ]));
    }
    lines
}

fn copy_bar(app: &App, code_count: usize, theme: &Theme, now: Instant) -> Line<'static> {
    let mut spans = vec![Span::styled("Code: ", Style::default().fg(theme.muted_fg))];
    for idx in 0..code_count {
        let label = app.copy_feedback().label(idx, now);
        let mut style = if app.copy_feedback().is_copied(idx, now) {
            Style::default().fg(theme.success_fg)
        } else {
            Style::default().fg(theme.text_fg)
        };
        if idx == app.selected_code() {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        spans.push(Span::styled(format!("[{idx}] {label}"), style));
        spans.push(Span::raw("  "));
    }
    Line::from(spans)
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let status = app.connection_status();
    let status_fg = match status {
        ConnectionStatus::Connected => theme.success_fg,
        ConnectionStatus::Connecting => theme.warning_fg,
        ConnectionStatus::Disconnected | ConnectionStatus::Error => theme.error_fg,
    };
    let mut spans = vec![
        Span::styled(status.label(), Style::default().fg(status_fg)),
        Span::raw(" | "),
    ];
    if app.is_busy() {
        spans.push(Span::styled(
            format!("Researching {} | ", working_dots(app.ticks)),
            Style::default().fg(theme.active_fg),
        ));
    }
    match app.notice() {
        Some(notice) => spans.push(Span::styled(
            notice.to_string(),
            Style::default().fg(theme.text_fg),
        )),
        None => spans.push(Span::styled(
            STATUS_HELP_TEXT,
            Style::default().fg(theme.muted_fg),
        )),
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bg).fg(theme.muted_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.status_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        area,
    );
}

fn working_dots(ticks: u64) -> &'static str {
    const FRAMES: [&str; 6] = ["[   ]", "[.  ]", "[.. ]", "[...]", "[ ..]", "[  .]"];
    FRAMES[((ticks / 2) as usize) % FRAMES.len()]
}

fn render_center_overlay(frame: &mut Frame, content: Rect, text: &str) {
    let width = 32u16.min(content.width.saturating_sub(2)).max(20);
    let height = 3u16;
    let x = content.x + (content.width.saturating_sub(width)) / 2;
    let y = content.y + (content.height.saturating_sub(height)) / 2;
    let overlay = Rect::new(x, y, width, height).intersection(frame.area());
    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(text.to_string())
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Rgb(255, 165, 0)))
            .block(
                Block::default()
                    .style(Style::default().bg(Color::Rgb(20, 20, 20)))
                    .padding(Padding::uniform(1)),
            ),
        overlay,
    );
}

fn render_command_index(
    frame: &mut Frame,
    suggestions: Vec<CommandSuggestion>,
    screen: Rect,
    input_area: Rect,
    theme: &Theme,
) {
    let room = input_area.y.saturating_sub(screen.y);
    if suggestions.is_empty() || room < 3 || input_area.width == 0 {
        return;
    }
    let max_items = room.saturating_sub(2).max(1) as usize;
    let shown = suggestions.into_iter().take(max_items).collect::<Vec<_>>();
    let overlay_height = (shown.len() as u16).saturating_add(2).min(room);
    let y = input_area.y.saturating_sub(overlay_height);
    let overlay = Rect::new(input_area.x, y, input_area.width, overlay_height);

    let mut lines = Vec::with_capacity(shown.len());
    for (idx, item) in shown.iter().enumerate() {
        let style = if idx == 0 {
            Style::default().fg(theme.active_fg)
        } else {
            Style::default().fg(theme.text_fg)
        };
        lines.push(Line::from(vec![
            Span::styled(item.command.to_string(), style),
            Span::raw(" "),
            Span::styled(
                item.description.to_string(),
                Style::default().fg(theme.muted_fg),
            ),
        ]));
    }

    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(theme.input_bg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.input_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        overlay,
    );
}

fn render_modal(frame: &mut Frame, modal: &Modal, theme: &Theme) {
    let (title, body, accent) = match modal {
        Modal::Alert(message) => ("Notice", message.as_str(), theme.warning_fg),
        Modal::ManualCopy { title, text } => (title.as_str(), text.as_str(), theme.active_fg),
    };
    let screen = frame.area();
    let width = screen.width.saturating_sub(4).clamp(20, 70).min(screen.width);
    let inner_width = width.saturating_sub(TEXT_PADDING * 2).max(1);
    let mut lines = vec![
        Line::styled(
            title.to_string(),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ),
        Line::default(),
    ];
    lines.extend(body.lines().map(|line| Line::raw(line.to_string())));
    lines.push(Line::default());
    lines.push(Line::styled(
        "Esc to dismiss",
        Style::default().fg(theme.muted_fg),
    ));
    let height = wrapped_height(&lines, inner_width)
        .saturating_add(TEXT_PADDING * 2)
        .min(screen.height);
    let x = screen.x + screen.width.saturating_sub(width) / 2;
    let y = screen.y + screen.height.saturating_sub(height) / 2;
    let overlay = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(theme.status_bg).fg(theme.text_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.status_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        overlay,
    );
}

fn input_box_metrics(input_text_lines: u16, cursor_line: u16, max_input_height: u16) -> (u16, u16) {
    let capped_text_lines = input_text_lines.clamp(1, MAX_INPUT_TEXT_LINES);
    let desired_height = capped_text_lines.saturating_add(TEXT_PADDING * 2);
    let input_height = desired_height.clamp(1, max_input_height.max(1));
    let visible_text_lines = input_height.saturating_sub(TEXT_PADDING * 2).max(1);
    let max_scroll = input_text_lines.saturating_sub(visible_text_lines);
    let middle_line = visible_text_lines / 2;
    let input_scroll = cursor_line.saturating_sub(middle_line).min(max_scroll);
    (input_height, input_scroll)
}

fn title_bar_bg(base: Color, active: bool) -> Color {
    if active {
        return ACTIVE_TITLE_BG;
    }
    match base {
        Color::Rgb(r, g, b) => {
            let delta = -12;
            Color::Rgb(
                adjust_channel(r, delta),
                adjust_channel(g, delta),
                adjust_channel(b, delta),
            )
        }
        _ => base,
    }
}

fn point_in_rect(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn adjust_channel(channel: u8, delta: i16) -> u8 {
    let value = channel as i16 + delta;
    value.clamp(0, 255) as u8
}

#[cfg(test)]
#[path = "../tests/unit/ui_tests.rs"]
mod tests;
