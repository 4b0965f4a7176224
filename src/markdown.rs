use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

const BLOCKED_SCHEMES: [&str; 4] = ["javascript:", "vbscript:", "data:", "file:"];
const RULE_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

/// Sanitized HTML plus the raw text of every code block, in copy-index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedMarkdown {
    pub html: String,
    pub code_blocks: Vec<CodeBlock>,
}

struct HighlightAssets {
    syntax_set: SyntaxSet,
    theme: Theme,
}

fn highlight_assets() -> &'static HighlightAssets {
    static ASSETS: OnceLock<HighlightAssets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let themes = ThemeSet::load_defaults();
        let theme = themes
            .themes
            .get("base16-ocean.dark")
            .or_else(|| themes.themes.values().next())
            .cloned()
            .unwrap_or_default();
        HighlightAssets { syntax_set, theme }
    })
}

fn find_syntax<'a>(assets: &'a HighlightAssets, language: &str) -> Option<&'a SyntaxReference> {
    if language.is_empty() {
        return None;
    }
    assets
        .syntax_set
        .find_syntax_by_token(language)
        .or_else(|| assets.syntax_set.find_syntax_by_extension(language))
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

pub fn render_markdown(markdown: &str) -> RenderedMarkdown {
    render_markdown_from(markdown, 0)
}

/// Renders with copy indices starting at `first_index`, so several fragments of one report can
/// share a single index space.
pub fn render_markdown_from(markdown: &str, first_index: usize) -> RenderedMarkdown {
    let mut events: Vec<Event<'_>> = Vec::new();
    let mut code_blocks = Vec::new();
    let mut open_block: Option<(String, String)> = None;

    for event in Parser::new_ext(markdown, markdown_options()) {
        if open_block.is_some() {
            match event {
                Event::Text(text) => {
                    if let Some((_, code)) = open_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((language, code)) = open_block.take() {
                        let index = first_index + code_blocks.len();
                        events.push(Event::Html(CowStr::from(code_block_html(
                            index, &language, &code,
                        ))));
                        code_blocks.push(CodeBlock { language, code });
                    }
                }
                _ => {}
            }
            continue;
        }
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                open_block = Some((block_language(&kind), String::new()));
            }
            other => events.push(sanitize(other)),
        }
    }

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    RenderedMarkdown {
        html: out,
        code_blocks,
    }
}

// Raw HTML from the source is shown as text and script-capable URLs are neutralized.
fn sanitize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if BLOCKED_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
    {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

fn block_language(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => info
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.'))
            .collect(),
        CodeBlockKind::Indented => String::new(),
    }
}

fn code_block_html(index: usize, language: &str, code: &str) -> String {
    let class = if language.is_empty() {
        String::new()
    } else {
        format!(" class=\"language-{language}\"")
    };
    format!(
        "<div class=\"code-block\"><button class=\"copy-btn\" data-code-index=\"{index}\">Copy</button><pre><code{class}>{}</code></pre></div>\n",
        highlight_html(code, language)
    )
}

fn highlight_html(code: &str, language: &str) -> String {
    let assets = highlight_assets();
    let Some(syntax) = find_syntax(assets, language) else {
        return escape_html(code);
    };
    let mut highlighter = HighlightLines::new(syntax, &assets.theme);
    let mut out = String::with_capacity(code.len() * 2);
    for line in LinesWithEndings::from(code) {
        let rendered = highlighter
            .highlight_line(line, &assets.syntax_set)
            .ok()
            .and_then(|ranges| styled_line_to_highlighted_html(&ranges[..], IncludeBackground::No).ok());
        match rendered {
            Some(html) => out.push_str(&html),
            None => out.push_str(&escape_html(line)),
        }
    }
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Text content of the rendered markdown, blocks separated by blank lines.
pub fn plain_text(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new_ext(markdown, markdown_options()) {
        match event {
            Event::Text(text) | Event::Code(text) | Event::Html(text) | Event::InlineHtml(text) => {
                out.push_str(&text)
            }
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Item | TagEnd::TableRow | TagEnd::TableHead) => end_line(&mut out),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::CodeBlock
                | TagEnd::List(_)
                | TagEnd::BlockQuote(_)
                | TagEnd::Table,
            )
            | Event::Rule => {
                end_line(&mut out);
                if !out.is_empty() && !out.ends_with("\n\n") {
                    out.push('\n');
                }
            }
            Event::End(TagEnd::TableCell) => out.push('\t'),
            _ => {}
        }
    }
    out.trim_end().to_string()
}

fn end_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

pub fn to_lines(markdown: &str) -> Vec<Line<'static>> {
    to_lines_from(markdown, 0)
}

/// Terminal rendering; every code block is headed by its copy index.
pub fn to_lines_from(markdown: &str, first_index: usize) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::new(first_index);
    for event in Parser::new_ext(markdown, markdown_options()) {
        builder.push(event);
    }
    builder.finish()
}

struct LineBuilder {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    code: Option<(String, String)>,
    next_code_index: usize,
}

impl LineBuilder {
    fn new(first_index: usize) -> Self {
        Self {
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            code: None,
            next_code_index: first_index,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, style| acc.patch(*style))
    }

    fn text(&mut self, text: &str) {
        let style = self.style();
        self.spans.push(Span::styled(text.to_string(), style));
    }

    fn push(&mut self, event: Event<'_>) {
        if self.code.is_some() {
            match event {
                Event::Text(text) => {
                    if let Some((_, code)) = self.code.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => self.close_code_block(),
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => self.text(&text),
            Event::Code(code) => {
                let style = self.style().fg(Color::Yellow);
                self.spans.push(Span::styled(code.to_string(), style));
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::styled(
                    "─".repeat(RULE_WIDTH),
                    Style::default().fg(Color::DarkGray),
                ));
                self.blank();
            }
            Event::TaskListMarker(done) => self.text(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                let mut style = Style::default().add_modifier(Modifier::BOLD);
                if matches!(level, HeadingLevel::H1 | HeadingLevel::H2) {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                self.styles.push(style);
            }
            Tag::Strong => self.styles.push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Emphasis => self
                .styles
                .push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strikethrough => self
                .styles
                .push(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => self.styles.push(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::UNDERLINED),
            ),
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.spans.push(Span::raw(format!("{indent}{marker}")));
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                self.code = Some((block_language(&kind), String::new()));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.flush();
                self.styles.pop();
                self.blank();
            }
            TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough | TagEnd::Link => {
                self.styles.pop();
            }
            TagEnd::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item | TagEnd::TableRow | TagEnd::TableHead => self.flush(),
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            TagEnd::TableCell => self.text(" │ "),
            TagEnd::Table => self.blank(),
            _ => {}
        }
    }

    fn close_code_block(&mut self) {
        let Some((language, code)) = self.code.take() else {
            return;
        };
        let index = self.next_code_index;
        self.next_code_index += 1;
        let label = if language.is_empty() {
            format!("┌ [copy {index}]")
        } else {
            format!("┌ [copy {index}] {language}")
        };
        self.lines
            .push(Line::styled(label, Style::default().fg(Color::DarkGray)));
        for mut highlighted in highlight_code_lines(&code, &language) {
            highlighted.spans.insert(
                0,
                Span::styled("│ ", Style::default().fg(Color::DarkGray)),
            );
            self.lines.push(highlighted);
        }
        self.blank();
    }

    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = std::mem::take(&mut self.spans);
        if self.quote_depth > 0 {
            spans.insert(
                0,
                Span::styled("▌ ".repeat(self.quote_depth), Style::default().fg(Color::DarkGray)),
            );
        }
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.close_code_block();
        self.flush();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Highlights a whole block with one highlighter so comments and strings carry across lines.
fn highlight_code_lines(code: &str, language: &str) -> Vec<Line<'static>> {
    let assets = highlight_assets();
    let mut highlighter =
        find_syntax(assets, language).map(|syntax| HighlightLines::new(syntax, &assets.theme));
    LinesWithEndings::from(code)
        .map(|line| {
            let spans: Vec<Span<'static>> = highlighter
                .as_mut()
                .and_then(|highlighter| highlighter.highlight_line(line, &assets.syntax_set).ok())
                .map(|ranges| {
                    ranges
                        .into_iter()
                        .filter_map(|(style, text)| {
                            let text = text.trim_end_matches(['\n', '\r']);
                            (!text.is_empty())
                                .then(|| Span::styled(text.to_string(), span_style(style)))
                        })
                        .collect()
                })
                .unwrap_or_default();
            if spans.is_empty() {
                Line::styled(
                    line.trim_end_matches(['\n', '\r']).to_string(),
                    Style::default().fg(Color::Gray),
                )
            } else {
                Line::from(spans)
            }
        })
        .collect()
}

fn span_style(style: syntect::highlighting::Style) -> Style {
    let fg = style.foreground;
    let mut span_style = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if style.font_style.contains(FontStyle::BOLD) {
        span_style = span_style.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        span_style = span_style.add_modifier(Modifier::ITALIC);
    }
    span_style
}

#[cfg(test)]
#[path = "../tests/unit/markdown_tests.rs"]
mod tests;
