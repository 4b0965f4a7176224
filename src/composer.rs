use crate::attachment::AttachedFile;
use crate::config::ClientVariant;
use crate::protocol::{DEFAULT_SETTING_VALUE, OutboundMessage, QuerySettings};
use crate::text_layout::layout_input;

/// Parses a numeric setting the way a browser number field is read: the leading integer is
/// used, anything missing, unparsable or non-positive falls back to the default.
pub fn parse_setting(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix(['+', '-']) {
        Some(rest) => (&trimmed[..1], rest),
        None => ("", trimmed),
    };
    let digits: String = digits.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() || sign == "-" {
        return DEFAULT_SETTING_VALUE;
    }
    match digits.parse::<u32>() {
        Ok(0) | Err(_) => DEFAULT_SETTING_VALUE,
        Ok(value) => value,
    }
}

/// One submit, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub question: String,
    pub attachment: Option<AttachedFile>,
    pub settings: QuerySettings,
}

impl SessionRequest {
    pub fn outbound_content(&self, variant: ClientVariant) -> String {
        let Some(file) = &self.attachment else {
            return self.question.clone();
        };
        match variant {
            ClientVariant::Report => {
                format!("{}\n\n[File: {}]\n{}", self.question, file.name, file.content)
            }
            ClientVariant::Transcript => format!(
                "Here is the content of the uploaded file:\n\n```\n{}\n```\n\n{}",
                file.content, self.question
            ),
        }
    }

    pub fn to_message(&self, variant: ClientVariant) -> OutboundMessage {
        OutboundMessage::Query {
            content: self.outbound_content(variant),
            settings: self.settings,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Composer {
    input: String,
    cursor: usize,
    cursor_goal_col: Option<u16>,
    num_searches: String,
    num_rewordings: String,
    attachment: Option<AttachedFile>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::with_settings(QuerySettings::default())
    }
}

impl Composer {
    pub fn with_settings(settings: QuerySettings) -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            cursor_goal_col: None,
            num_searches: settings.num_searches.to_string(),
            num_rewordings: settings.num_rewordings.to_string(),
            attachment: None,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn input_char(&mut self, c: char) {
        let byte_idx = char_to_byte_idx(&self.input, self.cursor);
        self.input.insert(byte_idx, c);
        self.cursor += 1;
        self.cursor_goal_col = None;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = char_to_byte_idx(&self.input, self.cursor - 1);
        let end = char_to_byte_idx(&self.input, self.cursor);
        self.input.drain(start..end);
        self.cursor -= 1;
        self.cursor_goal_col = None;
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor_goal_col = None;
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
        self.cursor_goal_col = None;
    }

    /// Returns false when the cursor is already on the first line.
    pub fn move_cursor_up(&mut self, width: u16) -> bool {
        let layout = layout_input(&self.input, width);
        let (line, col) = layout.cursor_at(self.cursor);
        if line == 0 {
            return false;
        }
        let goal = *self.cursor_goal_col.get_or_insert(col);
        self.cursor = layout.index_near(line - 1, goal);
        true
    }

    /// Returns false when the cursor is already on the last line.
    pub fn move_cursor_down(&mut self, width: u16) -> bool {
        let layout = layout_input(&self.input, width);
        let (line, col) = layout.cursor_at(self.cursor);
        if line >= layout.last_line() {
            return false;
        }
        let goal = *self.cursor_goal_col.get_or_insert(col);
        self.cursor = layout.index_near(line + 1, goal);
        true
    }

    pub fn cursor_line_col(&self, width: u16) -> (u16, u16) {
        layout_input(&self.input, width).cursor_at(self.cursor)
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
        self.cursor = self.input.chars().count();
        self.cursor_goal_col = None;
    }

    pub fn clear_input(&mut self) {
        self.set_input(String::new());
    }

    pub fn set_num_searches(&mut self, raw: impl Into<String>) {
        self.num_searches = raw.into();
    }

    pub fn set_num_rewordings(&mut self, raw: impl Into<String>) {
        self.num_rewordings = raw.into();
    }

    pub fn settings(&self) -> QuerySettings {
        QuerySettings {
            num_searches: parse_setting(&self.num_searches),
            num_rewordings: parse_setting(&self.num_rewordings),
        }
    }

    /// Fills the single slot, handing back whatever it held.
    pub fn attach(&mut self, file: AttachedFile) -> Option<AttachedFile> {
        self.attachment.replace(file)
    }

    pub fn detach(&mut self) -> Option<AttachedFile> {
        self.attachment.take()
    }

    pub fn attachment(&self) -> Option<&AttachedFile> {
        self.attachment.as_ref()
    }

    /// Builds a request from the current input without consuming anything; `None` when the
    /// trimmed text is empty.
    pub fn compose(&self) -> Option<SessionRequest> {
        let question = self.input.trim();
        if question.is_empty() {
            return None;
        }
        Some(SessionRequest {
            question: question.to_string(),
            attachment: self.attachment.clone(),
            settings: self.settings(),
        })
    }

    /// Called once the request has been handed to the channel.
    pub fn mark_sent(&mut self) {
        self.clear_input();
        self.attachment = None;
    }
}

fn char_to_byte_idx(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(s.len())
}

#[cfg(test)]
#[path = "../tests/unit/composer_tests.rs"]
mod tests;
