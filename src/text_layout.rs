use ratatui::text::Line;

/// Composer text laid out for a fixed width, with the (line, column) of every cursor stop.
#[derive(Debug, Clone)]
pub struct InputLayout {
    pub rendered: String,
    pub cursor_stops: Vec<(u16, u16)>,
    pub line_count: u16,
}

impl InputLayout {
    pub fn cursor_at(&self, char_idx: usize) -> (u16, u16) {
        self.cursor_stops
            .get(char_idx)
            .or_else(|| self.cursor_stops.last())
            .copied()
            .unwrap_or((0, 0))
    }

    pub fn last_line(&self) -> u16 {
        self.line_count.saturating_sub(1)
    }

    /// Cursor index on `line` closest to `goal_col` without passing it.
    pub fn index_near(&self, line: u16, goal_col: u16) -> usize {
        let mut best: Option<(usize, u16)> = None;
        let mut first_on_line = None;
        for (idx, (stop_line, col)) in self.cursor_stops.iter().copied().enumerate() {
            if stop_line != line {
                continue;
            }
            first_on_line.get_or_insert(idx);
            if col <= goal_col && best.is_none_or(|(_, best_col)| col > best_col) {
                best = Some((idx, col));
            }
        }
        best.map(|(idx, _)| idx)
            .or(first_on_line)
            .unwrap_or(self.cursor_stops.len().saturating_sub(1))
    }
}

pub fn layout_input(text: &str, width: u16) -> InputLayout {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut rendered = String::with_capacity(text.len());
    let mut cursor_stops = Vec::with_capacity(chars.len() + 1);
    let (mut line, mut col) = (0u16, 0u16);
    cursor_stops.push((line, col));

    for (idx, ch) in chars.iter().copied().enumerate() {
        if ch == '\n' {
            rendered.push('\n');
            line = line.saturating_add(1);
            col = 0;
            cursor_stops.push((line, col));
            continue;
        }
        if col >= width || word_overflows(&chars, idx, col, width) {
            rendered.push('\n');
            line = line.saturating_add(1);
            col = 0;
        }
        rendered.push(ch);
        col = col.saturating_add(1);
        if col >= width {
            rendered.push('\n');
            line = line.saturating_add(1);
            col = 0;
        }
        cursor_stops.push((line, col));
    }

    let line_count = cursor_stops
        .iter()
        .map(|(l, _)| *l)
        .max()
        .unwrap_or(0)
        .saturating_add(1);
    InputLayout {
        rendered,
        cursor_stops,
        line_count,
    }
}

// A word that fits on a fresh line moves there whole instead of splitting.
fn word_overflows(chars: &[char], idx: usize, col: u16, width: u16) -> bool {
    if col == 0 || chars[idx].is_whitespace() {
        return false;
    }
    if idx > 0 && !chars[idx - 1].is_whitespace() {
        return false;
    }
    let word_len = chars[idx..]
        .iter()
        .take_while(|c| !c.is_whitespace())
        .count() as u16;
    word_len <= width && col.saturating_add(word_len) > width
}

/// Rows a set of styled lines occupies once a `Paragraph` wraps them at `width`.
pub fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}
