//! Cursor position and internal scroll for the InputBox.
//!
//! The buffer is owned by `InputBox`; every method takes it as `&str`.

use unicode_width::UnicodeWidthStr;

use super::text_wrap::{
    BORDER_OFFSET, MAX_VISIBLE_LINES, inner_width, wrap_line_count, wrap_options,
};
use ratatui::layout::Rect;

pub(super) struct CursorState {
    /// Byte offset in the buffer (0..=buffer.len())
    pub pos: usize,
    /// First visible wrapped line
    pub scroll_offset: u16,
}

impl CursorState {
    pub fn new() -> Self {
        Self {
            pos: 0,
            scroll_offset: 0,
        }
    }

    /// Puts the cursor after the last character.
    pub fn move_to_end(&mut self, buffer: &str) {
        self.pos = buffer.len();
    }

    /// Wrapped line (0-based) the cursor sits on.
    pub fn line(&self, buffer: &str, content_width: u16) -> u16 {
        let width = inner_width(content_width);
        if width == 0 {
            return 0;
        }
        let before = &buffer[..self.pos];
        let lines = textwrap::wrap(before, wrap_options(width));
        let mut line = lines.len().saturating_sub(1) as u16;
        if self.pos > 0
            && buffer.as_bytes()[self.pos - 1] == b'\n'
            && !lines.last().is_some_and(|l| l.is_empty())
        {
            line += 1;
        }
        line
    }

    /// Keeps the cursor line inside the visible window.
    pub fn update_scroll_offset(&mut self, buffer: &str, content_width: u16) {
        let total = wrap_line_count(buffer, inner_width(content_width));
        if total <= MAX_VISIBLE_LINES {
            self.scroll_offset = 0;
            return;
        }
        let line = self.line(buffer, content_width);
        if line < self.scroll_offset {
            self.scroll_offset = line;
        } else if line >= self.scroll_offset + MAX_VISIBLE_LINES {
            self.scroll_offset = line.saturating_sub(MAX_VISIBLE_LINES - 1);
        }
    }

    /// Screen (column, row) of the cursor inside `area`.
    pub fn screen_pos(&self, buffer: &str, area: Rect) -> (u16, u16) {
        let width = inner_width(area.width);
        if width == 0 {
            return (area.x + BORDER_OFFSET, area.y + BORDER_OFFSET);
        }

        let line = self.line(buffer, area.width);
        let before = &buffer[..self.pos];
        // Measure the current logical line in cells (emoji are two wide):
        // textwrap trims trailing spaces, so wrapped segment lengths are not
        // enough.
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let logical = &before[line_start..];
        let segments = textwrap::wrap(logical, wrap_options(width));
        let column = match segments.split_last() {
            None => 0,
            Some((_, earlier)) => {
                let consumed: usize = earlier.iter().map(|s| s.width()).sum();
                logical.width().saturating_sub(consumed) as u16
            }
        };

        let visible_line = line.saturating_sub(self.scroll_offset);
        (
            area.x + BORDER_OFFSET + column.min(width),
            area.y + BORDER_OFFSET + visible_line,
        )
    }
}
