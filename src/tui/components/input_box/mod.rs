//! # InputBox Component
//!
//! The message composer's text field.
//!
//! ## Responsibilities
//!
//! - Capture text input (typing, paste, backspace/delete, cursor movement)
//! - Emit `Submit` on Enter and `Changed` on every edit
//! - Follow external writes to the draft (copilot rewrites, emoji, edit mode)
//!
//! ## State Management
//!
//! The buffer is a local copy of `Composer::text`. Keystrokes change the
//! buffer first and the parent forwards it as `Action::DraftChanged`.
//! Writes from elsewhere bump `Composer::revision`; `sync` notices the new
//! revision, takes the composer's text and moves the cursor to the end.

mod cursor;
mod text_wrap;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Paragraph};

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

use cursor::CursorState;
use text_wrap::{
    MAX_VISIBLE_LINES, VERTICAL_OVERHEAD, inner_width, next_char_boundary, prev_char_boundary,
    wrap_line_count, wrap_options,
};

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Enter pressed. The buffer is left alone: the composer decides
    /// whether the draft is sent and clears it on success.
    Submit,
    /// The buffer changed; carries the new text.
    Changed(String),
}

pub struct InputBox {
    pub buffer: String,
    /// Title shown on the border (Prop)
    pub title: String,
    /// Greyed out while another pane has focus (Prop)
    pub dimmed: bool,
    cursor: CursorState,
    revision: u64,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            title: String::from("Message"),
            dimmed: false,
            cursor: CursorState::new(),
            revision: 0,
        }
    }

    /// Takes the composer's text when it was written from outside.
    /// Returns true if the buffer was replaced.
    pub fn sync(&mut self, text: &str, revision: u64) -> bool {
        if revision == self.revision {
            return false;
        }
        self.revision = revision;
        if self.buffer != text {
            self.buffer = text.to_string();
        }
        self.cursor.move_to_end(&self.buffer);
        true
    }

    /// Required height for the current buffer, clamped to the visible maximum.
    pub fn calculate_height(&self, content_width: u16) -> u16 {
        let lines = wrap_line_count(&self.buffer, inner_width(content_width));
        lines.min(MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    fn visible_text(&self, content_width: u16) -> String {
        if self.cursor.scroll_offset == 0 {
            return self.buffer.clone();
        }
        let width = inner_width(content_width);
        if width == 0 {
            return String::new();
        }
        let lines = textwrap::wrap(&self.buffer, wrap_options(width));
        let start = (self.cursor.scroll_offset as usize).min(lines.len());
        let end = (start + MAX_VISIBLE_LINES as usize).min(lines.len());
        lines[start..end].join("\n")
    }

    fn changed(&self) -> Option<InputEvent> {
        Some(InputEvent::Changed(self.buffer.clone()))
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        self.cursor.update_scroll_offset(&self.buffer, area.width);

        let (text_style, border_style) = if self.dimmed {
            (
                Style::default().fg(Color::DarkGray),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
            )
        } else {
            (Style::default().fg(Color::Green), Style::default())
        };

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(self.title.as_str());
        let input = Paragraph::new(self.visible_text(area.width))
            .block(block)
            .style(text_style);
        frame.render_widget(input, area);

        if !self.dimmed {
            frame.set_cursor_position(self.cursor.screen_pos(&self.buffer, area));
        }
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.insert(self.cursor.pos, *c);
                self.cursor.pos += c.len_utf8();
                self.changed()
            }
            TuiEvent::Paste(text) => {
                self.buffer.insert_str(self.cursor.pos, text);
                self.cursor.pos += text.len();
                self.changed()
            }
            TuiEvent::Backspace if self.cursor.pos > 0 => {
                let prev = prev_char_boundary(&self.buffer, self.cursor.pos);
                self.buffer.drain(prev..self.cursor.pos);
                self.cursor.pos = prev;
                self.changed()
            }
            TuiEvent::Delete if self.cursor.pos < self.buffer.len() => {
                let next = next_char_boundary(&self.buffer, self.cursor.pos);
                self.buffer.drain(self.cursor.pos..next);
                self.changed()
            }
            TuiEvent::CursorLeft => {
                self.cursor.pos = prev_char_boundary(&self.buffer, self.cursor.pos);
                None
            }
            TuiEvent::CursorRight => {
                if self.cursor.pos < self.buffer.len() {
                    self.cursor.pos = next_char_boundary(&self.buffer, self.cursor.pos);
                }
                None
            }
            TuiEvent::CursorHome => {
                self.cursor.pos = self.buffer[..self.cursor.pos]
                    .rfind('\n')
                    .map(|i| i + 1)
                    .unwrap_or(0);
                None
            }
            TuiEvent::CursorEnd => {
                self.cursor.pos = self.buffer[self.cursor.pos..]
                    .find('\n')
                    .map(|i| self.cursor.pos + i)
                    .unwrap_or(self.buffer.len());
                None
            }
            TuiEvent::Submit => Some(InputEvent::Submit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_typing_emits_changes() {
        let mut input = InputBox::new();
        assert_eq!(
            input.handle_event(&TuiEvent::InputChar('a')),
            Some(InputEvent::Changed("a".into()))
        );
        input.handle_event(&TuiEvent::InputChar('b'));
        assert_eq!(
            input.handle_event(&TuiEvent::Backspace),
            Some(InputEvent::Changed("a".into()))
        );
        assert_eq!(input.handle_event(&TuiEvent::CursorLeft), None);
        assert_eq!(input.handle_event(&TuiEvent::Backspace), None);
    }

    #[test]
    fn test_insert_mid_buffer() {
        let mut input = InputBox::new();
        input.handle_event(&TuiEvent::Paste("hllo".into()));
        input.handle_event(&TuiEvent::CursorHome);
        input.handle_event(&TuiEvent::CursorRight);
        input.handle_event(&TuiEvent::InputChar('e'));
        assert_eq!(input.buffer, "hello");
    }

    #[test]
    fn test_submit_keeps_buffer() {
        let mut input = InputBox::new();
        input.handle_event(&TuiEvent::Paste("hello".into()));
        assert_eq!(input.handle_event(&TuiEvent::Submit), Some(InputEvent::Submit));
        assert_eq!(input.buffer, "hello");
    }

    #[test]
    fn test_sync_follows_revision() {
        let mut input = InputBox::new();
        input.handle_event(&TuiEvent::Paste("typed".into()));
        assert!(!input.sync("ignored", 0));
        assert_eq!(input.buffer, "typed");

        assert!(input.sync("rewritten by copilot", 1));
        assert_eq!(input.buffer, "rewritten by copilot");
        input.handle_event(&TuiEvent::InputChar('!'));
        assert_eq!(input.buffer, "rewritten by copilot!");
    }

    #[test]
    fn test_height_grows_then_clamps() {
        let mut input = InputBox::new();
        assert_eq!(input.calculate_height(40), 3);
        input.buffer = "1\n2\n3".into();
        assert_eq!(input.calculate_height(40), 5);
        input.buffer = "1\n2\n3\n4\n5\n6\n7\n8".into();
        assert_eq!(input.calculate_height(40), 7);
    }

    #[test]
    fn test_render_shows_title() {
        let backend = TestBackend::new(40, 3);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut input = InputBox::new();
        input.title = "Editing message".into();

        terminal.draw(|f| input.render(f, f.area())).unwrap();

        let buffer = terminal.backend().buffer();
        let text = buffer.content().iter().map(|c| c.symbol()).collect::<String>();
        assert!(text.contains("Editing message"));
    }
}
