//! # Emoji Picker Overlay
//!
//! A small grid above the composer. Arrows move the highlight, Enter
//! inserts the emoji at the end of the draft, Esc closes.
//!
//! Persistent state is `core::emoji::EmojiPicker` (it only holds the
//! cursor); this wrapper is created per frame.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Clear, Paragraph};

use crate::core::emoji::{COLUMNS, Direction, EmojiPicker, PALETTE};
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Columns each cell takes: a wide glyph plus padding.
const CELL_WIDTH: u16 = 4;

/// Events emitted by the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmojiEvent {
    Pick,
    Dismiss,
}

impl EventHandler for EmojiPicker {
    type Event = EmojiEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::CursorUp => self.step(Direction::Up),
            TuiEvent::CursorDown => self.step(Direction::Down),
            TuiEvent::CursorLeft => self.step(Direction::Left),
            TuiEvent::CursorRight => self.step(Direction::Right),
            TuiEvent::Submit => return Some(EmojiEvent::Pick),
            TuiEvent::Escape | TuiEvent::Ctrl('e') => return Some(EmojiEvent::Dismiss),
            _ => {}
        }
        None
    }
}

pub struct EmojiGrid<'a> {
    picker: &'a EmojiPicker,
}

impl<'a> EmojiGrid<'a> {
    pub fn new(picker: &'a EmojiPicker) -> Self {
        Self { picker }
    }

    /// Overlay size: the grid plus borders.
    pub fn size() -> (u16, u16) {
        let rows = PALETTE.len().div_ceil(COLUMNS) as u16;
        (COLUMNS as u16 * CELL_WIDTH + 2, rows + 2)
    }
}

impl Component for EmojiGrid<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = PALETTE
            .chunks(COLUMNS)
            .enumerate()
            .map(|(row, chunk)| {
                let spans: Vec<Span> = chunk
                    .iter()
                    .enumerate()
                    .map(|(col, emoji)| {
                        let index = row * COLUMNS + col;
                        let style = if index == self.picker.cursor() {
                            Style::default()
                                .bg(Color::Cyan)
                                .add_modifier(Modifier::BOLD)
                        } else {
                            Style::default()
                        };
                        Span::styled(format!(" {emoji} "), style)
                    })
                    .collect();
                Line::from(spans)
            })
            .collect();

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Emoji (Enter to insert, Esc to close) ");
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}
