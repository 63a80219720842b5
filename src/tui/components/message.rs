use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};

use crate::backend::Message;
use crate::tui::component::Component;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Borders (1 left + 1 right) plus padding.
const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Top + bottom borders.
pub const VERTICAL_OVERHEAD: u16 = 2;
/// Share of the thread width a bubble may use.
const BUBBLE_WIDTH_PERCENT: u16 = 80;

/// One chat message drawn as a bordered bubble.
///
/// Own messages sit on the right in cyan, the other participant's on the
/// left in green. The top border carries the author and send time, the
/// bottom border an "(edited)" marker once the message was changed.
///
/// `MessageBubble` is transient and holds no state; `ThreadView` decides
/// which bubble is selected or being edited.
#[derive(Clone, Copy)]
pub struct MessageBubble<'a> {
    pub message: &'a Message,
    pub author: &'a str,
    pub own: bool,
    pub is_selected: bool,
    /// The composer is currently editing this message
    pub is_editing: bool,
}

impl<'a> MessageBubble<'a> {
    pub fn new(message: &'a Message, author: &'a str, own: bool) -> Self {
        Self {
            message,
            author,
            own,
            is_selected: false,
            is_editing: false,
        }
    }

    /// Width of the bubble inside a thread of `width` columns.
    pub fn bubble_width(width: u16) -> u16 {
        (u32::from(width) * u32::from(BUBBLE_WIDTH_PERCENT) / 100) as u16
    }

    /// Rows the bubble needs, predicted with the same wrapping rules
    /// `Paragraph` applies so the scroll view can be laid out up front.
    pub fn calculate_height(message: &Message, width: u16) -> u16 {
        let content_width = Self::bubble_width(width).saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            return 1;
        }
        let content = message.content.trim();
        if content.is_empty() {
            return VERTICAL_OVERHEAD;
        }
        let options = textwrap::Options::new(content_width as usize)
            .break_words(true)
            .word_separator(textwrap::WordSeparator::AsciiSpace);
        (textwrap::wrap(content, options).len() as u16).max(1) + VERTICAL_OVERHEAD
    }

    fn style(&self) -> Style {
        if self.own {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Green)
        }
    }
}

impl Widget for MessageBubble<'_> {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let width = Self::bubble_width(area.width).min(area.width);
        let x = if self.own {
            area.x + area.width - width
        } else {
            area.x
        };
        let bubble = Rect::new(x, area.y, width, area.height);

        let style = self.style();
        let border_style = if self.is_editing {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if self.is_selected {
            style.add_modifier(Modifier::BOLD)
        } else {
            style.add_modifier(Modifier::DIM)
        };

        let sent = self
            .message
            .created_at
            .with_timezone(&Local)
            .format("%H:%M");
        let header = format!(" {} · {} ", self.author, sent);
        let mut block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_style(border_style)
            .padding(Padding::horizontal(CONTENT_PAD_H));
        block = if self.own {
            block.title(Line::from(header).alignment(Alignment::Right))
        } else {
            block.title(header)
        };
        if self.message.is_edited {
            block = block.title_bottom(Line::from(" (edited) ").alignment(Alignment::Right));
        }

        let inner = block.inner(bubble);
        block.render(bubble, buf);

        let mut paragraph_style = Style::default();
        if self.is_selected {
            paragraph_style = paragraph_style.bg(Color::DarkGray);
        }
        Paragraph::new(self.message.content.trim())
            .style(paragraph_style)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }
}

impl Component for MessageBubble<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(*self, area);
    }
}
