//! # Conversation List Component
//!
//! Left sidebar: one row per conversation, most recent first, with the
//! other participant's initial, name, last-message preview and a relative
//! time label.
//!
//! Transient: created each frame around `&core::conversations::ConversationList`.
//! The highlighted row is the core list's `cursor`, so nothing here needs
//! to persist between frames.

use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, List, ListItem, ListState, Paragraph, Wrap};

use unicode_width::UnicodeWidthStr;

use crate::backend::ConversationSummary;
use crate::core::conversations::{self, ConversationList};
use crate::tui::component::Component;

/// Longest preview shown before it is cut with "...".
const PREVIEW_CHARS: usize = 28;

pub struct ConversationSidebar<'a> {
    pub list: &'a ConversationList,
    pub focused: bool,
    pub now: DateTime<Utc>,
}

impl<'a> ConversationSidebar<'a> {
    pub fn new(list: &'a ConversationList, focused: bool, now: DateTime<Utc>) -> Self {
        Self { list, focused, now }
    }

    fn row(&self, summary: &ConversationSummary, width: u16) -> ListItem<'static> {
        let active = self.list.selected() == Some(summary.id);
        let initial = summary
            .other_user
            .as_ref()
            .map(|p| p.initial())
            .unwrap_or('?');
        let time = conversations::time_label(summary.recency(), self.now);

        let name_style = if active {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let name = summary.display_name().to_string();
        let used = 4 + name.width() + time.width();
        let gap = (width as usize).saturating_sub(used).max(1);

        let mut header = vec![
            Span::styled(format!("[{initial}] "), Style::default().fg(Color::Yellow)),
            Span::styled(name, name_style),
            Span::raw(" ".repeat(gap)),
            Span::styled(time, Style::default().fg(Color::DarkGray)),
        ];
        if self.list.is_deleting(summary.id) {
            header.push(Span::styled(
                " deleting…",
                Style::default().fg(Color::Red),
            ));
        }

        let preview = Line::from(Span::styled(
            format!("    {}", truncate(summary.preview(), PREVIEW_CHARS)),
            Style::default().fg(Color::Gray),
        ));
        ListItem::new(vec![Line::from(header), preview])
    }
}

/// Cuts `text` to `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let kept: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

impl Component for ConversationSidebar<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let title = if self.list.is_loading() {
            "Conversations (loading…)"
        } else {
            "Conversations"
        };
        let border_style = if self.focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(title);

        if self.list.items().is_empty() {
            let hint = if self.list.is_loading() {
                "Loading conversations…"
            } else {
                "No conversations yet.\nPress Ctrl+N to start one."
            };
            let paragraph = Paragraph::new(hint)
                .block(block)
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        let inner_width = area.width.saturating_sub(2);
        let items: Vec<ListItem> = self
            .list
            .items()
            .iter()
            .map(|summary| self.row(summary, inner_width))
            .collect();

        let highlight = if self.focused {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let list = List::new(items).block(block).highlight_style(highlight);
        let mut state = ListState::default().with_selected(Some(self.list.cursor));
        frame.render_stateful_widget(list, area, &mut state);
    }
}
