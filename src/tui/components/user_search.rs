//! # User Search Overlay
//!
//! "New conversation" dialog: type part of a username, Enter searches,
//! arrows pick a result, Enter again opens (or creates) the conversation.
//!
//! Follows the persistent state + transient wrapper pattern: the state is
//! `core::conversations::UserSearch`, `UserSearchDialog` borrows it per frame.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Clear, List, ListItem, ListState, Padding, Paragraph};

use crate::core::conversations::UserSearch;
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEvent {
    QueryChanged,
    Submit,
    Dismiss,
}

impl EventHandler for UserSearch {
    type Event = SearchEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar('\n') => None,
            TuiEvent::InputChar(c) => {
                self.query.push(*c);
                Some(SearchEvent::QueryChanged)
            }
            TuiEvent::Paste(text) => {
                self.query.push_str(text.lines().next().unwrap_or_default());
                Some(SearchEvent::QueryChanged)
            }
            TuiEvent::Backspace => self.query.pop().map(|_| SearchEvent::QueryChanged),
            TuiEvent::CursorUp => {
                self.move_cursor(-1);
                None
            }
            TuiEvent::CursorDown => {
                self.move_cursor(1);
                None
            }
            TuiEvent::Submit => Some(SearchEvent::Submit),
            TuiEvent::Escape | TuiEvent::Ctrl('n') => Some(SearchEvent::Dismiss),
            _ => None,
        }
    }
}

pub struct UserSearchDialog<'a> {
    search: &'a UserSearch,
}

impl<'a> UserSearchDialog<'a> {
    pub fn new(search: &'a UserSearch) -> Self {
        Self { search }
    }

    fn status_line(&self) -> Line<'static> {
        let dim = Style::default().fg(Color::DarkGray);
        if self.search.creating().is_some() {
            Line::styled("Opening conversation…", dim)
        } else if self.search.is_loading() {
            Line::styled("Searching…", dim)
        } else if self.search.results().is_empty() {
            Line::styled("Enter searches by username. Esc closes.", dim)
        } else {
            Line::styled("↑/↓ pick a user, Enter starts chatting.", dim)
        }
    }
}

impl Component for UserSearchDialog<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Clear, area);

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" New conversation ")
            .padding(Padding::horizontal(1));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [query_area, status_area, results_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .areas(inner);

        let query = Line::from(vec![
            Span::styled("Search: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(self.search.query.clone()),
        ]);
        frame.render_widget(Paragraph::new(query), query_area);
        frame.render_widget(Paragraph::new(self.status_line()), status_area);

        let items: Vec<ListItem> = self
            .search
            .results()
            .iter()
            .map(|profile| {
                let mut spans = vec![
                    Span::styled(
                        format!("[{}] ", profile.initial()),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::raw(profile.display_name().to_string()),
                    Span::styled(
                        format!("  @{}", profile.username),
                        Style::default().fg(Color::DarkGray),
                    ),
                ];
                if let Some(status) = profile.status {
                    spans.push(Span::styled(
                        format!("  {}", status.label()),
                        Style::default().fg(Color::Green),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items).highlight_style(
            Style::default()
                .add_modifier(Modifier::REVERSED)
                .add_modifier(Modifier::BOLD),
        );
        let mut state = ListState::default();
        if !self.search.results().is_empty() {
            state.select(Some(self.search.cursor));
        }
        frame.render_stateful_widget(list, results_area, &mut state);

        let cursor_x = query_area.x + 8 + self.search.query.chars().count() as u16;
        frame.set_cursor_position((
            cursor_x.min(query_area.right().saturating_sub(1)),
            query_area.y,
        ));
    }
}
