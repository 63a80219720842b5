//! # Profile Screen
//!
//! Shows the signed-in user's profile; Enter switches to an edit form for
//! username and full name.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph};

use crate::core::profile::{ProfileField, ProfileForm};
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::centered_rect;
use crate::tui::event::TuiEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileEvent {
    Save,
    Back,
}

impl EventHandler for ProfileForm {
    type Event = ProfileEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        if !self.editing {
            match event {
                TuiEvent::Submit | TuiEvent::InputChar('e') => {
                    self.begin_edit();
                }
                TuiEvent::Escape => return Some(ProfileEvent::Back),
                _ => {}
            }
            return None;
        }
        match event {
            TuiEvent::Submit => return Some(ProfileEvent::Save),
            TuiEvent::Escape => self.cancel(),
            TuiEvent::NextFocus
            | TuiEvent::PrevFocus
            | TuiEvent::CursorUp
            | TuiEvent::CursorDown => {
                self.toggle_focus()
            }
            TuiEvent::InputChar('\n') => {}
            TuiEvent::InputChar(c) => self.focused_mut().push(*c),
            TuiEvent::Paste(text) => self.focused_mut().push_str(text.trim()),
            TuiEvent::Backspace => {
                self.focused_mut().pop();
            }
            _ => {}
        }
        None
    }
}

pub struct ProfileScreen<'a> {
    form: &'a ProfileForm,
    email: Option<&'a str>,
}

impl<'a> ProfileScreen<'a> {
    pub fn new(form: &'a ProfileForm, email: Option<&'a str>) -> Self {
        Self { form, email }
    }

    fn row(label: &str, value: String, style: Style) -> Line<'static> {
        Line::from(vec![
            Span::styled(format!("{label:<12}"), style),
            Span::raw(value),
        ])
    }
}

impl Component for ProfileScreen<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let overlay = centered_rect(60, 100, area);
        let [_, card, _] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(12),
            Constraint::Min(0),
        ])
        .areas(overlay);

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Profile ")
            .padding(Padding::new(2, 2, 1, 1));
        let inner = block.inner(card);
        frame.render_widget(block, card);

        let Some(profile) = self.form.profile() else {
            frame.render_widget(
                Paragraph::new("Loading profile…").style(Style::default().fg(Color::DarkGray)),
                inner,
            );
            return;
        };

        let label = Style::default().fg(Color::Gray);
        let focused = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        let dim = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", profile.initial()),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    profile.display_name().to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::raw(""),
            Self::row("Email", self.email.unwrap_or("-").to_string(), label),
        ];

        if self.form.editing {
            let style_for = |field| if self.form.focus == field { focused } else { label };
            lines.push(Self::row(
                "Username",
                self.form.username.clone(),
                style_for(ProfileField::Username),
            ));
            lines.push(Self::row(
                "Full name",
                self.form.full_name.clone(),
                style_for(ProfileField::FullName),
            ));
            lines.push(Line::raw(""));
            let hint = if self.form.is_saving() {
                Line::styled("Saving…", Style::default().fg(Color::Yellow))
            } else {
                Line::styled("Enter save · Tab next field · Esc cancel", dim)
            };
            lines.push(hint);

            let row = match self.form.focus {
                ProfileField::Username => 3,
                ProfileField::FullName => 4,
            };
            let value_len = match self.form.focus {
                ProfileField::Username => self.form.username.chars().count(),
                ProfileField::FullName => self.form.full_name.chars().count(),
            };
            let x = (inner.x + 12 + value_len as u16).min(inner.right().saturating_sub(1));
            frame.set_cursor_position((x, inner.y + row));
        } else {
            lines.push(Self::row("Username", profile.username.clone(), label));
            lines.push(Self::row(
                "Full name",
                profile.full_name.clone().unwrap_or_else(|| "-".into()),
                label,
            ));
            if let Some(status) = profile.status {
                lines.push(Self::row("Status", status.label().to_string(), label));
            }
            lines.push(Line::raw(""));
            lines.push(Line::styled("Enter edit · Esc back to chat", dim));
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }
}
