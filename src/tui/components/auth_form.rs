//! # Auth Form Component
//!
//! Sign-in and sign-up screen. The field values live in
//! `core::auth::AuthForm`; typing edits them in place and Enter asks the
//! reducer to submit.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph};

use crate::core::auth::{AuthField, AuthForm, AuthMode};
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::centered_rect;
use crate::tui::event::TuiEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    Submit,
    /// Switch between sign-in and sign-up.
    SwitchMode,
    Back,
}

impl EventHandler for AuthForm {
    type Event = AuthEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::Submit => return Some(AuthEvent::Submit),
            TuiEvent::Ctrl('n') => return Some(AuthEvent::SwitchMode),
            TuiEvent::Escape => return Some(AuthEvent::Back),
            TuiEvent::NextFocus | TuiEvent::CursorDown => self.cycle_focus(true),
            TuiEvent::PrevFocus | TuiEvent::CursorUp => self.cycle_focus(false),
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

pub struct AuthScreen<'a> {
    form: &'a AuthForm,
}

impl<'a> AuthScreen<'a> {
    pub fn new(form: &'a AuthForm) -> Self {
        Self { form }
    }

    fn fields(&self) -> Vec<(AuthField, &'static str, String)> {
        let mut fields = vec![
            (AuthField::Email, "Email", self.form.email.clone()),
            (
                AuthField::Password,
                "Password",
                "•".repeat(self.form.password.chars().count()),
            ),
        ];
        if self.form.mode == AuthMode::SignUp {
            fields.push((AuthField::Username, "Username", self.form.username.clone()));
            fields.push((AuthField::FullName, "Full name", self.form.full_name.clone()));
        }
        fields
    }
}

impl Component for AuthScreen<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let (title, switch_hint) = match self.form.mode {
            AuthMode::SignIn => (" Sign in ", "No account yet? Ctrl+N to create one."),
            AuthMode::SignUp => (" Create account ", "Already registered? Ctrl+N to sign in."),
        };
        let fields = self.fields();
        let height = fields.len() as u16 * 2 + 6;
        let overlay = centered_rect(60, 100, area);
        let [_, card, _] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .areas(overlay);

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title)
            .padding(Padding::new(2, 2, 1, 1));
        let inner = block.inner(card);
        frame.render_widget(block, card);

        let mut lines = Vec::new();
        let mut cursor = None;
        for (field, label, value) in &fields {
            let focused = *field == self.form.focus;
            let label_style = if focused {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            if focused {
                let x = inner.x + 12 + value.chars().count() as u16;
                cursor = Some((
                    x.min(inner.right().saturating_sub(1)),
                    inner.y + lines.len() as u16,
                ));
            }
            lines.push(Line::from(vec![
                Span::styled(format!("{label:<12}"), label_style),
                Span::raw(value.clone()),
            ]));
            lines.push(Line::raw(""));
        }

        let status = if self.form.is_submitting() {
            Line::styled("Please wait…", Style::default().fg(Color::Yellow))
        } else {
            Line::styled(
                "Enter submit · Tab next · Esc back",
                Style::default().fg(Color::DarkGray),
            )
        };
        lines.push(status);
        lines.push(Line::styled(switch_hint, Style::default().fg(Color::DarkGray)));

        frame.render_widget(Paragraph::new(lines), inner);
        if let Some(position) = cursor {
            frame.set_cursor_position(position);
        }
    }
}
