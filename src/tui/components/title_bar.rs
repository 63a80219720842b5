//! # TitleBar Component
//!
//! Top status line: screen title, the welcome line for the signed-in user,
//! and the newest toast.
//!
//! Stateless: everything arrives as props, so the same struct renders
//! on every screen.
//!
//! ```text
//! Copilot Chat · Chat | Welcome, Ann! | ✓ Message sent
//! ```

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::core::toast::{Notice, ToastLevel};
use crate::tui::component::Component;

pub struct TitleBar {
    pub screen: String,
    /// "Welcome, <name>!" once the profile is loaded
    pub welcome: Option<String>,
    /// Newest live toast, if any
    pub toast: Option<Notice>,
}

impl TitleBar {
    pub fn new(screen: impl Into<String>, welcome: Option<String>, toast: Option<Notice>) -> Self {
        Self {
            screen: screen.into(),
            welcome,
            toast,
        }
    }
}

fn toast_span(notice: &Notice) -> Span<'static> {
    let (marker, color) = match notice.level {
        ToastLevel::Info => ("•", Color::Cyan),
        ToastLevel::Success => ("✓", Color::Green),
        ToastLevel::Error => ("✗", Color::Red),
    };
    let text = match &notice.description {
        Some(description) => format!("{marker} {}: {description}", notice.title),
        None => format!("{marker} {}", notice.title),
    };
    Span::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD))
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let separator = Span::styled(" | ", Style::default().fg(Color::DarkGray));
        let mut spans = vec![Span::styled(
            format!("Copilot Chat · {}", self.screen),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if let Some(welcome) = &self.welcome {
            spans.push(separator.clone());
            spans.push(Span::raw(welcome.clone()));
        }
        if let Some(notice) = &self.toast {
            spans.push(separator);
            spans.push(toast_span(notice));
        }
        frame.render_widget(Line::from(spans), area);
    }
}
