//! # Landing Page Component
//!
//! Shown at `/` before signing in, plus the small full-screen notices
//! (session restore in progress, unknown route).

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::component::Component;

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

pub struct LandingPage;

impl Component for LandingPage {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines = vec![
            Line::from(Span::styled(
                "Copilot Chat",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!("v{}", env!("CARGO_PKG_VERSION")),
                Style::default().fg(Color::DarkGray),
            )),
            Line::raw(""),
            Line::raw("Real-time one-to-one messaging with an AI writing copilot."),
            Line::raw(""),
            Line::from(vec![
                Span::styled(
                    "Enter",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" sign in   "),
                Span::styled("r", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                Span::raw(" create account   "),
                Span::styled("q", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                Span::raw(" quit"),
            ]),
        ];
        render_centered(frame, area, lines);
    }
}

/// Spinner while the stored session is being restored.
pub struct LoadingScreen {
    pub frame_index: usize,
}

impl Component for LoadingScreen {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let spinner = SPINNER[self.frame_index % SPINNER.len()];
        let lines = vec![Line::from(vec![
            Span::styled(spinner, Style::default().fg(Color::Cyan)),
            Span::raw(" Restoring your session…"),
        ])];
        render_centered(frame, area, lines);
    }
}

pub struct NotFoundScreen;

impl Component for NotFoundScreen {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines = vec![
            Line::from(Span::styled(
                "404",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::raw("Oops! Page not found"),
            Line::styled(
                "Press Enter to return home.",
                Style::default().fg(Color::DarkGray),
            ),
        ];
        render_centered(frame, area, lines);
    }
}

fn render_centered(frame: &mut Frame, area: Rect, lines: Vec<Line<'static>>) {
    let [middle] = Layout::vertical([Constraint::Length(lines.len() as u16)])
        .flex(Flex::Center)
        .areas(area);
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), middle);
}
