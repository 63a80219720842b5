//! # Copilot Panel Component
//!
//! Right-hand AI side panel with four tabs:
//!
//! - **Actions**: canned rewrites of the selected text (formal, friendly,
//!   translate, grammar, rephrase, concise, expand, summary)
//! - **Smart**: free-form instructions plus the debounced draft suggestion
//! - **Insights**: the latest conversation analysis
//! - **Chat**: a small conversation with the assistant
//!
//! Persistent state is `core::copilot::CopilotPanel`; `CopilotView` is the
//! per-frame wrapper. Key handling lives on the core state through
//! `EventHandler`, the same way `MessageListState` handles scrolling.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Clear, Padding, Paragraph, Tabs, Wrap};

use crate::core::copilot::{ChatRole, CopilotPanel, CopilotTab, Slot};
use crate::inference::CannedAction;
use crate::inference::prompts::QUICK_LANGUAGES;
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::centered_rect;
use crate::tui::components::conversation_list::truncate;
use crate::tui::event::TuiEvent;

/// Events emitted by the panel for the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopilotEvent {
    Run(CannedAction),
    Translate(String),
    ApplyInstructions,
    UseSuggestion,
    SubmitChat,
    InsertReply(Option<usize>),
    /// Hand focus back to the composer.
    Dismiss,
}

fn edit(text: &mut String, event: &TuiEvent) -> bool {
    match event {
        TuiEvent::InputChar('\n') => false,
        TuiEvent::InputChar(c) => {
            text.push(*c);
            true
        }
        TuiEvent::Paste(pasted) => {
            text.push_str(pasted);
            true
        }
        TuiEvent::Backspace => text.pop().is_some(),
        _ => false,
    }
}

/// Keys while the translate prompt is open.
fn handle_language_prompt(panel: &mut CopilotPanel, event: &TuiEvent) -> Option<CopilotEvent> {
    if matches!(event, TuiEvent::Escape) {
        panel.language_input = None;
        return None;
    }
    let input = panel.language_input.as_mut()?;
    match event {
        TuiEvent::Submit => Some(CopilotEvent::Translate(input.clone())),
        TuiEvent::InputChar(c) if input.is_empty() && c.is_ascii_digit() => {
            let pick = c.to_digit(10).and_then(|d| (d as usize).checked_sub(1));
            pick.and_then(|i| QUICK_LANGUAGES.get(i))
                .map(|language| CopilotEvent::Translate(language.to_string()))
        }
        _ => {
            edit(input, event);
            None
        }
    }
}

impl EventHandler for CopilotPanel {
    type Event = CopilotEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        if self.language_input.is_some() {
            return handle_language_prompt(self, event);
        }
        match event {
            TuiEvent::Escape => return Some(CopilotEvent::Dismiss),
            TuiEvent::Ctrl('k') => {
                self.tab = self.tab.next();
                return None;
            }
            TuiEvent::Ctrl('u') => return Some(CopilotEvent::UseSuggestion),
            TuiEvent::Ctrl('y') => return Some(CopilotEvent::InsertReply(None)),
            _ => {}
        }

        match self.tab {
            CopilotTab::Actions => match event {
                TuiEvent::CursorUp => self.move_action_cursor(-1),
                TuiEvent::CursorDown => self.move_action_cursor(1),
                TuiEvent::CursorRight => self.tab = self.tab.next(),
                TuiEvent::Submit => return Some(CopilotEvent::Run(self.highlighted_action())),
                _ => {}
            },
            CopilotTab::Smart => match event {
                TuiEvent::Submit => return Some(CopilotEvent::ApplyInstructions),
                _ => {
                    edit(&mut self.instructions, event);
                }
            },
            CopilotTab::Insights => {
                if matches!(event, TuiEvent::CursorRight) {
                    self.tab = self.tab.next();
                }
            }
            CopilotTab::Chat => match event {
                TuiEvent::Submit => return Some(CopilotEvent::SubmitChat),
                _ => {
                    edit(&mut self.chat_input, event);
                }
            },
        }
        None
    }
}

pub struct CopilotView<'a> {
    pub panel: &'a CopilotPanel,
    /// Text the actions operate on
    pub selection: Option<&'a str>,
    pub focused: bool,
}

impl<'a> CopilotView<'a> {
    pub fn new(panel: &'a CopilotPanel, selection: Option<&'a str>, focused: bool) -> Self {
        Self {
            panel,
            selection,
            focused,
        }
    }

    fn busy_line(&self, slot: Slot, text: &'static str) -> Option<Line<'static>> {
        self.panel.is_busy(slot).then(|| {
            Line::styled(
                text,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            )
        })
    }

    fn selection_line(&self) -> Line<'static> {
        match self.selection {
            Some(text) => Line::from(vec![
                Span::styled("Selected: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(truncate(text, 60)),
            ]),
            None => Line::styled(
                "No text selected. Ctrl+S selects the draft, Enter on a message selects it.",
                Style::default().fg(Color::DarkGray),
            ),
        }
    }

    fn actions(&self) -> Vec<Line<'static>> {
        let mut lines = vec![self.selection_line(), Line::raw("")];
        for (i, action) in CannedAction::ALL.iter().enumerate() {
            let highlighted = i == self.panel.action_cursor;
            let style = if highlighted && self.focused {
                Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
            } else if highlighted {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{} {}", action.icon(), action.label()), style),
                Span::styled(
                    format!("  {}", action.description()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
        }
        lines.extend(self.busy_line(Slot::Action, "Working on it…"));
        lines
    }

    fn smart(&self) -> Vec<Line<'static>> {
        let mut lines = vec![
            self.selection_line(),
            Line::raw(""),
            Line::from(vec![
                Span::styled("Instructions: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(self.panel.instructions.clone()),
            ]),
            Line::styled(
                "Enter applies them to the selected text.",
                Style::default().fg(Color::DarkGray),
            ),
            Line::raw(""),
            Line::styled("Suggestion", Style::default().add_modifier(Modifier::BOLD)),
        ];
        let suggestion = self.panel.suggestion();
        if suggestion.trim().is_empty() {
            lines.push(Line::styled(
                "Keep typing and a suggestion will show up here.",
                Style::default().fg(Color::DarkGray),
            ));
        } else {
            lines.push(Line::styled(
                suggestion.to_string(),
                Style::default().fg(Color::Green),
            ));
            lines.push(Line::styled(
                "Ctrl+U puts it in the message box.",
                Style::default().fg(Color::DarkGray),
            ));
        }
        lines.extend(self.busy_line(Slot::Suggestion, "Thinking…"));
        lines
    }

    fn insights(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let analysis = self.panel.analysis();
        if analysis.trim().is_empty() {
            lines.push(Line::styled(
                "Insights appear once the conversation has a few messages.",
                Style::default().fg(Color::DarkGray),
            ));
        } else {
            lines.extend(analysis.lines().map(|l| Line::raw(l.to_string())));
        }
        lines.extend(self.busy_line(Slot::Analysis, "Analyzing conversation…"));
        lines
    }

    fn chat(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        if self.panel.transcript().is_empty() {
            lines.push(Line::styled(
                "Ask the copilot anything about your conversation.",
                Style::default().fg(Color::DarkGray),
            ));
        }
        for entry in self.panel.transcript() {
            let (label, color) = match entry.role {
                ChatRole::User => ("You: ", Color::Cyan),
                ChatRole::Assistant => ("Copilot: ", Color::Green),
            };
            lines.push(Line::from(vec![
                Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(entry.content.clone()),
            ]));
        }
        lines.extend(self.busy_line(Slot::Chat, "Copilot is typing…"));
        lines.push(Line::raw(""));
        lines.push(Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(self.panel.chat_input.clone()),
        ]));
        lines.push(Line::styled(
            "Ctrl+Y inserts the latest reply into your message.",
            Style::default().fg(Color::DarkGray),
        ));
        lines
    }

    fn render_language_prompt(&self, frame: &mut Frame, area: Rect, input: &str) {
        let overlay = centered_rect(90, 70, area);
        frame.render_widget(Clear, overlay);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Language: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(input.to_string()),
            ]),
            Line::raw(""),
        ];
        lines.extend(
            QUICK_LANGUAGES
                .iter()
                .enumerate()
                .map(|(i, language)| Line::raw(format!("{}. {}", i + 1, language))),
        );
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Translate to ")
            .title_bottom(" Enter to translate, Esc to cancel ")
            .padding(Padding::horizontal(1));
        frame.render_widget(Paragraph::new(lines).block(block), overlay);
    }
}

impl Component for CopilotView<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let border_style = if self.focused {
            Style::default().fg(Color::Magenta)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(" AI Copilot ")
            .padding(Padding::horizontal(1));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [tabs_area, body_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(inner);

        let selected = CopilotTab::ALL
            .iter()
            .position(|t| *t == self.panel.tab)
            .unwrap_or(0);
        let tabs = Tabs::new(CopilotTab::ALL.iter().map(|t| t.label()))
            .select(selected)
            .highlight_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD));
        frame.render_widget(tabs, tabs_area);

        let lines = match self.panel.tab {
            CopilotTab::Actions => self.actions(),
            CopilotTab::Smart => self.smart(),
            CopilotTab::Insights => self.insights(),
            CopilotTab::Chat => self.chat(),
        };
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), body_area);

        let footer = if self.panel.has_failed_request() {
            Line::styled(
                "AI request failed. Ctrl+T to retry.",
                Style::default().fg(Color::Red),
            )
        } else {
            Line::styled(
                "Ctrl+K next tab · Esc back to message",
                Style::default().fg(Color::DarkGray),
            )
        };
        frame.render_widget(footer, footer_area);

        if let Some(input) = &self.panel.language_input {
            self.render_language_prompt(frame, area, input);
        }
    }
}
