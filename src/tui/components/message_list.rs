//! # MessageList Component
//!
//! Scrollable view of the open conversation.
//!
//! ## Responsibilities
//!
//! - Lay out message bubbles in a `tui_scrollview::ScrollView`
//! - Stick to the bottom while the user has not scrolled away
//! - Track the message picked with the keyboard (for copy-to-copilot
//!   and editing)
//! - Show placeholders for "no conversation", loading and load failure
//!
//! ## Architecture
//!
//! `MessageList` is transient (built each frame) and wraps
//! `&'a mut MessageListState`, which lives in `TuiState`. Heights are
//! measured every frame; a thread holds at most a few hundred short
//! messages.

use ratatui::Frame;
use ratatui::layout::{Alignment, Position, Rect, Size};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, BorderType, Paragraph, Wrap};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};
use uuid::Uuid;

use crate::backend::Message;
use crate::core::thread::LoadStatus;
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::MessageBubble;
use crate::tui::event::TuiEvent;

/// Blank rows between bubbles.
const GAP: u16 = 1;

/// Persistent scroll and selection state for the thread.
pub struct MessageListState {
    pub scroll_state: ScrollViewState,
    /// When true, follow new messages to the bottom
    pub stick_to_bottom: bool,
    /// Message picked with the keyboard
    pub selected_index: Option<usize>,
    /// Bubble heights (including the gap) from the last frame
    pub heights: Vec<u16>,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            stick_to_bottom: true,
            selected_index: None,
            heights: Vec::new(),
            viewport_height: 0,
        }
    }

    fn total_height(&self) -> u16 {
        self.heights.iter().sum()
    }

    fn max_offset(&self) -> u16 {
        self.total_height().saturating_sub(self.viewport_height)
    }

    /// Moves the selection by `delta`, starting from the newest message.
    pub fn move_selection(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected_index = None;
            return;
        }
        let next = match self.selected_index {
            Some(i) => (i as isize + delta).clamp(0, len as isize - 1) as usize,
            None => len - 1,
        };
        self.selected_index = Some(next);
        self.scroll_to_selected();
    }

    pub fn clear_selection(&mut self) {
        self.selected_index = None;
    }

    /// Scrolls so the selected bubble is fully visible.
    pub fn scroll_to_selected(&mut self) {
        let Some(index) = self.selected_index else {
            return;
        };
        if index >= self.heights.len() {
            return;
        }
        let top: u16 = self.heights[..index].iter().sum();
        let bottom = top + self.heights[index];
        let offset = self.scroll_state.offset().y;

        if top < offset {
            self.scroll_state.set_offset(Position { x: 0, y: top });
            self.stick_to_bottom = false;
        } else if bottom > offset + self.viewport_height {
            let y = bottom.saturating_sub(self.viewport_height);
            self.scroll_state.set_offset(Position { x: 0, y });
            self.stick_to_bottom = y >= self.max_offset();
        }
    }

    fn clamp_scroll(&mut self) {
        let max_y = self.max_offset();
        let current = self.scroll_state.offset();
        if current.y > max_y {
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: max_y,
            });
        }
    }

    /// Re-pins to the bottom once the user scrolled all the way down.
    fn repin_if_at_bottom(&mut self) {
        if self.scroll_state.offset().y >= self.max_offset() {
            self.stick_to_bottom = true;
            self.clamp_scroll();
        }
    }
}

impl EventHandler for MessageListState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            _ => {}
        }
        None
    }
}

pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub messages: &'a [Message],
    pub status: LoadStatus,
    /// `None` when no conversation is open
    pub conversation: Option<&'a str>,
    pub me: Option<Uuid>,
    pub editing: Option<Uuid>,
    pub focused: bool,
}

impl<'a> MessageList<'a> {
    fn placeholder(&self) -> Option<&'static str> {
        if self.conversation.is_none() {
            return Some("Select a conversation, or press Ctrl+N to start a new one.");
        }
        match self.status {
            LoadStatus::Loading if self.messages.is_empty() => Some("Loading messages…"),
            LoadStatus::Failed if self.messages.is_empty() => {
                Some("Could not load messages. Reopen the conversation to retry.")
            }
            _ if self.messages.is_empty() => Some("No messages yet. Say hello!"),
            _ => None,
        }
    }
}

impl Component for MessageList<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let border_style = if self.focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(self.conversation.unwrap_or("Messages"));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if let Some(text) = self.placeholder() {
            self.state.heights.clear();
            let paragraph = Paragraph::new(text)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, inner);
            return;
        }

        // -1 for the scrollbar column
        let content_width = inner.width.saturating_sub(1);
        self.state.heights = self
            .messages
            .iter()
            .map(|m| MessageBubble::calculate_height(m, content_width) + GAP)
            .collect();
        self.state.viewport_height = inner.height;
        if let Some(index) = self.state.selected_index
            && index >= self.messages.len()
        {
            self.state.selected_index = None;
        }
        if !self.state.stick_to_bottom {
            self.state.clamp_scroll();
        }

        let total_height = self.state.total_height();
        let mut scroll_view = ScrollView::new(Size::new(content_width, total_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Automatic)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y = 0u16;
        for (i, (message, height)) in self.messages.iter().zip(&self.state.heights).enumerate() {
            let own = self.me == Some(message.user_id);
            let author = if own {
                "You"
            } else {
                self.conversation.unwrap_or("Unknown")
            };
            let bubble = MessageBubble {
                message,
                author,
                own,
                is_selected: self.state.selected_index == Some(i),
                is_editing: self.editing == Some(message.id),
            };
            scroll_view.render_widget(bubble, Rect::new(0, y, content_width, height - GAP));
            y += height;
        }

        if self.state.stick_to_bottom {
            self.state.scroll_state.scroll_to_bottom();
        }
        frame.render_stateful_widget(scroll_view, inner, &mut self.state.scroll_state);
    }
}
