//! # TUI Components
//!
//! All UI components for the terminal interface.
//!
//! ## Component Architecture
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! Built per frame from borrowed app state:
//! - `TitleBar`: screen name, welcome line and latest toast
//! - `MessageBubble`: a single chat message
//! - `ConversationSidebar`, `CopilotView`, `EmojiGrid`, `UserSearchDialog`,
//!   `AuthScreen`, `ProfileScreen`: views over the matching `core` state
//!
//! ### Stateful Components (Event-Driven)
//!
//! - `InputBox`: composer text field, kept in sync with `core::Composer`
//! - `MessageListState`: scroll position and selection of the thread
//!
//! Overlay state (emoji picker, user search, copilot panel, auth and profile
//! forms) lives in `core`, so those files implement `EventHandler` directly
//! on the core types and translate keys into small event enums. The TUI loop
//! maps those events onto reducer actions.
//!
//! ## Module Structure
//!
//! ```text
//! components/
//! ├── mod.rs               (this file)
//! ├── title_bar.rs         (top status bar)
//! ├── landing.rs           (landing, loading and 404 screens)
//! ├── auth_form.rs         (sign in / sign up)
//! ├── profile_view.rs      (own profile + edit form)
//! ├── conversation_list.rs (sidebar)
//! ├── message.rs           (single message bubble)
//! ├── message_list.rs      (scrollable thread)
//! ├── input_box/           (composer text field)
//! ├── emoji_picker.rs      (emoji grid overlay)
//! ├── user_search.rs       (new conversation dialog)
//! └── copilot_panel.rs     (AI copilot side panel)
//! ```

use ratatui::layout::{Constraint, Layout, Rect};

mod title_bar;
pub use title_bar::TitleBar;

pub mod auth_form;
pub mod conversation_list;
pub mod copilot_panel;
pub mod emoji_picker;
pub mod input_box;
pub mod landing;
pub mod message;
pub mod message_list;
pub mod profile_view;
pub mod user_search;

pub use auth_form::{AuthEvent, AuthScreen};
pub use conversation_list::ConversationSidebar;
pub use copilot_panel::{CopilotEvent, CopilotView};
pub use emoji_picker::{EmojiEvent, EmojiGrid};
pub use input_box::{InputBox, InputEvent};
pub use landing::{LandingPage, LoadingScreen, NotFoundScreen};
pub use message_list::{MessageList, MessageListState};
pub use profile_view::{ProfileEvent, ProfileScreen};
pub use user_search::{SearchEvent, UserSearchDialog};

/// Rect of `percent_x` by `percent_y` centered in `outer`.
pub fn centered_rect(percent_x: u16, percent_y: u16, outer: Rect) -> Rect {
    let [_, center_v, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(outer);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(center_v);
    center
}
