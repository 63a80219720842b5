//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! and translates keyboard events into core::Action values.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Event Loop
//!
//! Each turn draws one frame, waits up to `POLL_INTERVAL` for input, then
//! feeds the reducer in order: keyboard actions, results reported by the
//! dispatcher's tasks, and a `Tick` for toast expiry and the debounced
//! copilot requests. The effects `update` returns go straight to the
//! `Dispatcher`.
//!
//! ## Key Map (chat screen)
//!
//! | Key      | Action                                  |
//! |----------|-----------------------------------------|
//! | Tab      | cycle focus: list → thread → composer → copilot |
//! | Ctrl+N   | new conversation (user search)          |
//! | Ctrl+E   | emoji picker                            |
//! | Ctrl+K   | focus copilot (next tab when focused)   |
//! | Ctrl+W   | show / hide copilot                     |
//! | Ctrl+S   | hand the draft to the copilot           |
//! | Ctrl+U   | use the copilot suggestion              |
//! | Ctrl+L   | clear the open conversation             |
//! | Ctrl+D   | delete the highlighted conversation     |
//! | Ctrl+R   | reload conversations                    |
//! | Ctrl+T   | retry the copilot                       |
//! | Ctrl+P   | profile                                 |
//! | Ctrl+O   | sign out                                |
//! | Ctrl+Q   | quit                                    |
//!
//! A `SteadyBlock` cursor style is used instead of a blinking cursor because
//! ratatui's `set_cursor_position` resets the terminal's blink timer on every
//! `draw()` call.

mod component;
mod components;
mod event;
mod ui;

use log::{debug, info};
use std::io::stdout;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use uuid::Uuid;

use crate::core::action::{Action, start, update};
use crate::core::auth::AuthMode;
use crate::core::config::ResolvedConfig;
use crate::core::route::{Guarded, Route};
use crate::core::state::App;
use crate::dispatch::{Dispatcher, Services};
use crate::tui::component::EventHandler;
use crate::tui::components::{
    AuthEvent, CopilotEvent, EmojiEvent, InputBox, InputEvent, MessageListState, ProfileEvent,
    SearchEvent,
};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const SPINNER_FRAME: Duration = Duration::from_millis(80);

/// Which chat pane receives keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Conversations,
    Thread,
    Composer,
    Copilot,
}

impl Pane {
    fn cycle(self, forward: bool, copilot_open: bool) -> Self {
        let order: &[Pane] = if copilot_open {
            &[Pane::Conversations, Pane::Thread, Pane::Composer, Pane::Copilot]
        } else {
            &[Pane::Conversations, Pane::Thread, Pane::Composer]
        };
        let index = order.iter().position(|p| *p == self).unwrap_or(0);
        let next = if forward {
            (index + 1) % order.len()
        } else {
            (index + order.len() - 1) % order.len()
        };
        order[next]
    }
}

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    pub focus: Pane,
    pub message_list: MessageListState,
    pub input_box: InputBox,
    /// Query edited since the last search; Enter searches again instead of
    /// opening the highlighted result.
    pub search_dirty: bool,
    pub spinner_frame: usize,
    /// Conversation the thread view was last laid out for
    shown_conversation: Option<Uuid>,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            focus: Pane::Composer,
            message_list: MessageListState::new(),
            input_box: InputBox::new(),
            search_dirty: false,
            spinner_frame: 0,
            shown_conversation: None,
        }
    }

    /// Pulls the props the widgets need out of `App` before a frame.
    pub fn sync(&mut self, app: &mut App) {
        let conversation = app.thread.conversation_id();
        if conversation != self.shown_conversation {
            self.shown_conversation = conversation;
            self.message_list = MessageListState::new();
        }
        if app.thread.scroll_to_bottom {
            self.message_list.stick_to_bottom = true;
            app.thread.scroll_to_bottom = false;
        }
        if !app.copilot.open && self.focus == Pane::Copilot {
            self.focus = Pane::Composer;
        }

        self.input_box.sync(app.composer.text(), app.composer.revision());
        self.input_box.title = if app.composer.editing().is_some() {
            "Editing message (Esc cancels)".to_string()
        } else if app.composer.is_sending() {
            "Sending…".to_string()
        } else {
            "Message".to_string()
        };
        self.input_box.dimmed =
            self.focus != Pane::Composer || app.thread.conversation_id().is_none();
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // The Kitty keyboard protocol lets Shift+Enter through; terminals
        // without it ignore the request.
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!(
            "Terminal modes enabled (mouse, bracketed paste, steady block cursor, keyboard enhancement)"
        );
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide
        );
    }
}

/// Runs the app until the user quits. Must be called from inside a tokio
/// runtime: the dispatcher spawns its work there.
pub fn run(config: &ResolvedConfig, services: Services) -> std::io::Result<()> {
    let mut app = App::from_config(config);
    let mut tui = TuiState::new();

    let (tx, rx) = mpsc::channel();
    let dispatcher = Dispatcher::new(services, tx);
    dispatcher.dispatch(start(&mut app));

    let mut terminal = ratatui::init();
    let terminal_mode = TerminalModeGuard::new();
    let started = Instant::now();

    let result = loop {
        tui.sync(&mut app);
        tui.spinner_frame = (started.elapsed().as_millis() / SPINNER_FRAME.as_millis()) as usize;
        if let Err(e) = terminal.draw(|f| ui::draw_ui(f, &app, &mut tui)) {
            break Err(e);
        }

        let mut actions = Vec::new();
        let first_event = poll_event_timeout(POLL_INTERVAL);
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            actions.extend(handle_event(&mut app, &mut tui, &event));
        }
        actions.extend(rx.try_iter());
        actions.push(Action::Tick(Instant::now()));

        let mut quit = false;
        for action in actions {
            if !matches!(action, Action::Tick(_)) {
                debug!("Action: {:?}", action);
            }
            if dispatcher.dispatch(update(&mut app, action)) {
                quit = true;
                break;
            }
        }
        if quit {
            info!("Shutting down");
            break Ok(());
        }
    };

    drop(terminal_mode);
    ratatui::restore();
    result
}

/// Translates one terminal event into reducer actions. Overlay and form
/// state is edited in place by the component handlers.
pub fn handle_event(app: &mut App, tui: &mut TuiState, event: &TuiEvent) -> Vec<Action> {
    match event {
        TuiEvent::ForceQuit | TuiEvent::Ctrl('q') => return vec![Action::Quit],
        TuiEvent::Resize => return Vec::new(),
        _ => {}
    }

    match app.screen() {
        Guarded::Loading => Vec::new(),
        Guarded::Show(Route::Landing) => match event {
            TuiEvent::Submit | TuiEvent::InputChar('l') => vec![Action::Navigate(Route::Login)],
            TuiEvent::InputChar('r') => vec![Action::Navigate(Route::Register)],
            TuiEvent::Escape | TuiEvent::InputChar('q') => vec![Action::Quit],
            _ => Vec::new(),
        },
        Guarded::Show(Route::Login | Route::Register) => match app.auth_form.handle_event(event) {
            Some(AuthEvent::Submit) => vec![Action::SubmitAuth],
            Some(AuthEvent::SwitchMode) => {
                let target = match app.auth_form.mode {
                    AuthMode::SignIn => Route::Register,
                    AuthMode::SignUp => Route::Login,
                };
                vec![Action::Navigate(target)]
            }
            Some(AuthEvent::Back) => vec![Action::Navigate(Route::Landing)],
            None => Vec::new(),
        },
        Guarded::Show(Route::Profile) => {
            if matches!(event, TuiEvent::Ctrl('o')) {
                return vec![Action::SignOut];
            }
            match app.profile.handle_event(event) {
                Some(ProfileEvent::Save) => vec![Action::SaveProfile],
                Some(ProfileEvent::Back) => vec![Action::Navigate(Route::Chat)],
                None => Vec::new(),
            }
        }
        Guarded::Show(Route::NotFound) => match event {
            TuiEvent::Submit | TuiEvent::Escape => vec![Action::Navigate(Route::Landing)],
            _ => Vec::new(),
        },
        Guarded::Show(Route::Chat) => chat_event(app, tui, event),
    }
}

fn chat_event(app: &mut App, tui: &mut TuiState, event: &TuiEvent) -> Vec<Action> {
    // Overlays take every key while open.
    if app.copilot.language_input.is_some() {
        return copilot_event(app, tui, event);
    }
    if app.emoji.open {
        return match app.emoji.handle_event(event) {
            Some(EmojiEvent::Pick) => vec![Action::PickEmoji],
            Some(EmojiEvent::Dismiss) => {
                app.emoji.close();
                Vec::new()
            }
            None => Vec::new(),
        };
    }
    if app.user_search.open {
        return search_event(app, tui, event);
    }

    match event {
        TuiEvent::NextFocus | TuiEvent::PrevFocus => {
            let forward = matches!(event, TuiEvent::NextFocus);
            tui.focus = tui.focus.cycle(forward, app.copilot.open);
            return Vec::new();
        }
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown => {
            tui.message_list.handle_event(event);
            return Vec::new();
        }
        TuiEvent::Ctrl('n') => {
            app.user_search.open();
            tui.search_dirty = false;
            return Vec::new();
        }
        TuiEvent::Ctrl('e') => {
            app.emoji.toggle();
            tui.focus = Pane::Composer;
            return Vec::new();
        }
        TuiEvent::Ctrl('k') if tui.focus != Pane::Copilot => {
            app.copilot.open = true;
            tui.focus = Pane::Copilot;
            return Vec::new();
        }
        TuiEvent::Ctrl('w') => {
            app.copilot.open = !app.copilot.open;
            if !app.copilot.open && tui.focus == Pane::Copilot {
                tui.focus = Pane::Composer;
            }
            return Vec::new();
        }
        TuiEvent::Ctrl('s') => {
            return vec![Action::SelectText(Some(app.composer.text().to_string()))];
        }
        TuiEvent::Ctrl('u') => return vec![Action::UseSuggestion],
        TuiEvent::Ctrl('l') => {
            return app
                .thread
                .conversation_id()
                .map(Action::ClearConversation)
                .into_iter()
                .collect();
        }
        TuiEvent::Ctrl('r') => return vec![Action::RefreshConversations],
        TuiEvent::Ctrl('t') => return vec![Action::ReconnectCopilot],
        TuiEvent::Ctrl('p') => return vec![Action::Navigate(Route::Profile)],
        TuiEvent::Ctrl('o') => return vec![Action::SignOut],
        _ => {}
    }

    match tui.focus {
        Pane::Conversations => match event {
            TuiEvent::CursorUp => {
                app.conversations.move_cursor(-1);
                Vec::new()
            }
            TuiEvent::CursorDown => {
                app.conversations.move_cursor(1);
                Vec::new()
            }
            TuiEvent::Submit => match app.conversations.highlighted() {
                Some(summary) => {
                    tui.focus = Pane::Composer;
                    vec![Action::SelectConversation(summary.id)]
                }
                None => Vec::new(),
            },
            TuiEvent::Ctrl('d') => app
                .conversations
                .highlighted()
                .map(|summary| Action::DeleteConversation(summary.id))
                .into_iter()
                .collect(),
            TuiEvent::Escape => vec![Action::CloseConversation],
            _ => Vec::new(),
        },
        Pane::Thread => {
            let messages = app.thread.messages();
            let selected = tui
                .message_list
                .selected_index
                .and_then(|index| messages.get(index));
            match event {
                TuiEvent::CursorUp => {
                    tui.message_list.move_selection(-1, messages.len());
                    Vec::new()
                }
                TuiEvent::CursorDown => {
                    tui.message_list.move_selection(1, messages.len());
                    Vec::new()
                }
                TuiEvent::Submit => selected
                    .map(|message| Action::SelectText(Some(message.content.clone())))
                    .into_iter()
                    .collect(),
                TuiEvent::InputChar('e') => match selected {
                    Some(message) => {
                        let id = message.id;
                        tui.focus = Pane::Composer;
                        vec![Action::BeginEdit(id)]
                    }
                    None => Vec::new(),
                },
                TuiEvent::Escape => {
                    tui.message_list.clear_selection();
                    tui.focus = Pane::Composer;
                    Vec::new()
                }
                _ => Vec::new(),
            }
        }
        Pane::Composer => {
            if matches!(event, TuiEvent::Escape) {
                if app.composer.editing().is_some() {
                    return vec![Action::CancelEdit];
                }
                tui.focus = Pane::Thread;
                tui.message_list.move_selection(0, app.thread.messages().len());
                return Vec::new();
            }
            match tui.input_box.handle_event(event) {
                Some(InputEvent::Changed(text)) => vec![Action::DraftChanged(text)],
                Some(InputEvent::Submit) => vec![Action::SubmitDraft],
                None => Vec::new(),
            }
        }
        Pane::Copilot => copilot_event(app, tui, event),
    }
}

fn search_event(app: &mut App, tui: &mut TuiState, event: &TuiEvent) -> Vec<Action> {
    match app.user_search.handle_event(event) {
        Some(SearchEvent::QueryChanged) => {
            tui.search_dirty = true;
            Vec::new()
        }
        Some(SearchEvent::Submit) => {
            if tui.search_dirty || app.user_search.results().is_empty() {
                tui.search_dirty = false;
                return vec![Action::SearchUsers];
            }
            app.user_search
                .highlighted()
                .map(|profile| Action::StartConversation(profile.id))
                .into_iter()
                .collect()
        }
        Some(SearchEvent::Dismiss) => {
            app.user_search.close();
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn copilot_event(app: &mut App, tui: &mut TuiState, event: &TuiEvent) -> Vec<Action> {
    match app.copilot.handle_event(event) {
        Some(CopilotEvent::Run(action)) => vec![Action::RunCannedAction(action)],
        Some(CopilotEvent::Translate(language)) => vec![Action::Translate(language)],
        Some(CopilotEvent::ApplyInstructions) => vec![Action::ApplyInstructions],
        Some(CopilotEvent::UseSuggestion) => vec![Action::UseSuggestion],
        Some(CopilotEvent::SubmitChat) => vec![Action::SubmitCopilotChat],
        Some(CopilotEvent::InsertReply(index)) => {
            tui.focus = Pane::Composer;
            vec![Action::InsertReply(index)]
        }
        Some(CopilotEvent::Dismiss) => {
            tui.focus = Pane::Composer;
            Vec::new()
        }
        None => Vec::new(),
    }
}
