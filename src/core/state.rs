//! # Application State
//!
//! Core business state for Copilot Chat. This module contains domain logic
//! only, no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── route: Route                  // requested screen (before the guard)
//! ├── restoring: bool               // stored session still being restored
//! ├── session: Option<AuthSession>  // signed-in user, if any
//! ├── auth_form: AuthForm           // sign-in / sign-up fields
//! ├── conversations: ConversationList
//! ├── user_search: UserSearch       // "new conversation" panel
//! ├── thread: ThreadSync            // active conversation + live feed
//! ├── composer: Composer            // draft
//! ├── copilot: CopilotPanel         // AI side panel
//! ├── emoji: EmojiPicker
//! ├── profile: ProfileForm          // own profile + edit form
//! ├── toasts: ToastQueue
//! └── selection: Option<String>     // text the copilot operates on
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs,
//! plus plain field edits (typing into a form) done by the TUI.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::backend::{AuthSession, Profile};
use crate::core::auth::AuthForm;
use crate::core::composer::Composer;
use crate::core::config::ResolvedConfig;
use crate::core::conversations::{ConversationList, UserSearch};
use crate::core::copilot::CopilotPanel;
use crate::core::emoji::EmojiPicker;
use crate::core::profile::ProfileForm;
use crate::core::route::{Guarded, Route, guard};
use crate::core::thread::ThreadSync;
use crate::core::toast::{Notice, ToastQueue};

pub struct App {
    pub route: Route,
    pub restoring: bool,
    pub session: Option<AuthSession>,
    pub auth_form: AuthForm,
    pub conversations: ConversationList,
    pub user_search: UserSearch,
    pub thread: ThreadSync,
    pub composer: Composer,
    pub copilot: CopilotPanel,
    pub emoji: EmojiPicker,
    pub profile: ProfileForm,
    pub toasts: ToastQueue,
    /// Text the copilot actions operate on: a picked message or the draft.
    pub selection: Option<String>,
    pub status_message: String,
}

impl App {
    pub fn new(start_route: Route, toast_ttl: Duration, suggestion_delay: Duration) -> Self {
        Self {
            route: start_route,
            restoring: false,
            session: None,
            auth_form: AuthForm::default(),
            conversations: ConversationList::new(),
            user_search: UserSearch::default(),
            thread: ThreadSync::new(),
            composer: Composer::new(),
            copilot: CopilotPanel::new(suggestion_delay),
            emoji: EmojiPicker::default(),
            profile: ProfileForm::default(),
            toasts: ToastQueue::new(toast_ttl),
            selection: None,
            status_message: String::from("Welcome to Copilot Chat!"),
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(
            config.start_route,
            config.toast_ttl,
            config.suggestion_delay,
        )
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.user.id)
    }

    pub fn me(&self) -> Option<&Profile> {
        self.profile.profile()
    }

    /// The screen to show for the requested route.
    pub fn screen(&self) -> Guarded {
        guard(self.route, self.session.is_some(), self.restoring)
    }

    pub fn notify(&mut self, notice: Notice) {
        self.toasts.push(notice, Instant::now());
    }

    /// Drops everything tied to the signed-in user.
    pub fn clear_user_state(&mut self) {
        self.session = None;
        self.auth_form = AuthForm::default();
        self.conversations = ConversationList::new();
        self.user_search.close();
        self.thread = ThreadSync::new();
        self.composer.reset();
        self.copilot.reset();
        self.emoji.close();
        self.profile = ProfileForm::default();
        self.selection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_app, test_session};

    #[test]
    fn test_app_new_defaults() {
        let app = test_app();
        assert_eq!(app.status_message, "Welcome to Copilot Chat!");
        assert!(app.session.is_none());
        assert!(app.copilot.open);
        assert_eq!(app.screen(), Guarded::Show(Route::Login));
    }

    #[test]
    fn test_screen_waits_for_restore() {
        let mut app = test_app();
        app.restoring = true;
        assert_eq!(app.screen(), Guarded::Loading);
        app.restoring = false;
        app.session = Some(test_session());
        assert_eq!(app.screen(), Guarded::Show(Route::Chat));
    }

    #[test]
    fn test_clear_user_state() {
        let mut app = test_app();
        app.session = Some(test_session());
        app.selection = Some("hello".into());
        app.composer.replace("draft");
        app.clear_user_state();
        assert!(app.user_id().is_none());
        assert!(app.selection.is_none());
        assert_eq!(app.composer.text(), "");
    }
}
