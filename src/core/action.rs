//! # Actions
//!
//! Everything that can happen in Copilot Chat becomes an `Action`.
//! User presses Enter in the composer? That's `Action::SubmitDraft`.
//! The backend acknowledges the write? That's `Action::MessageSent { .. }`.
//!
//! The `update()` function takes the current state and an action, mutates
//! the state, and returns the `Effect`s the dispatcher should run. No I/O
//! happens here.
//!
//! ```text
//! State + Action  →  update()  →  New State + Vec<Effect>
//! ```
//!
//! Results of effects come back as actions, so the whole session can be
//! replayed (and tested) without a network.

use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{
    AuthSession, ChangeEvent, ConversationSummary, Message, NewMessage, Profile, ProfileUpdate,
    SignUpOutcome, SignUpProfile, StartedConversation, SubscriptionHandle,
};
use crate::core::auth::{AuthMode, Credentials};
use crate::core::composer::Submission;
use crate::core::copilot::{CopilotError, CopilotRequest, Purpose, Resolution};
use crate::core::route::{Guarded, Route};
use crate::core::state::App;
use crate::core::thread::ThreadCommand;
use crate::core::toast::Notice;
use crate::inference::CannedAction;

#[derive(Debug)]
pub enum Action {
    Quit,
    /// Periodic clock: expires toasts, fires debounced copilot requests.
    Tick(Instant),
    Navigate(Route),

    // Session
    SessionRestored(Option<AuthSession>),
    SubmitAuth,
    SignedIn(Result<AuthSession, String>),
    SignedUp(Result<SignUpOutcome, String>),
    SignOut,
    SignedOut(Result<(), String>),
    /// The dispatcher swapped in a new access token.
    SessionRefreshed(AuthSession),
    /// The refresh token was refused while the app was running.
    SessionLost,

    // Profile
    ProfileLoaded(Result<Profile, String>),
    SaveProfile,
    ProfileSaved(Result<ProfileUpdate, String>),

    // Conversations
    RefreshConversations,
    ConversationsLoaded(Result<Vec<ConversationSummary>, String>),
    SelectConversation(Uuid),
    CloseConversation,
    SearchUsers,
    SearchResults {
        query: String,
        result: Result<Vec<Profile>, String>,
    },
    StartConversation(Uuid),
    ConversationStarted(Result<StartedConversation, String>),
    DeleteConversation(Uuid),
    ConversationDeleted {
        id: Uuid,
        result: Result<(), String>,
    },
    ClearConversation(Uuid),
    ConversationCleared {
        id: Uuid,
        result: Result<(), String>,
    },

    // Thread
    HistoryLoaded {
        generation: u64,
        result: Result<Vec<Message>, String>,
    },
    Subscribed {
        generation: u64,
        handle: SubscriptionHandle,
    },
    SubscribeFailed {
        generation: u64,
        error: String,
    },
    FeedEvent {
        subscription_id: u64,
        event: ChangeEvent,
    },

    // Composer
    DraftChanged(String),
    SubmitDraft,
    /// Ack for a send made while `conversation_id` was open.
    MessageSent {
        conversation_id: Uuid,
        result: Result<Message, String>,
    },
    BeginEdit(Uuid),
    CancelEdit,
    MessageEdited {
        conversation_id: Uuid,
        id: Uuid,
        content: String,
        result: Result<(), String>,
    },
    PickEmoji,
    /// Sets (or clears) the text the copilot works on.
    SelectText(Option<String>),

    // Copilot
    RunCannedAction(CannedAction),
    Translate(String),
    ApplyInstructions,
    UseSuggestion,
    SubmitCopilotChat,
    InsertReply(Option<usize>),
    ReconnectCopilot,
    CopilotResult {
        seq: u64,
        purpose: Purpose,
        result: Result<String, CopilotError>,
    },
}

/// Side effects requested by `update`, executed by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Quit,
    RestoreSession,
    PersistSession(AuthSession),
    ForgetSession,
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        profile: SignUpProfile,
    },
    SignOut {
        access_token: String,
    },
    FetchProfile(Uuid),
    SaveProfile {
        user_id: Uuid,
        update: ProfileUpdate,
    },
    LoadConversations(Uuid),
    SearchUsers {
        query: String,
        exclude: Uuid,
    },
    StartConversation {
        me: Uuid,
        target: Uuid,
    },
    DeleteConversation(Uuid),
    ClearConversation(Uuid),
    FetchHistory {
        conversation_id: Uuid,
        generation: u64,
    },
    OpenFeed {
        conversation_id: Uuid,
        generation: u64,
    },
    CloseFeed(SubscriptionHandle),
    SendMessage(NewMessage),
    EditMessage {
        conversation_id: Uuid,
        id: Uuid,
        content: String,
    },
    Generate(CopilotRequest),
}

impl From<ThreadCommand> for Effect {
    fn from(command: ThreadCommand) -> Self {
        match command {
            ThreadCommand::Fetch {
                conversation_id,
                generation,
            } => Effect::FetchHistory {
                conversation_id,
                generation,
            },
            ThreadCommand::Open {
                conversation_id,
                generation,
            } => Effect::OpenFeed {
                conversation_id,
                generation,
            },
            ThreadCommand::Close(handle) => Effect::CloseFeed(handle),
        }
    }
}

fn effects(commands: Vec<ThreadCommand>) -> Vec<Effect> {
    commands.into_iter().map(Effect::from).collect()
}

/// Effects to run once at startup.
pub fn start(app: &mut App) -> Vec<Effect> {
    app.restoring = true;
    vec![Effect::RestoreSession]
}

pub fn update(app: &mut App, action: Action) -> Vec<Effect> {
    match action {
        Action::Quit => vec![Effect::Quit],
        Action::Tick(now) => {
            app.toasts.expire(now);
            let history = app.thread.history_lines();
            app.copilot
                .tick(now, app.composer.text(), app.selection.as_deref(), &history)
                .into_iter()
                .map(Effect::Generate)
                .collect()
        }
        Action::Navigate(route) => navigate(app, route),

        // ====================================================================
        // Session
        // ====================================================================
        Action::SessionRestored(session) => {
            app.restoring = false;
            match session {
                Some(session) => {
                    info!("Restored session for {}", session.user.id);
                    let mut effects = begin_session(app, session);
                    effects.extend(navigate(app, app.route));
                    effects
                }
                None => navigate(app, app.route),
            }
        }
        Action::SubmitAuth => {
            if app.auth_form.is_submitting() {
                return Vec::new();
            }
            match app.auth_form.begin_submit() {
                Ok(Credentials::SignIn { email, password }) => {
                    vec![Effect::SignIn { email, password }]
                }
                Ok(Credentials::SignUp {
                    email,
                    password,
                    profile,
                }) => vec![Effect::SignUp {
                    email,
                    password,
                    profile,
                }],
                Err(reason) => {
                    app.notify(Notice::error(reason));
                    Vec::new()
                }
            }
        }
        Action::SignedIn(Ok(session)) => {
            app.auth_form.on_finished(true);
            app.notify(Notice::success(
                "Welcome back!",
                "You have successfully signed in.",
            ));
            let mut effects = vec![Effect::PersistSession(session.clone())];
            effects.extend(begin_session(app, session));
            effects.extend(navigate(app, Route::Chat));
            effects
        }
        Action::SignedIn(Err(e)) => {
            app.auth_form.on_finished(false);
            app.notify(Notice::error(e));
            Vec::new()
        }
        Action::SignedUp(Ok(outcome)) => {
            app.auth_form.on_finished(true);
            app.notify(Notice::success(
                "Account created!",
                "Please check your email to verify your account.",
            ));
            match outcome {
                SignUpOutcome::SignedIn(session) => {
                    let mut effects = vec![Effect::PersistSession(session.clone())];
                    effects.extend(begin_session(app, session));
                    effects.extend(navigate(app, Route::Chat));
                    effects
                }
                SignUpOutcome::ConfirmationRequired(user) => {
                    info!("Sign-up for {} awaits email confirmation", user.id);
                    navigate(app, Route::Login)
                }
            }
        }
        Action::SignedUp(Err(e)) => {
            app.auth_form.on_finished(false);
            app.notify(Notice::error(e));
            Vec::new()
        }
        Action::SignOut => {
            let Some(session) = app.session.as_ref() else {
                return Vec::new();
            };
            let access_token = session.access_token.clone();
            let mut effects = effects(app.thread.close());
            effects.push(Effect::SignOut { access_token });
            effects.push(Effect::ForgetSession);
            effects
        }
        Action::SignedOut(result) => {
            app.clear_user_state();
            match result {
                Ok(()) => app.notify(Notice::success(
                    "Signed out",
                    "You have been successfully signed out.",
                )),
                Err(e) => {
                    warn!("Sign-out failed remotely: {}", e);
                    app.notify(Notice::error("Failed to sign out"));
                }
            }
            navigate(app, Route::Login)
        }
        Action::SessionRefreshed(session) => {
            if app.user_id() == Some(session.user.id) {
                debug!("Access token refreshed for {}", session.user.id);
                app.session = Some(session);
            }
            Vec::new()
        }
        Action::SessionLost => {
            if app.session.is_none() {
                return Vec::new();
            }
            let mut effects = effects(app.thread.close());
            app.clear_user_state();
            app.notify(Notice::warning("Session expired", "Please sign in again."));
            effects.extend(navigate(app, Route::Login));
            effects
        }

        // ====================================================================
        // Profile
        // ====================================================================
        Action::ProfileLoaded(Ok(profile)) => {
            app.profile.on_loaded(profile);
            Vec::new()
        }
        Action::ProfileLoaded(Err(e)) => {
            warn!("Profile fetch failed: {}", e);
            app.notify(Notice::error("Failed to load profile"));
            Vec::new()
        }
        Action::SaveProfile => {
            let Some(user_id) = app.user_id() else {
                return Vec::new();
            };
            if app.profile.is_saving() {
                return Vec::new();
            }
            match app.profile.begin_save() {
                Ok(update) => vec![Effect::SaveProfile { user_id, update }],
                Err(reason) => {
                    app.notify(Notice::error(reason));
                    Vec::new()
                }
            }
        }
        Action::ProfileSaved(Ok(update)) => {
            app.profile.on_saved(update);
            app.notify(Notice::success(
                "Profile updated",
                "Your profile has been updated successfully.",
            ));
            Vec::new()
        }
        Action::ProfileSaved(Err(e)) => {
            warn!("Profile save failed: {}", e);
            app.profile.on_save_failed();
            app.notify(Notice::error("Failed to update profile"));
            Vec::new()
        }

        // ====================================================================
        // Conversations
        // ====================================================================
        Action::RefreshConversations => load_conversations(app),
        Action::ConversationsLoaded(Ok(items)) => {
            debug!("Loaded {} conversations", items.len());
            app.conversations.on_loaded(items);
            Vec::new()
        }
        Action::ConversationsLoaded(Err(e)) => {
            warn!("Conversation list failed: {}", e);
            app.conversations.on_load_failed();
            app.notify(Notice::error("Failed to load conversations"));
            Vec::new()
        }
        Action::SelectConversation(id) => select_conversation(app, id),
        Action::CloseConversation => {
            app.conversations.deselect();
            app.composer.reset();
            effects(app.thread.close())
        }
        Action::SearchUsers => {
            let Some(me) = app.user_id() else {
                return Vec::new();
            };
            match app.user_search.submit() {
                Some(query) => vec![Effect::SearchUsers { query, exclude: me }],
                None => Vec::new(),
            }
        }
        Action::SearchResults { query, result } => {
            match result {
                Ok(results) => {
                    if !app.user_search.on_results(&query, results) {
                        debug!("Dropping results for superseded query {:?}", query);
                    }
                }
                Err(e) => {
                    warn!("User search for {:?} failed: {}", query, e);
                    app.user_search.on_failed(&query);
                    app.notify(Notice::error("Failed to search users"));
                }
            }
            Vec::new()
        }
        Action::StartConversation(target) => {
            let Some(me) = app.user_id() else {
                return Vec::new();
            };
            if !app.user_search.begin_create(target) {
                return Vec::new();
            }
            vec![Effect::StartConversation { me, target }]
        }
        Action::ConversationStarted(Ok(started)) => {
            app.user_search.close();
            if started.created {
                app.notify(Notice::success(
                    "Conversation created",
                    "You can now start chatting!",
                ));
            }
            let mut effects = load_conversations(app);
            effects.extend(select_conversation(app, started.id));
            effects
        }
        Action::ConversationStarted(Err(e)) => {
            warn!("Starting conversation failed: {}", e);
            app.user_search.on_create_failed();
            app.notify(Notice::error("Failed to create conversation"));
            Vec::new()
        }
        Action::DeleteConversation(id) => {
            if app.conversations.mark_deleting(id) {
                vec![Effect::DeleteConversation(id)]
            } else {
                Vec::new()
            }
        }
        Action::ConversationDeleted { id, result } => match result {
            Ok(()) => {
                app.conversations.on_deleted(id);
                app.notify(Notice::success(
                    "Conversation deleted",
                    "The conversation and its messages were removed.",
                ));
                if app.thread.conversation_id() == Some(id) {
                    app.composer.reset();
                    effects(app.thread.close())
                } else {
                    Vec::new()
                }
            }
            Err(e) => {
                warn!("Deleting conversation {} failed: {}", id, e);
                app.conversations.on_delete_failed(id);
                app.notify(Notice::error("Failed to delete conversation"));
                Vec::new()
            }
        },
        Action::ClearConversation(id) => vec![Effect::ClearConversation(id)],
        Action::ConversationCleared { id, result } => {
            match result {
                Ok(()) => {
                    app.thread.clear_messages(id);
                    app.conversations.clear_preview(id);
                    app.notify(Notice::success(
                        "Conversation cleared",
                        "All messages have been deleted.",
                    ));
                }
                Err(e) => {
                    warn!("Clearing conversation {} failed: {}", id, e);
                    app.notify(Notice::error("Failed to clear conversation"));
                }
            }
            Vec::new()
        }

        // ====================================================================
        // Thread
        // ====================================================================
        Action::HistoryLoaded { generation, result } => {
            let failed = result.is_err();
            if app.thread.on_history(generation, result) {
                if failed {
                    app.notify(Notice::error("Failed to load messages"));
                }
                history_changed(app);
            }
            Vec::new()
        }
        Action::Subscribed { generation, handle } => {
            effects(app.thread.on_subscribed(generation, handle))
        }
        Action::SubscribeFailed { generation, error } => {
            warn!("Subscribe for generation {} failed: {}", generation, error);
            app.thread.on_subscribe_failed(generation);
            Vec::new()
        }
        Action::FeedEvent {
            subscription_id,
            event,
        } => {
            let changed = match event {
                ChangeEvent::Insert(message) => {
                    let (id, preview, at) = (
                        message.conversation_id,
                        message.content.clone(),
                        message.created_at,
                    );
                    let inserted = app.thread.on_insert(subscription_id, message);
                    if inserted {
                        app.conversations.touch(id, &preview, at);
                    }
                    inserted
                }
                ChangeEvent::Update(message) => app.thread.on_update(subscription_id, message),
                ChangeEvent::Delete { id } => app.thread.on_delete(subscription_id, id),
            };
            if changed {
                history_changed(app);
            }
            Vec::new()
        }

        // ====================================================================
        // Composer
        // ====================================================================
        Action::DraftChanged(text) => {
            app.composer.set_text(text);
            draft_changed(app);
            Vec::new()
        }
        Action::SubmitDraft => {
            let conversation_id = app.thread.conversation_id();
            let Some(conversation_id) = conversation_id else {
                return Vec::new();
            };
            match app.composer.submit(Some(conversation_id)) {
                Submission::Send(content) => match app.user_id() {
                    Some(user_id) => vec![Effect::SendMessage(NewMessage {
                        content,
                        user_id,
                        conversation_id,
                    })],
                    None => {
                        app.composer.on_submit_failed(conversation_id);
                        Vec::new()
                    }
                },
                Submission::Edit { id, content } => vec![Effect::EditMessage {
                    conversation_id,
                    id,
                    content,
                }],
                Submission::EditCancelled | Submission::Nothing => Vec::new(),
            }
        }
        Action::MessageSent {
            conversation_id,
            result: Ok(message),
        } => {
            app.conversations
                .touch(message.conversation_id, &message.content, message.created_at);
            if !app.composer.on_submitted(conversation_id) {
                debug!("Late send ack for {} ignored by the composer", conversation_id);
                return Vec::new();
            }
            app.emoji.close();
            if app.thread.merge_sent(message) {
                history_changed(app);
            }
            draft_changed(app);
            Vec::new()
        }
        Action::MessageSent {
            conversation_id,
            result: Err(e),
        } => {
            warn!("Send to {} failed: {}", conversation_id, e);
            app.composer.on_submit_failed(conversation_id);
            app.notify(Notice::error("Failed to send message"));
            Vec::new()
        }
        Action::BeginEdit(id) => {
            let (Some(me), Some(message)) = (app.user_id(), app.thread.find(id).cloned()) else {
                return Vec::new();
            };
            if !app.composer.begin_edit(&message, me) {
                app.notify(Notice::warning(
                    "Cannot edit",
                    "You can only edit your own messages",
                ));
            }
            Vec::new()
        }
        Action::CancelEdit => {
            app.composer.cancel_edit();
            Vec::new()
        }
        Action::MessageEdited {
            conversation_id,
            id,
            content,
            result,
        } => {
            match result {
                Ok(()) => {
                    if !app.composer.on_submitted(conversation_id) {
                        debug!("Late edit ack for {} ignored", id);
                        return Vec::new();
                    }
                    if let Some(mut message) = app.thread.find(id).cloned() {
                        message.content = content;
                        message.is_edited = true;
                        message.updated_at = Some(Utc::now());
                        app.thread.replace(message);
                        history_changed(app);
                    }
                }
                Err(e) => {
                    warn!("Edit of {} failed: {}", id, e);
                    app.composer.on_submit_failed(conversation_id);
                    app.notify(Notice::error("Failed to edit message"));
                }
            }
            Vec::new()
        }
        Action::PickEmoji => {
            let emoji = app.emoji.pick();
            app.composer.append(emoji);
            draft_changed(app);
            Vec::new()
        }
        Action::SelectText(selection) => {
            app.selection = selection.filter(|s| !s.trim().is_empty());
            draft_changed(app);
            Vec::new()
        }

        // ====================================================================
        // Copilot
        // ====================================================================
        Action::RunCannedAction(action) => {
            let history = app.thread.history_lines();
            match app
                .copilot
                .run_action(action, app.selection.as_deref(), &history)
            {
                Ok(request) => request.map(Effect::Generate).into_iter().collect(),
                Err(notice) => {
                    app.notify(notice);
                    Vec::new()
                }
            }
        }
        Action::Translate(language) => {
            let history = app.thread.history_lines();
            match app
                .copilot
                .translate(&language, app.selection.as_deref(), &history)
            {
                Ok(request) => vec![Effect::Generate(request)],
                Err(notice) => {
                    app.notify(notice);
                    Vec::new()
                }
            }
        }
        Action::ApplyInstructions => {
            match app.copilot.apply_instructions(app.selection.as_deref()) {
                Ok(request) => request.map(Effect::Generate).into_iter().collect(),
                Err(notice) => {
                    app.notify(notice);
                    Vec::new()
                }
            }
        }
        Action::UseSuggestion => {
            if let Some(suggestion) = app.copilot.take_suggestion() {
                app.composer.replace(suggestion);
                draft_changed(app);
            }
            Vec::new()
        }
        Action::SubmitCopilotChat => app
            .copilot
            .submit_chat()
            .map(Effect::Generate)
            .into_iter()
            .collect(),
        Action::InsertReply(index) => {
            if let Some(reply) = app.copilot.reply(index).map(str::to_string) {
                app.composer.append(&reply);
                draft_changed(app);
            }
            Vec::new()
        }
        Action::ReconnectCopilot => match app.copilot.reconnect() {
            Some(request) => vec![Effect::Generate(request)],
            None => {
                app.notify(Notice::info("Nothing to retry"));
                Vec::new()
            }
        },
        Action::CopilotResult {
            seq,
            purpose,
            result,
        } => {
            match app.copilot.resolve(seq, &purpose, result) {
                Resolution::ReplaceDraft { text, notice } => {
                    app.composer.replace(text);
                    app.notify(notice);
                    draft_changed(app);
                }
                Resolution::AppendToDraft { text, notice } => {
                    app.composer.append(&text);
                    app.notify(notice);
                    draft_changed(app);
                }
                Resolution::Failed {
                    notice: Some(notice),
                } => app.notify(notice),
                Resolution::Failed { notice: None } | Resolution::Updated | Resolution::Stale => {}
            }
            Vec::new()
        }
    }
}

/// Applies the guard and returns what the new screen needs loaded.
fn navigate(app: &mut App, route: Route) -> Vec<Effect> {
    app.route = route;
    let shown = match app.screen() {
        Guarded::Loading => return Vec::new(),
        Guarded::Show(shown) => shown,
    };
    if shown != route {
        info!("Redirecting {} to {}", route.path(), shown.path());
        app.route = shown;
    }
    match shown {
        Route::Login => app.auth_form.set_mode(AuthMode::SignIn),
        Route::Register => app.auth_form.set_mode(AuthMode::SignUp),
        _ => {}
    }

    let Some(me) = app.user_id() else {
        return Vec::new();
    };
    let mut effects = Vec::new();
    if matches!(shown, Route::Chat | Route::Profile) && app.me().is_none() {
        effects.push(Effect::FetchProfile(me));
    }
    if shown == Route::Chat && app.conversations.items().is_empty() {
        effects.extend(load_conversations(app));
    }
    effects
}

fn begin_session(app: &mut App, session: AuthSession) -> Vec<Effect> {
    if app.user_id().is_some_and(|id| id != session.user.id) {
        app.clear_user_state();
    }
    app.session = Some(session);
    Vec::new()
}

fn load_conversations(app: &mut App) -> Vec<Effect> {
    let Some(me) = app.user_id() else {
        return Vec::new();
    };
    if app.conversations.is_loading() {
        return Vec::new();
    }
    app.conversations.begin_load();
    vec![Effect::LoadConversations(me)]
}

fn select_conversation(app: &mut App, id: Uuid) -> Vec<Effect> {
    app.conversations.select(id);
    if app.thread.conversation_id() == Some(id) {
        return Vec::new();
    }
    app.composer.reset();
    app.emoji.close();
    app.copilot.leave_conversation();
    app.selection = None;
    effects(app.thread.select(id))
}

fn draft_changed(app: &mut App) {
    app.copilot.draft_changed(app.composer.text(), Instant::now());
}

fn history_changed(app: &mut App) {
    app.copilot
        .history_changed(app.thread.messages().len(), Instant::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AuthUser;
    use crate::core::thread::Subscription;
    use crate::core::toast::ToastLevel;
    use crate::test_support::{test_app, test_session};
    use chrono::{TimeZone, Utc};

    fn signed_in() -> (App, Uuid) {
        let mut app = test_app();
        let session = test_session();
        let me = session.user.id;
        update(&mut app, Action::SessionRestored(Some(session)));
        (app, me)
    }

    fn message(conversation_id: Uuid, user_id: Uuid, secs: i64, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            content: content.to_string(),
            user_id,
            conversation_id,
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            is_edited: false,
            updated_at: None,
        }
    }

    fn handle(id: u64) -> SubscriptionHandle {
        SubscriptionHandle {
            id,
            topic: format!("realtime:messages:{id}"),
        }
    }

    /// Selects a conversation and activates its subscription.
    fn open_thread(app: &mut App, conversation: Uuid, sub: u64) {
        update(app, Action::SelectConversation(conversation));
        let generation = app.thread.generation();
        let effects = update(
            app,
            Action::Subscribed {
                generation,
                handle: handle(sub),
            },
        );
        assert!(effects.is_empty());
    }

    fn last_toast(app: &App) -> (ToastLevel, String, Option<String>) {
        let toast = app.toasts.latest().expect("no toast");
        (
            toast.notice.level,
            toast.notice.title.clone(),
            toast.notice.description.clone(),
        )
    }

    #[test]
    fn test_protected_route_redirects_without_session() {
        let mut app = test_app();
        let effects = update(&mut app, Action::Navigate(Route::Profile));
        assert!(effects.is_empty());
        assert_eq!(app.route, Route::Login);
    }

    #[test]
    fn test_restore_keeps_requested_route() {
        let mut app = test_app();
        assert_eq!(start(&mut app), vec![Effect::RestoreSession]);
        assert_eq!(app.screen(), Guarded::Loading);

        let session = test_session();
        let me = session.user.id;
        let effects = update(&mut app, Action::SessionRestored(Some(session)));
        assert_eq!(app.route, Route::Chat);
        assert_eq!(
            effects,
            vec![Effect::FetchProfile(me), Effect::LoadConversations(me)]
        );
    }

    #[test]
    fn test_failed_restore_redirects_to_login() {
        let mut app = test_app();
        start(&mut app);
        update(&mut app, Action::SessionRestored(None));
        assert_eq!(app.route, Route::Login);
        assert!(!app.restoring);
    }

    #[test]
    fn test_sign_up_without_username_makes_no_call() {
        let mut app = test_app();
        update(&mut app, Action::Navigate(Route::Register));
        app.auth_form.email = "ann@example.com".into();
        app.auth_form.password = "hunter22".into();
        app.auth_form.username = "  ".into();

        let effects = update(&mut app, Action::SubmitAuth);
        assert!(effects.is_empty());
        assert_eq!(last_toast(&app).2.as_deref(), Some("Username is required"));
    }

    #[test]
    fn test_sign_in_flow() {
        let mut app = test_app();
        update(&mut app, Action::Navigate(Route::Login));
        app.auth_form.email = "ann@example.com".into();
        app.auth_form.password = "hunter22".into();
        let effects = update(&mut app, Action::SubmitAuth);
        assert!(matches!(effects.as_slice(), [Effect::SignIn { .. }]));
        assert!(update(&mut app, Action::SubmitAuth).is_empty());

        let session = test_session();
        let me = session.user.id;
        let effects = update(&mut app, Action::SignedIn(Ok(session.clone())));
        assert_eq!(
            effects,
            vec![
                Effect::PersistSession(session),
                Effect::FetchProfile(me),
                Effect::LoadConversations(me),
            ]
        );
        assert_eq!(app.route, Route::Chat);
        assert_eq!(last_toast(&app).1, "Welcome back!");
    }

    #[test]
    fn test_sign_up_requiring_confirmation_goes_to_login() {
        let mut app = test_app();
        update(&mut app, Action::Navigate(Route::Register));
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some("ann@example.com".into()),
        };
        let effects = update(
            &mut app,
            Action::SignedUp(Ok(SignUpOutcome::ConfirmationRequired(user))),
        );
        assert!(effects.is_empty());
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.auth_form.mode, AuthMode::SignIn);
        assert_eq!(last_toast(&app).1, "Account created!");
    }

    #[test]
    fn test_sign_out_closes_feed_and_clears_state() {
        let (mut app, _) = signed_in();
        let conversation = Uuid::new_v4();
        open_thread(&mut app, conversation, 7);

        let effects = update(&mut app, Action::SignOut);
        assert_eq!(effects[0], Effect::CloseFeed(handle(7)));
        assert!(effects.contains(&Effect::ForgetSession));
        assert!(matches!(effects[1], Effect::SignOut { .. }));

        update(&mut app, Action::SignedOut(Ok(())));
        assert!(app.session.is_none());
        assert_eq!(app.route, Route::Login);
        assert!(app.thread.conversation_id().is_none());
        assert_eq!(last_toast(&app).1, "Signed out");
    }

    #[test]
    fn test_blank_draft_makes_no_call() {
        let (mut app, _) = signed_in();
        open_thread(&mut app, Uuid::new_v4(), 1);
        for draft in ["", "   ", "\n\t"] {
            update(&mut app, Action::DraftChanged(draft.into()));
            assert!(update(&mut app, Action::SubmitDraft).is_empty());
        }
    }

    #[test]
    fn test_draft_without_conversation_makes_no_call() {
        let (mut app, _) = signed_in();
        update(&mut app, Action::DraftChanged("hello".into()));
        assert!(update(&mut app, Action::SubmitDraft).is_empty());
    }

    #[test]
    fn test_send_then_ack_clears_draft_and_merges() {
        let (mut app, me) = signed_in();
        let conversation = Uuid::new_v4();
        open_thread(&mut app, conversation, 1);
        update(&mut app, Action::DraftChanged("  hi there  ".into()));

        let effects = update(&mut app, Action::SubmitDraft);
        assert_eq!(
            effects,
            vec![Effect::SendMessage(NewMessage {
                content: "hi there".into(),
                user_id: me,
                conversation_id: conversation,
            })]
        );
        // Second Enter while in flight does nothing.
        assert!(update(&mut app, Action::SubmitDraft).is_empty());

        let sent = message(conversation, me, 5, "hi there");
        update(
            &mut app,
            Action::MessageSent {
                conversation_id: conversation,
                result: Ok(sent.clone()),
            },
        );
        assert_eq!(app.composer.text(), "");
        // The feed echo of the same row is deduplicated.
        update(
            &mut app,
            Action::FeedEvent {
                subscription_id: 1,
                event: ChangeEvent::Insert(sent),
            },
        );
        assert_eq!(app.thread.messages().len(), 1);
    }

    #[test]
    fn test_send_failure_keeps_draft() {
        let (mut app, _) = signed_in();
        let conversation = Uuid::new_v4();
        open_thread(&mut app, conversation, 1);
        update(&mut app, Action::DraftChanged("keep me".into()));
        update(&mut app, Action::SubmitDraft);
        update(
            &mut app,
            Action::MessageSent {
                conversation_id: conversation,
                result: Err("HTTP 500".into()),
            },
        );
        assert_eq!(app.composer.text(), "keep me");
        assert!(!app.composer.is_sending());
        assert_eq!(last_toast(&app).2.as_deref(), Some("Failed to send message"));
    }

    #[test]
    fn test_ack_after_switching_keeps_new_draft() {
        let (mut app, me) = signed_in();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        open_thread(&mut app, a, 1);
        update(&mut app, Action::DraftChanged("hello A".into()));
        assert_eq!(update(&mut app, Action::SubmitDraft).len(), 1);

        open_thread(&mut app, b, 2);
        update(&mut app, Action::DraftChanged("for B".into()));
        assert_eq!(
            update(&mut app, Action::SubmitDraft),
            vec![Effect::SendMessage(NewMessage {
                content: "for B".into(),
                user_id: me,
                conversation_id: b,
            })]
        );
        update(&mut app, Action::DraftChanged("half-typed for B".into()));

        update(
            &mut app,
            Action::MessageSent {
                conversation_id: a,
                result: Ok(message(a, me, 5, "hello A")),
            },
        );
        assert_eq!(app.composer.text(), "half-typed for B");
        assert!(app.composer.is_sending(), "B's send is still in flight");
        assert!(update(&mut app, Action::SubmitDraft).is_empty());
        assert!(app.thread.messages().is_empty());

        update(
            &mut app,
            Action::MessageEdited {
                conversation_id: a,
                id: Uuid::new_v4(),
                content: "edited in A".into(),
                result: Ok(()),
            },
        );
        assert_eq!(app.composer.text(), "half-typed for B");
        assert!(app.composer.is_sending());
    }

    #[test]
    fn test_rewrite_after_switching_is_discarded() {
        let (mut app, _) = signed_in();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        open_thread(&mut app, a, 1);
        update(&mut app, Action::SelectText(Some("text from A".into())));
        let effects = update(&mut app, Action::RunCannedAction(CannedAction::Formal));
        let [Effect::Generate(request)] = &effects[..] else {
            panic!("expected one request, got {:?}", effects);
        };

        open_thread(&mut app, b, 2);
        update(&mut app, Action::DraftChanged("my B draft".into()));
        update(
            &mut app,
            Action::CopilotResult {
                seq: request.seq,
                purpose: request.purpose.clone(),
                result: Ok("Formal text from A".into()),
            },
        );
        assert_eq!(app.composer.text(), "my B draft");
    }

    #[test]
    fn test_refreshed_session_replaces_token() {
        let (mut app, me) = signed_in();
        let mut fresh = app.session.clone().unwrap();
        fresh.access_token = "refreshed-token".into();
        update(&mut app, Action::SessionRefreshed(fresh));
        assert_eq!(app.session.as_ref().unwrap().access_token, "refreshed-token");
        assert_eq!(app.user_id(), Some(me));
    }

    #[test]
    fn test_lost_session_signs_out() {
        let (mut app, _) = signed_in();
        open_thread(&mut app, Uuid::new_v4(), 1);
        let effects = update(&mut app, Action::SessionLost);
        assert_eq!(effects[0], Effect::CloseFeed(handle(1)));
        assert!(app.session.is_none());
        assert!(app.thread.conversation_id().is_none());
        assert_eq!(app.route, Route::Login);
        assert_eq!(last_toast(&app).1, "Session expired");
    }

    #[test]
    fn test_switching_twice_leaves_one_subscription() {
        let (mut app, _) = signed_in();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        open_thread(&mut app, a, 1);

        let to_b = update(&mut app, Action::SelectConversation(b));
        assert_eq!(to_b[0], Effect::CloseFeed(handle(1)));
        let generation_b = app.thread.generation();
        let to_c = update(&mut app, Action::SelectConversation(c));
        assert!(!to_c.iter().any(|e| matches!(e, Effect::CloseFeed(_))));

        // B's subscription answers late and is closed straight away.
        let late = update(
            &mut app,
            Action::Subscribed {
                generation: generation_b,
                handle: handle(2),
            },
        );
        assert_eq!(late, vec![Effect::CloseFeed(handle(2))]);

        // B's history answers late and is ignored.
        update(
            &mut app,
            Action::HistoryLoaded {
                generation: generation_b,
                result: Ok(vec![message(b, Uuid::new_v4(), 1, "old")]),
            },
        );
        assert!(app.thread.messages().is_empty());

        let generation_c = app.thread.generation();
        update(
            &mut app,
            Action::Subscribed {
                generation: generation_c,
                handle: handle(3),
            },
        );
        assert_eq!(app.thread.subscription(), &Subscription::Active(handle(3)));
    }

    #[test]
    fn test_live_insert_touches_list() {
        let (mut app, me) = signed_in();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let summary = |id: Uuid, secs: i64| ConversationSummary {
            id,
            last_message: None,
            last_message_at: Some(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()),
            updated_at: None,
            other_user: None,
        };
        update(
            &mut app,
            Action::ConversationsLoaded(Ok(vec![summary(a, 10), summary(b, 20)])),
        );
        open_thread(&mut app, a, 4);

        update(
            &mut app,
            Action::FeedEvent {
                subscription_id: 4,
                event: ChangeEvent::Insert(message(a, me, 30, "newest")),
            },
        );
        assert_eq!(app.conversations.items()[0].id, a);
        assert_eq!(app.conversations.items()[0].preview(), "newest");
    }

    #[test]
    fn test_delete_failure_keeps_entry() {
        let (mut app, _) = signed_in();
        let id = Uuid::new_v4();
        update(
            &mut app,
            Action::ConversationsLoaded(Ok(vec![ConversationSummary {
                id,
                last_message: None,
                last_message_at: None,
                updated_at: None,
                other_user: None,
            }])),
        );

        assert_eq!(
            update(&mut app, Action::DeleteConversation(id)),
            vec![Effect::DeleteConversation(id)]
        );
        assert!(update(&mut app, Action::DeleteConversation(id)).is_empty());
        update(
            &mut app,
            Action::ConversationDeleted {
                id,
                result: Err("HTTP 403".into()),
            },
        );
        assert!(app.conversations.get(id).is_some());
        assert!(!app.conversations.is_deleting(id));

        update(&mut app, Action::DeleteConversation(id));
        update(&mut app, Action::ConversationDeleted { id, result: Ok(()) });
        assert!(app.conversations.get(id).is_none());
    }

    #[test]
    fn test_deleting_active_conversation_closes_thread() {
        let (mut app, _) = signed_in();
        let id = Uuid::new_v4();
        update(
            &mut app,
            Action::ConversationsLoaded(Ok(vec![ConversationSummary {
                id,
                last_message: None,
                last_message_at: None,
                updated_at: None,
                other_user: None,
            }])),
        );
        open_thread(&mut app, id, 9);
        update(&mut app, Action::DeleteConversation(id));
        let effects = update(&mut app, Action::ConversationDeleted { id, result: Ok(()) });
        assert_eq!(effects, vec![Effect::CloseFeed(handle(9))]);
        assert!(app.thread.conversation_id().is_none());
    }

    #[test]
    fn test_started_conversation_is_selected() {
        let (mut app, me) = signed_in();
        app.user_search.open();
        let target = Uuid::new_v4();
        assert_eq!(
            update(&mut app, Action::StartConversation(target)),
            vec![Effect::StartConversation { me, target }]
        );
        // The initial list load from the restore already finished.
        update(&mut app, Action::ConversationsLoaded(Ok(Vec::new())));

        let id = Uuid::new_v4();
        let effects = update(
            &mut app,
            Action::ConversationStarted(Ok(StartedConversation { id, created: true })),
        );
        assert_eq!(effects[0], Effect::LoadConversations(me));
        assert!(effects.contains(&Effect::FetchHistory {
            conversation_id: id,
            generation: app.thread.generation(),
        }));
        assert!(!app.user_search.open);
        assert_eq!(app.conversations.selected(), Some(id));
        assert_eq!(last_toast(&app).1, "Conversation created");
    }

    #[test]
    fn test_canned_action_without_selection() {
        let (mut app, _) = signed_in();
        let effects = update(&mut app, Action::RunCannedAction(CannedAction::Formal));
        assert!(effects.is_empty());
        assert_eq!(last_toast(&app).1, "No text selected");
    }

    #[test]
    fn test_canned_action_replaces_draft() {
        let (mut app, _) = signed_in();
        update(&mut app, Action::DraftChanged("hey whats up".into()));
        update(&mut app, Action::SelectText(Some("hey whats up".into())));
        let effects = update(&mut app, Action::RunCannedAction(CannedAction::Formal));
        let Some(Effect::Generate(request)) = effects.first() else {
            panic!("expected a generation request, got {:?}", effects);
        };

        update(
            &mut app,
            Action::CopilotResult {
                seq: request.seq,
                purpose: request.purpose.clone(),
                result: Ok("Good afternoon. How are you?".into()),
            },
        );
        assert_eq!(app.composer.text(), "Good afternoon. How are you?");
        assert_eq!(last_toast(&app).1, "AI Action Complete");
    }

    #[test]
    fn test_failed_action_leaves_draft_untouched() {
        let (mut app, _) = signed_in();
        update(&mut app, Action::DraftChanged("original".into()));
        update(&mut app, Action::SelectText(Some("original".into())));
        let effects = update(&mut app, Action::RunCannedAction(CannedAction::Expand));
        let Some(Effect::Generate(request)) = effects.first() else {
            panic!("expected a generation request");
        };
        update(
            &mut app,
            Action::CopilotResult {
                seq: request.seq,
                purpose: request.purpose.clone(),
                result: Err("quota".into()),
            },
        );
        assert_eq!(app.composer.text(), "original");
        assert_eq!(
            last_toast(&app).2.as_deref(),
            Some("Failed to process text with AI")
        );

        let retry = update(&mut app, Action::ReconnectCopilot);
        assert!(matches!(retry.as_slice(), [Effect::Generate(r)] if r.seq > request.seq));
    }

    #[test]
    fn test_edit_own_message() {
        let (mut app, me) = signed_in();
        let conversation = Uuid::new_v4();
        open_thread(&mut app, conversation, 1);
        let mine = message(conversation, me, 1, "helo");
        let theirs = message(conversation, Uuid::new_v4(), 2, "hi");
        let generation = app.thread.generation();
        update(
            &mut app,
            Action::HistoryLoaded {
                generation,
                result: Ok(vec![mine.clone(), theirs.clone()]),
            },
        );

        update(&mut app, Action::BeginEdit(theirs.id));
        assert!(app.composer.editing().is_none());

        update(&mut app, Action::BeginEdit(mine.id));
        update(&mut app, Action::DraftChanged("hello".into()));
        let effects = update(&mut app, Action::SubmitDraft);
        assert_eq!(
            effects,
            vec![Effect::EditMessage {
                conversation_id: conversation,
                id: mine.id,
                content: "hello".into()
            }]
        );
        update(
            &mut app,
            Action::MessageEdited {
                conversation_id: conversation,
                id: mine.id,
                content: "hello".into(),
                result: Ok(()),
            },
        );
        let edited = app.thread.find(mine.id).unwrap();
        assert_eq!(edited.content, "hello");
        assert!(edited.is_edited);
    }

    #[test]
    fn test_pick_emoji_appends() {
        let (mut app, _) = signed_in();
        update(&mut app, Action::DraftChanged("nice ".into()));
        app.emoji.toggle();
        update(&mut app, Action::PickEmoji);
        assert_eq!(app.composer.text(), "nice 😀");
        assert!(!app.emoji.open);
    }

    #[test]
    fn test_profile_save_requires_username() {
        let (mut app, me) = signed_in();
        update(
            &mut app,
            Action::ProfileLoaded(Ok(Profile {
                id: me,
                username: "ann".into(),
                full_name: None,
                avatar_url: None,
                status: None,
            })),
        );
        app.profile.begin_edit();
        app.profile.username = " ".into();
        assert!(update(&mut app, Action::SaveProfile).is_empty());

        app.profile.username = "annie".into();
        let effects = update(&mut app, Action::SaveProfile);
        assert!(matches!(
            effects.as_slice(),
            [Effect::SaveProfile { user_id, .. }] if *user_id == me
        ));
        update(
            &mut app,
            Action::ProfileSaved(Err("HTTP 409".into())),
        );
        assert_eq!(last_toast(&app).2.as_deref(), Some("Failed to update profile"));
        assert!(!app.profile.is_saving());
    }
}
