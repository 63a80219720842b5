//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::backend::{
    AuthService, AuthSession, AuthUser, BackendError, ChangeEvent, ChangeFeed, ChatStore,
    ConversationSummary, FeedFilter, FeedSink, Message, NewMessage, Profile, ProfileUpdate,
    SignUpOutcome, SignUpProfile, SubscriptionHandle,
};
use crate::core::route::Route;
use crate::core::state::App;
use crate::inference::{GenerationProvider, ProviderError};

/// Creates a test App that starts on the chat screen.
pub fn test_app() -> App {
    App::new(
        Route::Chat,
        Duration::from_secs(4),
        Duration::from_millis(1000),
    )
}

/// A live session for a fresh user, valid for an hour.
pub fn test_session() -> AuthSession {
    AuthSession {
        access_token: "access-token".to_string(),
        refresh_token: "refresh-token".to_string(),
        expires_at: Utc::now().timestamp() + 3600,
        user: AuthUser {
            id: Uuid::new_v4(),
            email: Some("ann@example.com".to_string()),
        },
    }
}

pub fn test_profile(id: Uuid, username: &str) -> Profile {
    Profile {
        id,
        username: username.to_string(),
        full_name: None,
        avatar_url: None,
        status: None,
    }
}

// ============================================================================
// ChatStore
// ============================================================================

#[derive(Default)]
struct StoreState {
    /// Conversation id → participants, in insertion order.
    conversations: HashMap<Uuid, Vec<Uuid>>,
    messages: Vec<Message>,
    profiles: Vec<Profile>,
    failing: HashSet<String>,
    calls: usize,
    token: Option<String>,
    /// Bearer token the tables answer 401 to.
    rejected_token: Option<String>,
}

/// In-memory chat tables.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    /// Counts the call and fails it if `fail_next(op)` was armed.
    fn enter(&self, op: &str) -> Result<MutexGuard<'_, StoreState>, BackendError> {
        let mut state = self.lock();
        state.calls += 1;
        if state.token.is_some() && state.token == state.rejected_token {
            return Err(BackendError::Auth("JWT expired".to_string()));
        }
        if state.failing.remove(op) {
            return Err(BackendError::Api {
                status: 500,
                message: format!("{op} failed"),
            });
        }
        Ok(state)
    }

    pub fn seed_conversation(&self, members: &[Uuid]) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().conversations.insert(id, members.to_vec());
        id
    }

    pub fn seed_profile(&self, profile: Profile) {
        self.lock().profiles.push(profile);
    }

    pub fn conversation_count(&self) -> usize {
        self.lock().conversations.len()
    }

    pub fn participants_of(&self, id: Uuid) -> Vec<Uuid> {
        self.lock().conversations.get(&id).cloned().unwrap_or_default()
    }

    pub fn messages_in(&self, id: Uuid) -> Vec<Message> {
        self.lock()
            .messages
            .iter()
            .filter(|m| m.conversation_id == id)
            .cloned()
            .collect()
    }

    /// Makes the next call to `op` fail with HTTP 500.
    pub fn fail_next(&self, op: &str) {
        self.lock().failing.insert(op.to_string());
    }

    /// Answers every call made with `token` with 401.
    pub fn reject_token(&self, token: &str) {
        self.lock().rejected_token = Some(token.to_string());
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }
}

#[async_trait]
impl ChatStore for FakeStore {
    fn set_access_token(&self, token: Option<String>) {
        self.lock().token = token;
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile, BackendError> {
        let state = self.enter("fetch_profile")?;
        state
            .profiles
            .iter()
            .find(|p| p.id == user_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("profile {user_id}")))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<(), BackendError> {
        let mut state = self.enter("update_profile")?;
        let profile = state
            .profiles
            .iter_mut()
            .find(|p| p.id == user_id)
            .ok_or_else(|| BackendError::NotFound(format!("profile {user_id}")))?;
        profile.username = update.username.clone();
        profile.full_name = update.full_name.clone();
        Ok(())
    }

    async fn search_profiles(
        &self,
        query: &str,
        exclude: Uuid,
        limit: usize,
    ) -> Result<Vec<Profile>, BackendError> {
        let state = self.enter("search_profiles")?;
        let needle = query.to_lowercase();
        Ok(state
            .profiles
            .iter()
            .filter(|p| p.id != exclude && p.username.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, BackendError> {
        let state = self.enter("list_conversations")?;
        Ok(state
            .conversations
            .iter()
            .filter(|(_, members)| members.contains(&user_id))
            .map(|(id, members)| {
                let last = state
                    .messages
                    .iter()
                    .filter(|m| m.conversation_id == *id)
                    .max_by_key(|m| m.created_at);
                let other_user = members
                    .iter()
                    .find(|m| **m != user_id)
                    .and_then(|other| state.profiles.iter().find(|p| p.id == *other))
                    .cloned();
                ConversationSummary {
                    id: *id,
                    last_message: last.map(|m| m.content.clone()),
                    last_message_at: last.map(|m| m.created_at),
                    updated_at: None,
                    other_user,
                }
            })
            .collect())
    }

    async fn find_shared_conversation(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<Uuid>, BackendError> {
        let state = self.enter("find_shared_conversation")?;
        let mut shared: Vec<Uuid> = state
            .conversations
            .iter()
            .filter(|(_, members)| members.contains(&a) && members.contains(&b))
            .map(|(id, _)| *id)
            .collect();
        shared.sort();
        Ok(shared.first().copied())
    }

    async fn create_conversation(&self) -> Result<Uuid, BackendError> {
        let mut state = self.enter("create_conversation")?;
        let id = Uuid::new_v4();
        state.conversations.insert(id, Vec::new());
        Ok(id)
    }

    async fn add_participants(
        &self,
        conversation_id: Uuid,
        users: &[Uuid],
    ) -> Result<(), BackendError> {
        let mut state = self.enter("add_participants")?;
        let members = state
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| BackendError::NotFound(format!("conversation {conversation_id}")))?;
        members.extend_from_slice(users);
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), BackendError> {
        let mut state = self.enter("delete_conversation")?;
        if state.conversations.remove(&conversation_id).is_none() {
            return Err(BackendError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }
        state.messages.retain(|m| m.conversation_id != conversation_id);
        Ok(())
    }

    async fn clear_conversation(&self, conversation_id: Uuid) -> Result<(), BackendError> {
        let mut state = self.enter("clear_conversation")?;
        state.messages.retain(|m| m.conversation_id != conversation_id);
        Ok(())
    }

    async fn fetch_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, BackendError> {
        let state = self.enter("fetch_messages")?;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn send_message(&self, message: &NewMessage) -> Result<Message, BackendError> {
        let mut state = self.enter("send_message")?;
        let stored = Message {
            id: Uuid::new_v4(),
            content: message.content.clone(),
            user_id: message.user_id,
            conversation_id: message.conversation_id,
            created_at: Utc::now(),
            is_edited: false,
            updated_at: None,
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn edit_message(&self, id: Uuid, content: &str) -> Result<(), BackendError> {
        let mut state = self.enter("edit_message")?;
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("message {id}")))?;
        message.content = content.to_string();
        message.is_edited = true;
        message.updated_at = Some(Utc::now());
        Ok(())
    }
}

// ============================================================================
// AuthService
// ============================================================================

/// Accepts any password except `"wrong"`.
pub struct FakeAuth {
    session: AuthSession,
    fail_refresh: bool,
    revoked: bool,
    refreshes: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl FakeAuth {
    pub fn new(session: AuthSession) -> Self {
        Self {
            session,
            fail_refresh: false,
            revoked: false,
            refreshes: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub fn failing_refresh(mut self) -> Self {
        self.fail_refresh = true;
        self
    }

    /// The user no longer exists: `current_user` answers 401.
    pub fn revoked(mut self) -> Self {
        self.revoked = true;
        self
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn sign_in(&self, _email: &str, password: &str) -> Result<AuthSession, BackendError> {
        if password == "wrong" {
            return Err(BackendError::Auth("Invalid login credentials".to_string()));
        }
        Ok(self.session.clone())
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, BackendError> {
        Ok(SignUpOutcome::ConfirmationRequired(self.session.user.clone()))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), BackendError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<AuthSession, BackendError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh {
            return Err(BackendError::Auth("Invalid Refresh Token".to_string()));
        }
        Ok(AuthSession {
            access_token: "refreshed-token".to_string(),
            expires_at: Utc::now().timestamp() + 3600,
            ..self.session.clone()
        })
    }

    async fn current_user(&self, _access_token: &str) -> Result<AuthUser, BackendError> {
        if self.revoked {
            return Err(BackendError::Auth("User not found".to_string()));
        }
        Ok(self.session.user.clone())
    }
}

// ============================================================================
// ChangeFeed
// ============================================================================

/// Subscriptions held in memory; `emit` pushes an event to every open one.
#[derive(Default)]
pub struct FakeFeed {
    next_id: AtomicU64,
    sinks: Mutex<HashMap<u64, (FeedFilter, FeedSink)>>,
    token: Mutex<Option<String>>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn filters(&self) -> Vec<FeedFilter> {
        self.sinks
            .lock()
            .unwrap()
            .values()
            .map(|(filter, _)| filter.clone())
            .collect()
    }

    /// Returns how many subscriptions received the event.
    pub fn emit(&self, event: ChangeEvent) -> usize {
        self.sinks
            .lock()
            .unwrap()
            .values()
            .filter(|(_, sink)| sink.send(event.clone()).is_ok())
            .count()
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeFeed for FakeFeed {
    fn set_access_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    async fn open(
        &self,
        filter: FeedFilter,
        sink: FeedSink,
    ) -> Result<SubscriptionHandle, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let topic = format!("realtime:{}:{}:{}", filter.table, filter.value, id);
        self.sinks.lock().unwrap().insert(id, (filter, sink));
        Ok(SubscriptionHandle { id, topic })
    }

    async fn close(&self, handle: SubscriptionHandle) -> Result<(), BackendError> {
        self.sinks.lock().unwrap().remove(&handle.id);
        Ok(())
    }
}

// ============================================================================
// GenerationProvider
// ============================================================================

/// Answers every prompt with a fixed reply, or fails when it has none.
pub struct FakeProvider {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(ProviderError::Api {
                status: 503,
                message: "model overloaded".to_string(),
            }),
        }
    }
}
