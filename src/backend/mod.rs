//! # Hosted Backend
//!
//! Thin clients for the backend-as-a-service that owns all persistent
//! state: auth, the four chat tables, and the realtime change feed.
//!
//! The traits below are the seams the rest of the app talks to. The
//! `supabase` module implements them over HTTP and a websocket; tests use
//! in-memory fakes.
//!
//! ```text
//!   Dispatcher ──► AuthService  ──► /auth/v1/*
//!              ──► ChatStore    ──► /rest/v1/{profiles,conversations,participants,messages}
//!              ──► ChangeFeed   ──► /realtime/v1/websocket
//! ```

pub mod error;
pub mod supabase;
pub mod types;

use async_trait::async_trait;
use log::{info, warn};
use uuid::Uuid;

pub use error::BackendError;
pub use supabase::{RealtimeClient, SupabaseClient};
pub use types::{
    AuthSession, AuthUser, ChangeEvent, ConversationSummary, FeedFilter, FeedSink, Message,
    MessageEdit, NewMessage, PresenceStatus, Profile, ProfileUpdate, SignUpOutcome,
    SignUpProfile, StartedConversation, SubscriptionHandle,
};

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    /// Exchanges a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BackendError>;

    async fn current_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;
}

/// Row-level access to the chat tables.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Sets the bearer token used for subsequent requests (`None` = anonymous).
    fn set_access_token(&self, token: Option<String>);

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile, BackendError>;

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate)
    -> Result<(), BackendError>;

    async fn search_profiles(
        &self,
        query: &str,
        exclude: Uuid,
        limit: usize,
    ) -> Result<Vec<Profile>, BackendError>;

    /// Every conversation `user_id` participates in, with the other
    /// participant resolved, in a single round trip.
    async fn list_conversations(&self, user_id: Uuid)
    -> Result<Vec<ConversationSummary>, BackendError>;

    /// A conversation both users participate in, if any.
    async fn find_shared_conversation(&self, a: Uuid, b: Uuid)
    -> Result<Option<Uuid>, BackendError>;

    async fn create_conversation(&self) -> Result<Uuid, BackendError>;

    /// Inserts all participant rows in one statement.
    async fn add_participants(&self, conversation_id: Uuid, users: &[Uuid])
    -> Result<(), BackendError>;

    /// Deletes the conversation row; messages and participants cascade.
    /// Fails with `NotFound` if nothing was deleted.
    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), BackendError>;

    /// Deletes every message in the conversation.
    async fn clear_conversation(&self, conversation_id: Uuid) -> Result<(), BackendError>;

    /// Full history, ascending by creation time.
    async fn fetch_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, BackendError>;

    /// Inserts a message and returns the stored row.
    async fn send_message(&self, message: &NewMessage) -> Result<Message, BackendError>;

    async fn edit_message(&self, id: Uuid, content: &str) -> Result<(), BackendError>;
}

/// Realtime row-change subscriptions.
///
/// `open` and `close` are paired: every handle returned by `open` must be
/// passed to `close` exactly once, otherwise events keep arriving.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    fn set_access_token(&self, token: Option<String>);

    async fn open(
        &self,
        filter: FeedFilter,
        sink: FeedSink,
    ) -> Result<SubscriptionHandle, BackendError>;

    async fn close(&self, handle: SubscriptionHandle) -> Result<(), BackendError>;
}

/// Opens the two-party conversation between `me` and `target`, creating it
/// if none exists yet.
///
/// Creation is two statements (conversation row, then both participant
/// rows). If the participant insert fails the new conversation row is
/// deleted again so no orphan is left behind.
pub async fn start_conversation(
    store: &dyn ChatStore,
    me: Uuid,
    target: Uuid,
) -> Result<StartedConversation, BackendError> {
    if me == target {
        return Err(BackendError::Validation(
            "Cannot start a conversation with yourself".to_string(),
        ));
    }

    if let Some(id) = store.find_shared_conversation(me, target).await? {
        info!("Reusing existing conversation {} with {}", id, target);
        return Ok(StartedConversation { id, created: false });
    }

    let id = store.create_conversation().await?;
    if let Err(e) = store.add_participants(id, &[me, target]).await {
        warn!("Adding participants to {} failed, rolling back: {}", id, e);
        if let Err(rollback) = store.delete_conversation(id).await {
            warn!("Rollback of conversation {} failed: {}", id, rollback);
        }
        return Err(e);
    }

    info!("Created conversation {} with {}", id, target);
    Ok(StartedConversation { id, created: true })
}
