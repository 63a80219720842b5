//! PostgREST (`/rest/v1`) table access.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Api, SupabaseClient, check};
use crate::backend::types::timestamp;
use crate::backend::{
    BackendError, ChatStore, ConversationSummary, Message, MessageEdit, NewMessage, Profile,
    ProfileUpdate,
};

/// Accept header that makes PostgREST return a single object (or 406).
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

const PROFILE_COLUMNS: &str = "id,username,full_name,avatar_url,status";

/// Conversation list in one round trip: my participant rows, each with its
/// conversation and that conversation's participants and their profiles.
const CONVERSATION_SELECT: &str = "conversation_id,conversations!inner(id,last_message,last_message_at,updated_at,participants(user_id,profiles(id,username,full_name,avatar_url,status)))";

#[derive(Deserialize)]
struct MembershipRow {
    conversations: ConversationRow,
}

#[derive(Deserialize)]
struct ConversationRow {
    id: Uuid,
    #[serde(default)]
    last_message: Option<String>,
    #[serde(default, with = "timestamp::option")]
    last_message_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    participants: Vec<ParticipantRow>,
}

#[derive(Deserialize)]
struct ParticipantRow {
    user_id: Uuid,
    #[serde(default)]
    profiles: Option<Profile>,
}

impl ConversationRow {
    fn into_summary(self, me: Uuid) -> ConversationSummary {
        let other_user = self
            .participants
            .into_iter()
            .find(|p| p.user_id != me)
            .and_then(|p| p.profiles);
        ConversationSummary {
            id: self.id,
            last_message: self.last_message,
            last_message_at: self.last_message_at,
            updated_at: self.updated_at,
            other_user,
        }
    }
}

#[derive(Deserialize)]
struct IdRow {
    id: Uuid,
}

#[derive(Deserialize)]
struct MemberRow {
    conversation_id: Uuid,
    user_id: Uuid,
}

#[derive(Serialize)]
struct NewParticipant {
    conversation_id: Uuid,
    user_id: Uuid,
}

/// Picks a conversation whose member rows include both users.
fn shared_conversation(rows: &[MemberRow], a: Uuid, b: Uuid) -> Option<Uuid> {
    let mut seen: HashMap<Uuid, (bool, bool)> = HashMap::new();
    for row in rows {
        let entry = seen.entry(row.conversation_id).or_default();
        if row.user_id == a {
            entry.0 = true;
        }
        if row.user_id == b {
            entry.1 = true;
        }
    }
    // Deterministic pick when several exist.
    let mut shared: Vec<Uuid> = seen
        .into_iter()
        .filter(|(_, (has_a, has_b))| *has_a && *has_b)
        .map(|(id, _)| id)
        .collect();
    shared.sort();
    shared.into_iter().next()
}

/// `ilike` pattern for a substring search. PostgREST accepts `*` as the
/// wildcard in URLs; characters with meaning in the filter grammar are
/// dropped from the user's query.
fn ilike_pattern(query: &str) -> String {
    let cleaned: String = query
        .trim()
        .chars()
        .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')'))
        .collect();
    format!("*{}*", cleaned)
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl ChatStore for SupabaseClient {
    fn set_access_token(&self, token: Option<String>) {
        self.store_token(token);
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile, BackendError> {
        debug!("Fetching profile {}", user_id);
        let response = self
            .authorize(self.http.get(self.rest_url("profiles")))
            .query(&[("select", PROFILE_COLUMNS.to_string()), ("id", eq(user_id))])
            .header("Accept", SINGLE_OBJECT)
            .send()
            .await?;
        Ok(check(response, Api::Rest).await?.json().await?)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<(), BackendError> {
        info!("Updating profile {}", user_id);
        let response = self
            .authorize(self.http.patch(self.rest_url("profiles")))
            .query(&[("id", eq(user_id))])
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = check(response, Api::Rest).await?.json().await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(format!("profile {}", user_id)));
        }
        Ok(())
    }

    async fn search_profiles(
        &self,
        query: &str,
        exclude: Uuid,
        limit: usize,
    ) -> Result<Vec<Profile>, BackendError> {
        debug!("Searching profiles for {:?}", query);
        let response = self
            .authorize(self.http.get(self.rest_url("profiles")))
            .query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("id", format!("neq.{}", exclude)),
                ("username", format!("ilike.{}", ilike_pattern(query))),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        Ok(check(response, Api::Rest).await?.json().await?)
    }

    async fn list_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, BackendError> {
        debug!("Listing conversations for {}", user_id);
        let response = self
            .authorize(self.http.get(self.rest_url("participants")))
            .query(&[
                ("select", CONVERSATION_SELECT.to_string()),
                ("user_id", eq(user_id)),
            ])
            .send()
            .await?;
        let rows: Vec<MembershipRow> = check(response, Api::Rest).await?.json().await?;
        Ok(rows
            .into_iter()
            .map(|row| row.conversations.into_summary(user_id))
            .collect())
    }

    async fn find_shared_conversation(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<Uuid>, BackendError> {
        let response = self
            .authorize(self.http.get(self.rest_url("participants")))
            .query(&[
                ("select", "conversation_id,user_id".to_string()),
                ("user_id", format!("in.({},{})", a, b)),
            ])
            .send()
            .await?;
        let rows: Vec<MemberRow> = check(response, Api::Rest).await?.json().await?;
        Ok(shared_conversation(&rows, a, b))
    }

    async fn create_conversation(&self) -> Result<Uuid, BackendError> {
        let response = self
            .authorize(self.http.post(self.rest_url("conversations")))
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let row: IdRow = check(response, Api::Rest).await?.json().await?;
        info!("Created conversation row {}", row.id);
        Ok(row.id)
    }

    async fn add_participants(
        &self,
        conversation_id: Uuid,
        users: &[Uuid],
    ) -> Result<(), BackendError> {
        let rows: Vec<NewParticipant> = users
            .iter()
            .map(|&user_id| NewParticipant {
                conversation_id,
                user_id,
            })
            .collect();
        let response = self
            .authorize(self.http.post(self.rest_url("participants")))
            .json(&rows)
            .send()
            .await?;
        check(response, Api::Rest).await?;
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), BackendError> {
        info!("Deleting conversation {}", conversation_id);
        let response = self
            .authorize(self.http.delete(self.rest_url("conversations")))
            .query(&[("id", eq(conversation_id))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let deleted: Vec<IdRow> = check(response, Api::Rest).await?.json().await?;
        if deleted.is_empty() {
            return Err(BackendError::NotFound(format!(
                "conversation {}",
                conversation_id
            )));
        }
        Ok(())
    }

    async fn clear_conversation(&self, conversation_id: Uuid) -> Result<(), BackendError> {
        info!("Clearing messages of {}", conversation_id);
        let response = self
            .authorize(self.http.delete(self.rest_url("messages")))
            .query(&[("conversation_id", eq(conversation_id))])
            .send()
            .await?;
        check(response, Api::Rest).await?;
        Ok(())
    }

    async fn fetch_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, BackendError> {
        debug!("Fetching messages of {}", conversation_id);
        let response = self
            .authorize(self.http.get(self.rest_url("messages")))
            .query(&[
                ("select", "*".to_string()),
                ("conversation_id", eq(conversation_id)),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await?;
        Ok(check(response, Api::Rest).await?.json().await?)
    }

    async fn send_message(&self, message: &NewMessage) -> Result<Message, BackendError> {
        debug!("Sending message to {}", message.conversation_id);
        let response = self
            .authorize(self.http.post(self.rest_url("messages")))
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(message)
            .send()
            .await?;
        Ok(check(response, Api::Rest).await?.json().await?)
    }

    async fn edit_message(&self, id: Uuid, content: &str) -> Result<(), BackendError> {
        debug!("Editing message {}", id);
        let edit = MessageEdit {
            content: content.to_string(),
            is_edited: true,
            updated_at: Utc::now(),
        };
        let response = self
            .authorize(self.http.patch(self.rest_url("messages")))
            .query(&[("id", eq(id))])
            .json(&edit)
            .send()
            .await?;
        check(response, Api::Rest).await?;
        Ok(())
    }
}
