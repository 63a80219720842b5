//! Row types for the hosted backend.
//!
//! These mirror the `profiles`, `conversations`, `participants` and
//! `messages` tables. The client only ever holds transient copies; the
//! backend stays authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ============================================================================
// Timestamps
// ============================================================================

/// Postgres `timestamptz` values arrive with an offset from PostgREST but the
/// realtime feed has been seen to send them without one. Accept both.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => s.serialize_str(&dt.to_rfc3339()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp: {raw}"))
                }),
                None => Ok(None),
            }
        }
    }
}

/// `is_edited` is a nullable column.
fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    pub conversation_id: Uuid,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_edited: bool,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for `messages`. The backend assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub content: String,
    pub user_id: Uuid,
    pub conversation_id: Uuid,
}

/// Update payload for an edited message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEdit {
    pub content: String,
    pub is_edited: bool,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
    Offline,
    #[serde(other)]
    Unknown,
}

impl PresenceStatus {
    pub fn label(self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Away => "away",
            PresenceStatus::Busy => "busy",
            PresenceStatus::Offline => "offline",
            PresenceStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: Option<PresenceStatus>,
}

impl Profile {
    /// Full name when set and non-blank, otherwise the username.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }

    /// Single uppercase letter used as an avatar stand-in.
    pub fn initial(&self) -> char {
        self.username
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('U')
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub full_name: Option<String>,
}

/// User metadata attached to a sign-up request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignUpProfile {
    pub username: String,
    pub full_name: Option<String>,
}

// ============================================================================
// Conversations
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// The other participant. `None` when the backend returned no match.
    pub other_user: Option<Profile>,
}

impl ConversationSummary {
    pub fn display_name(&self) -> &str {
        self.other_user
            .as_ref()
            .map(Profile::display_name)
            .unwrap_or("Unknown")
    }

    pub fn preview(&self) -> &str {
        self.last_message.as_deref().unwrap_or("No messages yet")
    }

    /// Timestamp used for recency ordering.
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        self.last_message_at.or(self.updated_at)
    }
}

/// Result of `start_conversation`: which conversation to open, and whether
/// it was newly created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedConversation {
    pub id: Uuid,
    pub created: bool,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) after which the access token is rejected.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    /// Tokens within a minute of expiry count as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - 60 <= now.timestamp()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The project auto-confirms accounts and returned a live session.
    SignedIn(AuthSession),
    /// The account exists but must be confirmed by email first.
    ConfirmationRequired(AuthUser),
}

// ============================================================================
// Change feed
// ============================================================================

/// Row filter for a change-feed subscription (`column=eq.value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    pub table: String,
    pub column: String,
    pub value: String,
}

impl FeedFilter {
    pub fn messages_in(conversation_id: Uuid) -> Self {
        Self {
            table: "messages".to_string(),
            column: "conversation_id".to_string(),
            value: conversation_id.to_string(),
        }
    }

    pub fn expression(&self) -> String {
        format!("{}=eq.{}", self.column, self.value)
    }
}

/// Owned handle for an open subscription. Must be handed back to
/// `ChangeFeed::close`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(Message),
    Update(Message),
    Delete { id: Uuid },
}

pub type FeedSink = tokio::sync::mpsc::UnboundedSender<ChangeEvent>;
