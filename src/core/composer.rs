//! Draft state for the message input.
//!
//! The composer owns the draft text, the conversation a send or edit is in
//! flight for (if any), and the message being edited (if any). External writers (copilot, emoji picker)
//! go through `append`/`replace`, which bump `revision` so the view knows
//! to refocus the input and move the cursor to the end.

use uuid::Uuid;

use crate::backend::Message;

/// What `submit` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Nothing to do: blank draft, no conversation, or a send in flight.
    Nothing,
    Send(String),
    Edit { id: Uuid, content: String },
    /// Edit submitted with unchanged content.
    EditCancelled,
}

#[derive(Debug, Clone)]
struct EditTarget {
    message_id: Uuid,
    original: String,
    /// Draft that was in the input before editing started.
    stashed_draft: String,
}

#[derive(Debug, Default)]
pub struct Composer {
    text: String,
    revision: u64,
    /// Conversation of the write awaiting its ack.
    pending: Option<Uuid>,
    editing: Option<EditTarget>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_sending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn editing(&self) -> Option<Uuid> {
        self.editing.as_ref().map(|e| e.message_id)
    }

    /// Keystroke edits from the input itself. No refocus.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
        self.revision += 1;
    }

    pub fn replace(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.revision += 1;
    }

    /// Decides what Enter does in `conversation`. A send or edit marks that
    /// conversation as pending until `on_submitted`/`on_submit_failed`.
    pub fn submit(&mut self, conversation: Option<Uuid>) -> Submission {
        if self.pending.is_some() {
            return Submission::Nothing;
        }
        let Some(conversation) = conversation else {
            return Submission::Nothing;
        };
        let content = self.text.trim();

        if let Some(edit) = &self.editing {
            if content.is_empty() {
                return Submission::Nothing;
            }
            if content == edit.original.trim() {
                self.cancel_edit();
                return Submission::EditCancelled;
            }
            let submission = Submission::Edit {
                id: edit.message_id,
                content: content.to_string(),
            };
            self.pending = Some(conversation);
            return submission;
        }

        if content.is_empty() {
            return Submission::Nothing;
        }
        let submission = Submission::Send(content.to_string());
        self.pending = Some(conversation);
        submission
    }

    /// The backend acknowledged a write made in `conversation`. Returns
    /// false, leaving the draft alone, when no write is pending there.
    pub fn on_submitted(&mut self, conversation: Uuid) -> bool {
        if self.pending != Some(conversation) {
            return false;
        }
        self.pending = None;
        match self.editing.take() {
            Some(edit) => self.replace(edit.stashed_draft),
            None => self.replace(String::new()),
        }
        true
    }

    /// The backend rejected a write made in `conversation`. The draft is
    /// kept for another try.
    pub fn on_submit_failed(&mut self, conversation: Uuid) -> bool {
        if self.pending != Some(conversation) {
            return false;
        }
        self.pending = None;
        true
    }

    /// Loads one of `me`'s messages for editing. Returns false for other
    /// users' messages.
    pub fn begin_edit(&mut self, message: &Message, me: Uuid) -> bool {
        if message.user_id != me || self.pending.is_some() {
            return false;
        }
        let stashed_draft = match self.editing.take() {
            Some(previous) => previous.stashed_draft,
            None => std::mem::take(&mut self.text),
        };
        self.editing = Some(EditTarget {
            message_id: message.id,
            original: message.content.clone(),
            stashed_draft,
        });
        self.replace(message.content.clone());
        true
    }

    pub fn cancel_edit(&mut self) {
        if let Some(edit) = self.editing.take() {
            self.replace(edit.stashed_draft);
        }
    }

    /// Drops everything, e.g. when switching conversations or signing out.
    pub fn reset(&mut self) {
        self.editing = None;
        self.pending = None;
        self.replace(String::new());
    }
}
