//! # AI Copilot Panel
//!
//! State behind the copilot side panel: canned rewrites of the selected
//! text, free-form instructions, debounced smart suggestions, conversation
//! insights and a small assistant chat.
//!
//! Every generation request gets a number from one monotonically increasing
//! counter. Requests are grouped in slots (action, suggestion, analysis,
//! chat); each slot remembers the number it issued last, and an answer
//! carrying any other number is discarded. Starting a new rewrite therefore
//! silently supersedes one still in flight.
//!
//! Failures never surface as errors. Each request kind has a fixed
//! fallback (a toast, an empty suggestion, a canned sentence). A failed
//! request whose error is transient is remembered so `reconnect` can issue
//! it again.
//!
//! Rewrites, suggestions and insights are about the open conversation, so
//! `leave_conversation` forgets the ones still in flight and their late
//! answers resolve as stale.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;

use crate::core::toast::Notice;
use crate::inference::{CannedAction, ProviderError};
use crate::inference::prompts::{self, last};

pub const SUGGESTION_MIN_CHARS: usize = 15;
pub const SUMMARY_MIN_SELECTION: usize = 50;
pub const ANALYSIS_MIN_MESSAGES: usize = 2;
pub const CHAT_CONTEXT_ENTRIES: usize = 6;

pub const ANALYSIS_FALLBACK: &str = "Unable to analyze conversation at the moment.";
pub const CHAT_FALLBACK: &str =
    "Sorry, I had trouble processing that request. Could you try asking in a different way?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Action,
    Suggestion,
    Analysis,
    Chat,
}

/// A failed generation, as the panel sees it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CopilotError {
    pub message: String,
    /// Whether issuing the same prompt again could succeed.
    pub retryable: bool,
}

impl From<ProviderError> for CopilotError {
    fn from(e: ProviderError) -> Self {
        Self {
            retryable: e.is_retryable(),
            message: e.to_string(),
        }
    }
}

impl From<&str> for CopilotError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
            retryable: true,
        }
    }
}

/// What a request is for, and therefore how its answer is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purpose {
    Action(CannedAction),
    Translate(String),
    Instructions,
    Suggestion,
    Analysis,
    Chat,
}

impl Purpose {
    pub fn slot(&self) -> Slot {
        match self {
            Purpose::Action(_) | Purpose::Translate(_) | Purpose::Instructions => Slot::Action,
            Purpose::Suggestion => Slot::Suggestion,
            Purpose::Analysis => Slot::Analysis,
            Purpose::Chat => Slot::Chat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopilotRequest {
    pub seq: u64,
    pub purpose: Purpose,
    pub prompt: String,
}

/// How an answer (or its failure) should be applied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Superseded by a newer request in the same slot.
    Stale,
    ReplaceDraft { text: String, notice: Notice },
    AppendToDraft { text: String, notice: Notice },
    /// Only panel state changed.
    Updated,
    Failed { notice: Option<Notice> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopilotTab {
    #[default]
    Actions,
    Smart,
    Insights,
    Chat,
}

impl CopilotTab {
    pub const ALL: [CopilotTab; 4] = [
        CopilotTab::Actions,
        CopilotTab::Smart,
        CopilotTab::Insights,
        CopilotTab::Chat,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CopilotTab::Actions => "Actions",
            CopilotTab::Smart => "Smart",
            CopilotTab::Insights => "Insights",
            CopilotTab::Chat => "Chat",
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn label(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
}

fn is_blank(text: Option<&str>) -> bool {
    text.is_none_or(|t| t.trim().is_empty())
}

#[derive(Debug)]
pub struct CopilotPanel {
    pub open: bool,
    pub tab: CopilotTab,
    pub action_cursor: usize,
    pub instructions: String,
    pub chat_input: String,
    /// `Some` while the translate prompt is open, holding the typed language.
    pub language_input: Option<String>,
    suggestion: String,
    analysis: String,
    transcript: Vec<ChatEntry>,
    next_seq: u64,
    latest: HashMap<Slot, u64>,
    pending: HashMap<Slot, CopilotRequest>,
    last_failed: Option<CopilotRequest>,
    delay: Duration,
    suggestion_due: Option<Instant>,
    analysis_due: Option<Instant>,
    analysed_len: usize,
}

impl CopilotPanel {
    pub fn new(delay: Duration) -> Self {
        Self {
            open: true,
            tab: CopilotTab::default(),
            action_cursor: 0,
            instructions: String::new(),
            chat_input: String::new(),
            language_input: None,
            suggestion: String::new(),
            analysis: String::new(),
            transcript: Vec::new(),
            next_seq: 0,
            latest: HashMap::new(),
            pending: HashMap::new(),
            last_failed: None,
            delay,
            suggestion_due: None,
            analysis_due: None,
            analysed_len: 0,
        }
    }

    pub fn suggestion(&self) -> &str {
        &self.suggestion
    }

    pub fn analysis(&self) -> &str {
        &self.analysis
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn is_busy(&self, slot: Slot) -> bool {
        self.pending.contains_key(&slot)
    }

    pub fn has_failed_request(&self) -> bool {
        self.last_failed.is_some()
    }

    fn issue(&mut self, purpose: Purpose, prompt: String) -> CopilotRequest {
        self.next_seq += 1;
        let request = CopilotRequest {
            seq: self.next_seq,
            purpose,
            prompt,
        };
        let slot = request.purpose.slot();
        debug!("Copilot request #{} for {:?}", request.seq, slot);
        self.latest.insert(slot, request.seq);
        self.pending.insert(slot, request.clone());
        request
    }

    pub fn highlighted_action(&self) -> CannedAction {
        CannedAction::ALL[self.action_cursor.min(CannedAction::ALL.len() - 1)]
    }

    pub fn move_action_cursor(&mut self, delta: isize) {
        let last = CannedAction::ALL.len() as isize - 1;
        self.action_cursor = (self.action_cursor as isize + delta).clamp(0, last) as usize;
    }

    /// Runs a canned action on the selection. `Translate` only opens the
    /// language prompt; see [`CopilotPanel::translate`].
    pub fn run_action(
        &mut self,
        action: CannedAction,
        selection: Option<&str>,
        history: &[String],
    ) -> Result<Option<CopilotRequest>, Notice> {
        if action == CannedAction::Translate {
            self.language_input = Some(String::new());
            return Ok(None);
        }
        if action.needs_selection() && is_blank(selection) {
            return Err(Notice::warning(
                "No text selected",
                "Please select some text to perform this action",
            ));
        }

        let selection = selection.unwrap_or_default();
        let text = if action == CannedAction::Summary
            && selection.chars().count() <= SUMMARY_MIN_SELECTION
        {
            last(history, 5).join("\n")
        } else {
            selection.to_string()
        };
        let context = last(history, 3).join("\n");
        let prompt = prompts::action_prompt(action, &text, &context);
        Ok(Some(self.issue(Purpose::Action(action), prompt)))
    }

    pub fn translate(
        &mut self,
        language: &str,
        selection: Option<&str>,
        history: &[String],
    ) -> Result<CopilotRequest, Notice> {
        let language = language.trim();
        if language.is_empty() {
            return Err(Notice::warning(
                "Language Required",
                "Please enter a target language",
            ));
        }
        let Some(text) = selection.filter(|s| !s.trim().is_empty()) else {
            return Err(Notice::warning(
                "No text selected",
                "Please select some text to translate",
            ));
        };
        self.language_input = None;
        let context = last(history, 3).join("\n");
        let prompt = prompts::translate_prompt(text, language, &context);
        Ok(self.issue(Purpose::Translate(language.to_string()), prompt))
    }

    /// Applies the typed instructions to the selection. Blank instructions
    /// do nothing.
    pub fn apply_instructions(
        &mut self,
        selection: Option<&str>,
    ) -> Result<Option<CopilotRequest>, Notice> {
        let instructions = self.instructions.trim().to_string();
        if instructions.is_empty() {
            return Ok(None);
        }
        let Some(text) = selection.filter(|s| !s.trim().is_empty()) else {
            return Err(Notice::warning(
                "No text selected",
                "Please select the text you want to modify",
            ));
        };
        let prompt = prompts::instructions_prompt(text, &instructions);
        Ok(Some(self.issue(Purpose::Instructions, prompt)))
    }

    /// Restarts the suggestion debounce when the draft (or selection)
    /// changed.
    pub fn draft_changed(&mut self, draft: &str, now: Instant) {
        self.suggestion_due = if draft.chars().count() > SUGGESTION_MIN_CHARS {
            Some(now + self.delay)
        } else {
            None
        };
    }

    /// Schedules an analysis when the history grew past two messages.
    pub fn history_changed(&mut self, len: usize, now: Instant) {
        if len > ANALYSIS_MIN_MESSAGES && len != self.analysed_len {
            self.analysis_due = Some(now + self.delay);
        }
    }

    /// Fires debounced requests that are due.
    pub fn tick(
        &mut self,
        now: Instant,
        draft: &str,
        selection: Option<&str>,
        history: &[String],
    ) -> Vec<CopilotRequest> {
        let mut requests = Vec::new();

        if self.suggestion_due.is_some_and(|due| due <= now) {
            self.suggestion_due = None;
            if draft.chars().count() > SUGGESTION_MIN_CHARS {
                let prompt = match selection.filter(|s| !s.trim().is_empty()) {
                    Some(selected) => prompts::selection_suggestion_prompt(selected, draft),
                    None => prompts::suggestion_prompt(history, draft),
                };
                requests.push(self.issue(Purpose::Suggestion, prompt));
            }
        }

        if self.analysis_due.is_some_and(|due| due <= now) {
            self.analysis_due = None;
            if history.len() > ANALYSIS_MIN_MESSAGES {
                self.analysed_len = history.len();
                let prompt = prompts::analysis_prompt(history);
                requests.push(self.issue(Purpose::Analysis, prompt));
            }
        }

        requests
    }

    /// Sends the chat input, with the last few transcript entries as
    /// context.
    pub fn submit_chat(&mut self) -> Option<CopilotRequest> {
        let message = self.chat_input.trim().to_string();
        if message.is_empty() {
            return None;
        }
        let context = last(&self.transcript, CHAT_CONTEXT_ENTRIES)
            .iter()
            .map(|entry| format!("{}: {}", entry.role.label(), entry.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.transcript.push(ChatEntry {
            role: ChatRole::User,
            content: message.clone(),
        });
        self.chat_input.clear();
        let prompt = prompts::chat_prompt(&context, &message);
        Some(self.issue(Purpose::Chat, prompt))
    }

    /// The suggestion text, if there is one to use.
    pub fn take_suggestion(&mut self) -> Option<String> {
        if self.suggestion.trim().is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.suggestion))
    }

    /// Assistant reply to insert into the draft: the `index`-th entry, or
    /// the latest reply.
    pub fn reply(&self, index: Option<usize>) -> Option<&str> {
        match index {
            Some(i) => self
                .transcript
                .get(i)
                .filter(|e| e.role == ChatRole::Assistant)
                .map(|e| e.content.as_str()),
            None => self
                .transcript
                .iter()
                .rev()
                .find(|e| e.role == ChatRole::Assistant)
                .map(|e| e.content.as_str()),
        }
    }

    /// Issues the most recent failed request again, under a new number.
    pub fn reconnect(&mut self) -> Option<CopilotRequest> {
        let failed = self.last_failed.take()?;
        debug!("Retrying copilot request #{} ({:?})", failed.seq, failed.purpose);
        Some(self.issue(failed.purpose, failed.prompt))
    }

    /// Forgets in-flight work tied to the conversation being left: pending
    /// rewrites, suggestions and insights, and a failed one of those
    /// waiting for `reconnect`. Chat is about the user, not the thread.
    pub fn leave_conversation(&mut self) {
        for slot in [Slot::Action, Slot::Suggestion, Slot::Analysis] {
            self.latest.remove(&slot);
            self.pending.remove(&slot);
        }
        if self
            .last_failed
            .as_ref()
            .is_some_and(|failed| failed.purpose.slot() != Slot::Chat)
        {
            self.last_failed = None;
        }
        self.suggestion.clear();
        self.analysis.clear();
        self.analysed_len = 0;
        self.suggestion_due = None;
        self.analysis_due = None;
        self.language_input = None;
    }

    /// Applies an answer.
    pub fn resolve(
        &mut self,
        seq: u64,
        purpose: &Purpose,
        result: Result<String, CopilotError>,
    ) -> Resolution {
        let slot = purpose.slot();
        if self.latest.get(&slot) != Some(&seq) {
            debug!("Discarding stale copilot answer #{} for {:?}", seq, slot);
            return Resolution::Stale;
        }
        let request = self.pending.remove(&slot);

        match result {
            Ok(text) => match purpose {
                Purpose::Action(CannedAction::Summary) => Resolution::AppendToDraft {
                    text: format!("\n\n**Summary:** {text}"),
                    notice: Notice::success("AI Action Complete", "Successfully generated summary"),
                },
                Purpose::Action(_) => Resolution::ReplaceDraft {
                    text,
                    notice: Notice::success("AI Action Complete", "Successfully processed text"),
                },
                Purpose::Translate(language) => Resolution::ReplaceDraft {
                    text,
                    notice: Notice::success(
                        "Translation Complete",
                        format!("Successfully translated to {language}"),
                    ),
                },
                Purpose::Instructions => {
                    self.instructions.clear();
                    Resolution::ReplaceDraft {
                        text,
                        notice: Notice::success(
                            "Changes applied",
                            "Your selected text has been modified according to your instructions",
                        ),
                    }
                }
                Purpose::Suggestion => {
                    self.suggestion = text;
                    Resolution::Updated
                }
                Purpose::Analysis => {
                    self.analysis = text;
                    Resolution::Updated
                }
                Purpose::Chat => {
                    self.transcript.push(ChatEntry {
                        role: ChatRole::Assistant,
                        content: text,
                    });
                    Resolution::Updated
                }
            },
            Err(e) => {
                warn!("Copilot request #{} ({:?}) failed: {}", seq, purpose, e);
                self.last_failed = request.filter(|_| e.retryable);
                let notice = match purpose {
                    Purpose::Action(_) => Some(Notice::error("Failed to process text with AI")),
                    Purpose::Translate(_) => Some(Notice::error("Failed to translate text")),
                    Purpose::Instructions => {
                        Some(Notice::error("Failed to apply changes to the selected text"))
                    }
                    Purpose::Suggestion => {
                        self.suggestion.clear();
                        None
                    }
                    Purpose::Analysis => {
                        self.analysis = ANALYSIS_FALLBACK.to_string();
                        None
                    }
                    Purpose::Chat => {
                        self.transcript.push(ChatEntry {
                            role: ChatRole::Assistant,
                            content: CHAT_FALLBACK.to_string(),
                        });
                        Some(Notice::error("Failed to get a response from AI"))
                    }
                };
                Resolution::Failed { notice }
            }
        }
    }

    /// Forgets everything tied to the signed-in user.
    pub fn reset(&mut self) {
        *self = Self::new(self.delay);
    }
}
