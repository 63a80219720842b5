//! # Message Thread Sync
//!
//! Keeps the message list of exactly one conversation in step with the
//! backend: an initial history fetch plus a live change-feed subscription.
//!
//! Every selection bumps a generation counter. Fetch results and
//! subscription handles carry the generation they were issued for, so a
//! late answer for a conversation the user already left is recognised and
//! dropped (and a late subscription is closed straight away).
//!
//! ```text
//!   select(B) ──► Close(old handle)
//!             ──► Fetch { B, gen }
//!             ──► Open  { B, gen }
//!
//!   on_subscribed(gen', h) ── gen' == gen && Opening ──► Active(h)
//!                          └─ otherwise ──────────────► Close(h)
//! ```

use log::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{Message, SubscriptionHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum Subscription {
    None,
    /// `open` was requested for this generation and has not answered yet.
    Opening(u64),
    Active(SubscriptionHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Side effects the thread asks its owner to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadCommand {
    Fetch { conversation_id: Uuid, generation: u64 },
    Open { conversation_id: Uuid, generation: u64 },
    Close(SubscriptionHandle),
}

#[derive(Debug)]
pub struct ThreadSync {
    conversation_id: Option<Uuid>,
    generation: u64,
    messages: Vec<Message>,
    subscription: Subscription,
    status: LoadStatus,
    /// Set when a new message arrived; the view scrolls and clears it.
    pub scroll_to_bottom: bool,
}

impl Default for ThreadSync {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadSync {
    pub fn new() -> Self {
        Self {
            conversation_id: None,
            generation: 0,
            messages: Vec::new(),
            subscription: Subscription::None,
            status: LoadStatus::Idle,
            scroll_to_bottom: false,
        }
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        self.conversation_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn find(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Switches to `conversation_id`. Selecting the current conversation
    /// again does nothing.
    pub fn select(&mut self, conversation_id: Uuid) -> Vec<ThreadCommand> {
        if self.conversation_id == Some(conversation_id) {
            return Vec::new();
        }
        info!("Opening thread {}", conversation_id);

        let mut commands = self.release();
        self.generation += 1;
        self.conversation_id = Some(conversation_id);
        self.messages.clear();
        self.status = LoadStatus::Loading;
        self.subscription = Subscription::Opening(self.generation);
        self.scroll_to_bottom = true;

        commands.push(ThreadCommand::Fetch {
            conversation_id,
            generation: self.generation,
        });
        commands.push(ThreadCommand::Open {
            conversation_id,
            generation: self.generation,
        });
        commands
    }

    /// Leaves the current conversation and releases its subscription.
    pub fn close(&mut self) -> Vec<ThreadCommand> {
        let commands = self.release();
        if self.conversation_id.take().is_some() {
            self.generation += 1;
        }
        self.messages.clear();
        self.status = LoadStatus::Idle;
        commands
    }

    fn release(&mut self) -> Vec<ThreadCommand> {
        match std::mem::replace(&mut self.subscription, Subscription::None) {
            Subscription::Active(handle) => vec![ThreadCommand::Close(handle)],
            _ => Vec::new(),
        }
    }

    /// A subscription requested for `generation` is open.
    pub fn on_subscribed(
        &mut self,
        generation: u64,
        handle: SubscriptionHandle,
    ) -> Vec<ThreadCommand> {
        if generation == self.generation && self.subscription == Subscription::Opening(generation)
        {
            debug!("Subscription {} active for generation {}", handle.topic, generation);
            self.subscription = Subscription::Active(handle);
            Vec::new()
        } else {
            info!(
                "Closing stale subscription {} (generation {} != {})",
                handle.topic, generation, self.generation
            );
            vec![ThreadCommand::Close(handle)]
        }
    }

    pub fn on_subscribe_failed(&mut self, generation: u64) {
        if self.subscription == Subscription::Opening(generation) {
            warn!("Live updates unavailable for generation {}", generation);
            self.subscription = Subscription::None;
        }
    }

    /// Applies a history fetch. Returns false if the result was stale.
    pub fn on_history(&mut self, generation: u64, result: Result<Vec<Message>, String>) -> bool {
        if generation != self.generation {
            debug!(
                "Dropping stale history (generation {} != {})",
                generation, self.generation
            );
            return false;
        }
        match result {
            Ok(history) => {
                let live = std::mem::take(&mut self.messages);
                let mut merged: Vec<Message> = history
                    .into_iter()
                    .filter(|m| !live.iter().any(|l| l.id == m.id))
                    .collect();
                merged.extend(live);
                merged.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                self.messages = merged;
                self.status = LoadStatus::Ready;
                self.scroll_to_bottom = true;
            }
            Err(e) => {
                warn!("History fetch failed: {}", e);
                self.messages.clear();
                self.status = LoadStatus::Failed;
            }
        }
        true
    }

    fn is_live(&self, subscription_id: u64) -> bool {
        matches!(&self.subscription, Subscription::Active(h) if h.id == subscription_id)
    }

    /// Live insert. Returns true if the message was added.
    pub fn on_insert(&mut self, subscription_id: u64, message: Message) -> bool {
        if !self.is_live(subscription_id) {
            debug!("Ignoring insert from inactive subscription {}", subscription_id);
            return false;
        }
        self.insert(message)
    }

    /// Merges a message this client wrote, through the same dedup path as
    /// live inserts.
    pub fn merge_sent(&mut self, message: Message) -> bool {
        self.insert(message)
    }

    fn insert(&mut self, message: Message) -> bool {
        if self.conversation_id != Some(message.conversation_id) {
            return false;
        }
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let at_end = self
            .messages
            .last()
            .is_none_or(|last| last.created_at <= message.created_at);
        if at_end {
            self.messages.push(message);
        } else {
            let index = self
                .messages
                .partition_point(|m| m.created_at <= message.created_at);
            self.messages.insert(index, message);
        }
        self.scroll_to_bottom = true;
        true
    }

    /// Live edit. Unknown ids are ignored.
    pub fn on_update(&mut self, subscription_id: u64, message: Message) -> bool {
        if !self.is_live(subscription_id) {
            return false;
        }
        self.replace(message)
    }

    /// Replaces a known message in place.
    pub fn replace(&mut self, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) if slot.conversation_id == message.conversation_id => {
                *slot = message;
                true
            }
            _ => false,
        }
    }

    pub fn on_delete(&mut self, subscription_id: u64, id: Uuid) -> bool {
        if !self.is_live(subscription_id) {
            return false;
        }
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        before != self.messages.len()
    }

    /// Empties the list after the conversation was cleared remotely.
    pub fn clear_messages(&mut self, conversation_id: Uuid) {
        if self.conversation_id == Some(conversation_id) {
            self.messages.clear();
        }
    }

    /// Message contents, oldest first, for copilot prompts.
    pub fn history_lines(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.content.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(conversation_id: Uuid, secs: i64, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            content: content.to_string(),
            user_id: Uuid::nil(),
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

    /// Selects `conversation` and activates subscription `sub`.
    fn active(thread: &mut ThreadSync, conversation: Uuid, sub: u64) {
        thread.select(conversation);
        let generation = thread.generation();
        assert!(thread.on_subscribed(generation, handle(sub)).is_empty());
    }

    #[test]
    fn test_select_emits_fetch_and_open() {
        let mut thread = ThreadSync::new();
        let a = Uuid::new_v4();
        let commands = thread.select(a);
        assert_eq!(
            commands,
            vec![
                ThreadCommand::Fetch { conversation_id: a, generation: 1 },
                ThreadCommand::Open { conversation_id: a, generation: 1 },
            ]
        );
        assert_eq!(thread.status(), LoadStatus::Loading);
        assert!(thread.select(a).is_empty(), "reselect is a no-op");
    }

    #[test]
    fn test_switch_closes_previous_subscription_first() {
        let mut thread = ThreadSync::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        active(&mut thread, a, 7);
        let commands = thread.select(b);
        assert_eq!(commands[0], ThreadCommand::Close(handle(7)));
        assert_eq!(commands.len(), 3);
    }

    #[test]
    fn test_rapid_switch_leaves_one_active_subscription() {
        let mut thread = ThreadSync::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        thread.select(a);
        let gen_a = thread.generation();
        thread.select(b);
        let gen_b = thread.generation();

        // A's subscription answers late and is closed immediately.
        assert_eq!(thread.on_subscribed(gen_a, handle(1)), vec![ThreadCommand::Close(handle(1))]);
        assert!(thread.on_subscribed(gen_b, handle(2)).is_empty());
        assert_eq!(thread.subscription(), &Subscription::Active(handle(2)));

        // A duplicate answer for B's generation is also closed.
        assert_eq!(thread.on_subscribed(gen_b, handle(3)), vec![ThreadCommand::Close(handle(3))]);
    }

    #[test]
    fn test_stale_history_never_mutates_thread() {
        let mut thread = ThreadSync::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        thread.select(a);
        let gen_a = thread.generation();
        thread.select(b);

        let applied = thread.on_history(gen_a, Ok(vec![message(a, 0, "from a")]));
        assert!(!applied);
        assert!(thread.messages().is_empty());
        assert_eq!(thread.status(), LoadStatus::Loading);
    }

    #[test]
    fn test_history_merges_with_early_live_events() {
        let mut thread = ThreadSync::new();
        let a = Uuid::new_v4();
        active(&mut thread, a, 1);
        let early = message(a, 30, "live");
        assert!(thread.on_insert(1, early.clone()));

        let old = message(a, 10, "old");
        thread.on_history(thread.generation(), Ok(vec![old.clone(), early.clone()]));
        let ids: Vec<Uuid> = thread.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![old.id, early.id]);
        assert_eq!(thread.status(), LoadStatus::Ready);
    }

    #[test]
    fn test_history_failure_empties_list() {
        let mut thread = ThreadSync::new();
        let a = Uuid::new_v4();
        active(&mut thread, a, 1);
        thread.on_insert(1, message(a, 0, "x"));
        thread.on_history(thread.generation(), Err("boom".into()));
        assert!(thread.messages().is_empty());
        assert_eq!(thread.status(), LoadStatus::Failed);
    }

    #[test]
    fn test_inserts_are_unique_and_ordered() {
        let mut thread = ThreadSync::new();
        let a = Uuid::new_v4();
        active(&mut thread, a, 1);
        thread.on_history(thread.generation(), Ok(vec![]));

        let first = message(a, 10, "first");
        let third = message(a, 30, "third");
        let second = message(a, 20, "second");
        assert!(thread.on_insert(1, first.clone()));
        assert!(thread.on_insert(1, third.clone()));
        assert!(thread.on_insert(1, second.clone()));
        assert!(!thread.on_insert(1, second.clone()), "duplicate id");
        assert!(!thread.merge_sent(first.clone()), "echo of own send");

        let contents: Vec<&str> = thread.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_events_from_other_subscriptions_are_ignored() {
        let mut thread = ThreadSync::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        active(&mut thread, a, 1);
        assert!(!thread.on_insert(2, message(a, 0, "wrong sub")));
        assert!(!thread.on_insert(1, message(b, 0, "wrong conversation")));
        assert!(thread.messages().is_empty());
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut thread = ThreadSync::new();
        let a = Uuid::new_v4();
        active(&mut thread, a, 1);
        let known = message(a, 0, "hello");
        thread.on_insert(1, known.clone());

        assert!(!thread.on_update(1, message(a, 5, "phantom")));
        assert_eq!(thread.messages().len(), 1);

        let edited = Message {
            content: "hello!".into(),
            is_edited: true,
            ..known
        };
        assert!(thread.on_update(1, edited));
        assert_eq!(thread.messages()[0].content, "hello!");
        assert!(thread.messages()[0].is_edited);
    }

    #[test]
    fn test_delete_removes_message() {
        let mut thread = ThreadSync::new();
        let a = Uuid::new_v4();
        active(&mut thread, a, 1);
        let m = message(a, 0, "bye");
        thread.on_insert(1, m.clone());
        assert!(thread.on_delete(1, m.id));
        assert!(!thread.on_delete(1, m.id));
        assert!(thread.messages().is_empty());
    }

    #[test]
    fn test_close_releases_subscription() {
        let mut thread = ThreadSync::new();
        let a = Uuid::new_v4();
        active(&mut thread, a, 4);
        let generation = thread.generation();
        assert_eq!(thread.close(), vec![ThreadCommand::Close(handle(4))]);
        assert_eq!(thread.conversation_id(), None);
        assert_eq!(thread.subscription(), &Subscription::None);
        // Results for the closed thread are stale.
        assert!(!thread.on_history(generation, Ok(vec![])));
        assert!(thread.close().is_empty());
    }
}
