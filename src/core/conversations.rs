//! Conversation list and user search.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Local, Utc};
use log::debug;
use uuid::Uuid;

use crate::backend::{ConversationSummary, Profile};

pub const SEARCH_LIMIT: usize = 10;

/// Newest first by `last_message_at`, falling back to `updated_at`;
/// conversations without any timestamp go last.
pub fn by_recency(a: &ConversationSummary, b: &ConversationSummary) -> Ordering {
    match (a.recency(), b.recency()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `HH:MM` within the last 24 hours, otherwise a date.
pub fn time_label(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return String::new();
    };
    let local = at.with_timezone(&Local);
    if now.signed_duration_since(at).num_hours() < 24 {
        local.format("%H:%M").to_string()
    } else {
        local.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Default)]
pub struct ConversationList {
    items: Vec<ConversationSummary>,
    selected: Option<Uuid>,
    deleting: HashSet<Uuid>,
    loading: bool,
    /// Row highlighted in the list view.
    pub cursor: usize,
}

impl ConversationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ConversationSummary] {
        &self.items
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_deleting(&self, id: Uuid) -> bool {
        self.deleting.contains(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&ConversationSummary> {
        self.items.iter().find(|c| c.id == id)
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    pub fn on_loaded(&mut self, mut items: Vec<ConversationSummary>) {
        items.sort_by(by_recency);
        self.items = items;
        self.loading = false;
        // Deletions still in flight keep their marker only if the row survived.
        self.deleting.retain(|id| self.items.iter().any(|c| c.id == *id));
        self.clamp_cursor();
    }

    /// Keeps the previous contents.
    pub fn on_load_failed(&mut self) {
        self.loading = false;
    }

    pub fn select(&mut self, id: Uuid) {
        self.selected = Some(id);
        if let Some(index) = self.items.iter().position(|c| c.id == id) {
            self.cursor = index;
        }
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// The conversation under the cursor.
    pub fn highlighted(&self) -> Option<&ConversationSummary> {
        self.items.get(self.cursor)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.items.is_empty() {
            self.cursor = 0;
            return;
        }
        let last = self.items.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.items.len().saturating_sub(1));
    }

    /// Marks `id` as being deleted. Returns false if it already is, or is
    /// not in the list.
    pub fn mark_deleting(&mut self, id: Uuid) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.deleting.insert(id)
    }

    pub fn on_deleted(&mut self, id: Uuid) {
        self.deleting.remove(&id);
        self.items.retain(|c| c.id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.clamp_cursor();
    }

    /// The row stays visible.
    pub fn on_delete_failed(&mut self, id: Uuid) {
        self.deleting.remove(&id);
    }

    /// Reflects a message written to `id` without waiting for a reload.
    pub fn touch(&mut self, id: Uuid, preview: &str, at: DateTime<Utc>) {
        let Some(item) = self.items.iter_mut().find(|c| c.id == id) else {
            debug!("Touch for unlisted conversation {}", id);
            return;
        };
        if item.last_message_at.is_some_and(|existing| existing > at) {
            return;
        }
        item.last_message = Some(preview.to_string());
        item.last_message_at = Some(at);
        let highlighted = self.highlighted().map(|c| c.id);
        self.items.sort_by(by_recency);
        if let Some(h) = highlighted
            && let Some(index) = self.items.iter().position(|c| c.id == h)
        {
            self.cursor = index;
        }
    }

    pub fn clear_preview(&mut self, id: Uuid) {
        if let Some(item) = self.items.iter_mut().find(|c| c.id == id) {
            item.last_message = None;
        }
    }
}

/// The "new conversation" search panel.
#[derive(Debug, Default)]
pub struct UserSearch {
    pub open: bool,
    pub query: String,
    /// Query the current results (or in-flight request) belong to.
    searched: Option<String>,
    results: Vec<Profile>,
    loading: bool,
    creating: Option<Uuid>,
    pub cursor: usize,
}

impl UserSearch {
    pub fn results(&self) -> &[Profile] {
        &self.results
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn creating(&self) -> Option<Uuid> {
        self.creating
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        *self = Self::default();
    }

    /// Returns the trimmed query to search for, or `None` for a blank
    /// query (which clears the results without a request).
    pub fn submit(&mut self) -> Option<String> {
        let query = self.query.trim().to_string();
        if query.is_empty() {
            self.results.clear();
            self.searched = None;
            self.loading = false;
            return None;
        }
        self.searched = Some(query.clone());
        self.loading = true;
        Some(query)
    }

    /// Applies results unless a newer search superseded `query`.
    pub fn on_results(&mut self, query: &str, results: Vec<Profile>) -> bool {
        if self.searched.as_deref() != Some(query) {
            return false;
        }
        self.results = results;
        self.loading = false;
        self.cursor = 0;
        true
    }

    pub fn on_failed(&mut self, query: &str) {
        if self.searched.as_deref() == Some(query) {
            self.loading = false;
        }
    }

    pub fn highlighted(&self) -> Option<&Profile> {
        self.results.get(self.cursor)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.results.is_empty() {
            return;
        }
        let last = self.results.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    /// Starts creating a conversation with `target`. Returns false while
    /// another creation is in flight.
    pub fn begin_create(&mut self, target: Uuid) -> bool {
        if self.creating.is_some() {
            return false;
        }
        self.creating = Some(target);
        true
    }

    pub fn on_create_failed(&mut self) {
        self.creating = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn summary(id: Uuid, last: Option<i64>, updated: Option<i64>) -> ConversationSummary {
        let at = |secs: i64| Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        ConversationSummary {
            id,
            last_message: None,
            last_message_at: last.map(at),
            updated_at: updated.map(at),
            other_user: None,
        }
    }

    #[test]
    fn test_sorted_by_recency_with_fallback() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut list = ConversationList::new();
        list.on_loaded(vec![
            summary(ids[0], None, None),
            summary(ids[1], Some(10), Some(100)),
            summary(ids[2], None, Some(50)),
            summary(ids[3], Some(60), None),
        ]);
        let order: Vec<Uuid> = list.items().iter().map(|c| c.id).collect();
        assert_eq!(order, vec![ids[3], ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_load_failure_keeps_previous_items() {
        let mut list = ConversationList::new();
        list.on_loaded(vec![summary(Uuid::new_v4(), Some(1), None)]);
        list.begin_load();
        list.on_load_failed();
        assert_eq!(list.items().len(), 1);
        assert!(!list.is_loading());
    }

    #[test]
    fn test_delete_success_removes_entry() {
        let id = Uuid::new_v4();
        let mut list = ConversationList::new();
        list.on_loaded(vec![summary(id, Some(1), None)]);
        list.select(id);
        assert!(list.mark_deleting(id));
        assert!(!list.mark_deleting(id), "already deleting");
        list.on_deleted(id);
        assert!(list.items().is_empty());
        assert_eq!(list.selected(), None);
    }

    #[test]
    fn test_delete_failure_keeps_entry_visible() {
        let id = Uuid::new_v4();
        let mut list = ConversationList::new();
        list.on_loaded(vec![summary(id, Some(1), None)]);
        list.mark_deleting(id);
        list.on_delete_failed(id);
        assert_eq!(list.items().len(), 1);
        assert!(!list.is_deleting(id));
    }

    #[test]
    fn test_touch_moves_conversation_to_top() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut list = ConversationList::new();
        list.on_loaded(vec![summary(a, Some(100), None), summary(b, Some(10), None)]);
        let now = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
        list.touch(b, "new!", now);
        assert_eq!(list.items()[0].id, b);
        assert_eq!(list.items()[0].preview(), "new!");
    }

    #[test]
    fn test_time_label() {
        let now = Utc::now();
        assert_eq!(time_label(None, now), "");
        let recent = time_label(Some(now - Duration::hours(2)), now);
        assert_eq!(recent.len(), 5);
        assert!(recent.contains(':'));
        let old = time_label(Some(now - Duration::days(3)), now);
        assert_eq!(old.len(), 10);
    }

    #[test]
    fn test_blank_search_clears_without_request() {
        let mut search = UserSearch::default();
        search.query = "ann".into();
        let query = search.submit().unwrap();
        search.on_results(&query, vec![Profile {
            id: Uuid::new_v4(),
            username: "ann".into(),
            full_name: None,
            avatar_url: None,
            status: None,
        }]);
        assert_eq!(search.results().len(), 1);

        search.query = "   ".into();
        assert_eq!(search.submit(), None);
        assert!(search.results().is_empty());
    }

    #[test]
    fn test_superseded_search_results_are_dropped() {
        let mut search = UserSearch::default();
        search.query = "an".into();
        let first = search.submit().unwrap();
        search.query = "ann".into();
        let second = search.submit().unwrap();
        assert!(!search.on_results(&first, vec![]));
        assert!(search.is_loading());
        assert!(search.on_results(&second, vec![]));
        assert!(!search.is_loading());
    }
}
