//! Transient notifications.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// At most this many toasts are kept; older ones are dropped first.
const MAX_TOASTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// A notification before it is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: ToastLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn info(title: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            title: title.into(),
            description: None,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    /// Error toast titled "Error".
    pub fn error(description: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            title: "Error".to_string(),
            description: Some(description.into()),
        }
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            title: title.into(),
            description: Some(description.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub notice: Notice,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct ToastQueue {
    ttl: Duration,
    toasts: VecDeque<Toast>,
}

impl ToastQueue {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            toasts: VecDeque::new(),
        }
    }

    pub fn push(&mut self, notice: Notice, now: Instant) {
        log::debug!("Toast: {} {:?}", notice.title, notice.description);
        if self.toasts.len() == MAX_TOASTS {
            self.toasts.pop_front();
        }
        self.toasts.push_back(Toast {
            notice,
            expires_at: now + self.ttl,
        });
    }

    /// Drops expired toasts. Returns true if any were removed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.expires_at > now);
        before != self.toasts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.back()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }
}
