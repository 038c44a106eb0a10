use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::DEFAULT_TOAST_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

impl ToastKind {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: Uuid,
    pub message: String,
    pub kind: ToastKind,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Toast {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + self.ttl
    }

    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.created_at && now < self.expires_at()
    }
}

/// Fire-and-forget notifications. Nothing is removed eagerly; expiry is evaluated
/// against the time a caller looks.
#[derive(Debug, Clone)]
pub struct ToastQueue {
    toasts: Vec<Toast>,
    ttl: Duration,
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_TOAST_MS as i64))
    }
}

impl ToastQueue {
    pub fn new(ttl: Duration) -> Self {
        Self { toasts: vec![], ttl }
    }

    pub fn push(&mut self, message: impl Into<String>, kind: ToastKind, now: DateTime<Utc>) -> &Toast {
        let toast = Toast {
            id: Uuid::new_v4(),
            message: message.into(),
            kind,
            created_at: now,
            ttl: self.ttl,
        };
        info!(toast_id = %toast.id, kind = kind.css_class(), message = %toast.message, "toast");
        self.toasts.push(toast);
        &self.toasts[self.toasts.len() - 1]
    }

    pub fn visible(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Toast> {
        self.toasts.iter().filter(move |toast| toast.is_visible_at(now))
    }

    /// Drops expired toasts, returning how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.toasts.len();
        self.toasts.retain(|toast| now < toast.expires_at());
        before - self.toasts.len()
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.last()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}
