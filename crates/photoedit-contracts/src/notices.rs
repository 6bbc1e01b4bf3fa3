//! Transient, dismissible user notifications.
//!
//! At most one notice per level is live at a time; a newer one replaces the
//! older. Success notices expire on their own, error notices stay until
//! dismissed.

use serde::Serialize;

pub const SUCCESS_NOTICE_TTL_MS: i64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub created_at_ms: i64,
    pub ttl_ms: Option<i64>,
}

impl Notice {
    pub fn success(message: impl Into<String>, now_ms: i64) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            created_at_ms: now_ms,
            ttl_ms: Some(SUCCESS_NOTICE_TTL_MS),
        }
    }

    pub fn error(message: impl Into<String>, now_ms: i64) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            created_at_ms: now_ms,
            ttl_ms: None,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.ttl_ms
            .map(|ttl| now_ms >= self.created_at_ms.saturating_add(ttl))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeBoard {
    error: Option<Notice>,
    success: Option<Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => self.error = Some(notice),
            NoticeLevel::Success => self.success = Some(notice),
        }
    }

    /// Live notices at `now_ms`, error first.
    pub fn active(&self, now_ms: i64) -> Vec<&Notice> {
        [self.error.as_ref(), self.success.as_ref()]
            .into_iter()
            .flatten()
            .filter(|notice| !notice.is_expired(now_ms))
            .collect()
    }

    pub fn prune(&mut self, now_ms: i64) {
        if self.success.as_ref().is_some_and(|n| n.is_expired(now_ms)) {
            self.success = None;
        }
        if self.error.as_ref().is_some_and(|n| n.is_expired(now_ms)) {
            self.error = None;
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn clear(&mut self) {
        self.error = None;
        self.success = None;
    }

    pub fn error(&self) -> Option<&Notice> {
        self.error.as_ref()
    }

    pub fn success(&self) -> Option<&Notice> {
        self.success.as_ref()
    }
}
