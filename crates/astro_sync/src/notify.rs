//! User-facing notifications raised by the sync engine

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Warning,
    Info,
    Error,
}

/// A message for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub category: String,
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            category: category.into(),
        }
    }
}

/// Receives notifications. Implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(category = %n.category, "{}: {}", n.title, n.message)
            }
            NotificationLevel::Warning => {
                tracing::warn!(category = %n.category, "{}: {}", n.title, n.message)
            }
            NotificationLevel::Error => {
                tracing::error!(category = %n.category, "{}: {}", n.title, n.message)
            }
        }
    }
}
