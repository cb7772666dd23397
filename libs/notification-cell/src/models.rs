use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_email: String,
    pub recipient_phone: Option<String>,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Approval,
    Rejection,
    Cancellation,
    Completion,
    Reschedule,
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationCategory::Approval => write!(f, "approval"),
            NotificationCategory::Rejection => write!(f, "rejection"),
            NotificationCategory::Cancellation => write!(f, "cancellation"),
            NotificationCategory::Completion => write!(f, "completion"),
            NotificationCategory::Reschedule => write!(f, "reschedule"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("notification queue is full")]
    QueueFull,

    #[error("notification queue is closed")]
    QueueClosed,

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}
