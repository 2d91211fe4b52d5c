use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{QuoteId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "user_id", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    ApproverPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApprovalRequested,
    QuoteApproved,
    QuoteRejected,
    QuoteAccepted,
}

/// Outbound message for the delivery collaborator (email, chat, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub quote_id: QuoteId,
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub message: String,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notification: Notification) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}
