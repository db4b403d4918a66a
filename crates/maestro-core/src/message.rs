use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of notice carried by a [`Message`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// A task has been handed to the recipient.
    TaskAssignment,
    /// Progress on a task the sender is working on.
    TaskUpdate,
    /// A task finished.
    TaskCompletion,
    /// Something went wrong.
    Error,
    /// Free-form information.
    Info,
}

/// An out-of-band envelope exchanged between the orchestrator and agents.
///
/// Messages are never persisted; they exist for the duration of a
/// `communicate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// Id of the sending party (an agent id or `"orchestrator"`).
    pub from: String,
    /// Id of the receiving party.
    pub to: String,
    /// The kind of notice.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Opaque payload.
    #[serde(default)]
    pub content: serde_json::Value,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a new message stamped with the current time.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        message_type: MessageType,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
            message_type,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Creates a [`MessageType::TaskAssignment`] notice for `task_id`.
    pub fn assignment(from: impl Into<String>, to: impl Into<String>, task_id: &str) -> Self {
        Self::new(
            from,
            to,
            MessageType::TaskAssignment,
            serde_json::json!({ "task_id": task_id }),
        )
    }
}
