use serde::{Deserialize, Serialize};

use crate::models::{MentionSet, Message};

/// Events produced by the notification pipeline for realtime consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NotifyEvent {
    /// Mentions resolved for a freshly saved message. Only emitted when
    /// database change-stream watchers are disabled.
    UserMentions {
        message: Message,
        mentions: MentionSet,
    },

    /// A reply landed in a thread the recipient follows
    ThreadReply {
        thread_id: String,
        room_id: String,
        message_id: String,
        sender_id: String,
    },

    /// A message document changed (thread parent metadata, edits)
    MessageUpdated { id: String },
}

impl NotifyEvent {
    /// Returns the room_id if this event is scoped to a specific room.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::UserMentions { message, .. } => Some(&message.room_id),
            Self::ThreadReply { room_id, .. } => Some(room_id),
            Self::MessageUpdated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_wire_format() {
        let event = NotifyEvent::MessageUpdated { id: "m1".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "MessageUpdated", "data": { "id": "m1" } }));
        assert_eq!(event.room_id(), None);
    }
}
