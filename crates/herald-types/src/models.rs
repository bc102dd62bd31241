use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broadcast target ids. They travel in the mention list like user ids.
pub const MENTION_ALL: &str = "all";
pub const MENTION_HERE: &str = "here";

/// Room kinds, serialized with their single-letter storage codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    #[serde(rename = "d")]
    Direct,
    #[serde(rename = "c")]
    Channel,
    #[serde(rename = "p")]
    Private,
    /// Omnichannel / livechat room
    #[serde(rename = "l")]
    Livechat,
}

impl RoomType {
    pub fn code(self) -> &'static str {
        match self {
            Self::Direct => "d",
            Self::Channel => "c",
            Self::Private => "p",
            Self::Livechat => "l",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "d" => Some(Self::Direct),
            "c" => Some(Self::Channel),
            "p" => Some(Self::Private),
            "l" => Some(Self::Livechat),
            _ => None,
        }
    }

    /// Direct and livechat rooms always bump unread on a mention,
    /// whatever the unread-count policy says.
    pub fn always_counts_unread(self) -> bool {
        matches!(self, Self::Direct | Self::Livechat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionKind {
    User,
    Team,
}

/// A single mention reference inside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRef {
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MentionKind>,
}

impl MentionRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: Some(MentionKind::User) }
    }

    pub fn team(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: Some(MentionKind::Team) }
    }

    /// A mention without an explicit kind, as older clients send them.
    pub fn untyped(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: None }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.kind, None | Some(MentionKind::User))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub body: String,
    /// Parent message id when this message is a thread reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Thread reply that is also shown in the main room.
    #[serde(default)]
    pub show_in_room: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    /// `None` means the message was never parsed for mentions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<MentionRef>>,

    // Thread parent bookkeeping
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reply_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        room_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            body: body.into(),
            thread_id: None,
            show_in_room: false,
            created_at: Utc::now(),
            edited_at: None,
            mentions: None,
            reply_count: 0,
            replies: Vec::new(),
            last_reply_at: None,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Thread reply that is not shown in the main room.
    pub fn is_thread_only(&self) -> bool {
        self.thread_id.is_some() && !self.show_in_room
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub kind: RoomType,
    pub member_ids: Vec<String>,
    pub message_count: u64,
    pub last_message: Option<Message>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Per-user view of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub room_id: String,
    pub user_id: String,
    pub unread: u32,
    pub group_mentions: u32,
    pub user_mentions: u32,
    pub alert: bool,
    pub open: bool,
    pub last_reply_at: Option<DateTime<Utc>>,
    pub highlights: Vec<String>,
}

/// Result of mention extraction for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionSet {
    pub to_all: bool,
    pub to_here: bool,
    pub mention_ids: Vec<String>,
}

impl MentionSet {
    pub fn is_group(&self) -> bool {
        self.to_all || self.to_here
    }
}
