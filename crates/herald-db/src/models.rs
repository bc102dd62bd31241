//! Database row types. These map directly to SQLite rows.
//! Timestamps and list columns stay raw here and are decoded on conversion
//! into the herald-types models, so a corrupt column degrades to a warning
//! instead of failing the whole query.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use tracing::warn;

use herald_types::models::{MentionRef, Message, Room, RoomType, Subscription};

pub struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub body: String,
    pub thread_id: Option<String>,
    pub show_in_room: bool,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub mentions: Option<String>,
    pub reply_count: u32,
    pub replies: String,
    pub last_reply_at: Option<String>,
}

pub struct RoomRow {
    pub id: String,
    pub kind: String,
    pub msg_count: u64,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
}

pub struct SubscriptionRow {
    pub room_id: String,
    pub user_id: String,
    pub unread: u32,
    pub group_mentions: u32,
    pub user_mentions: u32,
    pub alert: bool,
    pub open: bool,
    pub last_reply_at: Option<String>,
    pub highlights: String,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        let mentions = self.mentions.as_deref().and_then(|raw| {
            decode_json::<Vec<MentionRef>>(raw, "mentions", &self.id)
        });
        let replies = decode_json::<Vec<String>>(&self.replies, "replies", &self.id).unwrap_or_default();

        Message {
            created_at: parse_ts(&self.created_at).unwrap_or_else(|| {
                warn!("Corrupt created_at '{}' on message '{}'", self.created_at, self.id);
                DateTime::default()
            }),
            edited_at: self.edited_at.as_deref().and_then(parse_ts),
            last_reply_at: self.last_reply_at.as_deref().and_then(parse_ts),
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            body: self.body,
            thread_id: self.thread_id,
            show_in_room: self.show_in_room,
            mentions,
            reply_count: self.reply_count,
            replies,
        }
    }
}

impl RoomRow {
    pub fn into_room(self, member_ids: Vec<String>) -> Option<Room> {
        let Some(kind) = RoomType::from_code(&self.kind) else {
            warn!("Corrupt kind '{}' on room '{}'", self.kind, self.id);
            return None;
        };

        Some(Room {
            last_message: self
                .last_message
                .as_deref()
                .and_then(|raw| decode_json::<Message>(raw, "last_message", &self.id)),
            last_message_at: self.last_message_at.as_deref().and_then(parse_ts),
            id: self.id,
            kind,
            member_ids,
            message_count: self.msg_count,
        })
    }
}

impl SubscriptionRow {
    pub fn into_subscription(self) -> Subscription {
        let context = format!("{}/{}", self.room_id, self.user_id);
        Subscription {
            highlights: decode_json::<Vec<String>>(&self.highlights, "highlights", &context)
                .unwrap_or_default(),
            last_reply_at: self.last_reply_at.as_deref().and_then(parse_ts),
            room_id: self.room_id,
            user_id: self.user_id,
            unread: self.unread,
            group_mentions: self.group_mentions,
            user_mentions: self.user_mentions,
            alert: self.alert,
            open: self.open,
        }
    }
}

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat as naive UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}

fn decode_json<T: DeserializeOwned>(raw: &str, column: &str, owner: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Corrupt {} column on '{}': {}", column, owner, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_shapes() {
        let now = Utc::now();
        let formatted = format_ts(&now);
        let parsed = parse_ts(&formatted).unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());

        let naive = parse_ts("2024-03-01 12:30:00").unwrap();
        assert_eq!(format_ts(&naive), "2024-03-01T12:30:00.000Z");

        assert!(parse_ts("yesterday").is_none());
    }

    #[test]
    fn corrupt_json_columns_degrade() {
        let row = SubscriptionRow {
            room_id: "r1".into(),
            user_id: "u1".into(),
            unread: 2,
            group_mentions: 0,
            user_mentions: 1,
            alert: true,
            open: false,
            last_reply_at: None,
            highlights: "not json".into(),
        };
        let sub = row.into_subscription();
        assert!(sub.highlights.is_empty());
        assert_eq!(sub.unread, 2);
    }

    #[test]
    fn unknown_room_kind_is_dropped() {
        let row = RoomRow {
            id: "r1".into(),
            kind: "z".into(),
            msg_count: 0,
            last_message: None,
            last_message_at: None,
        };
        assert!(row.into_room(vec![]).is_none());
    }
}
