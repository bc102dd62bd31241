use serde::{Deserialize, Serialize};

use crate::models::{MentionRef, RoomType};

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub kind: RoomType,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub body: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub show_in_room: bool,
    #[serde(default)]
    pub mentions: Option<Vec<MentionRef>>,
    /// Original timestamp for imported history (RFC 3339).
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub body: String,
    #[serde(default)]
    pub mentions: Option<Vec<MentionRef>>,
}

// -- Subscriptions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetHighlightsRequest {
    pub highlights: Vec<String>,
}

// -- Settings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingRequest {
    pub value: serde_json::Value,
}
