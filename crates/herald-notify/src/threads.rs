use anyhow::Result;
use chrono::Utc;
use tracing::{debug, warn};

use herald_types::events::NotifyEvent;
use herald_types::models::{Message, Room, RoomType};

use crate::Notifier;
use crate::mentions::get_mentions;

/// Users following a thread after `sender_id` replies to `parent`.
///
/// The first reply seeds the list with the parent's author (and every member
/// of a direct room); later replies reuse the parent's recorded followers.
/// Mentioned users join either way. The replying user is never included.
pub fn thread_followers(parent: &Message, room: &Room, sender_id: &str, mention_ids: &[String]) -> Vec<String> {
    let mut candidates: Vec<&String> = Vec::new();
    if parent.reply_count == 0 {
        candidates.push(&parent.sender_id);
        if room.kind == RoomType::Direct {
            candidates.extend(room.member_ids.iter());
        }
    } else {
        candidates.extend(parent.replies.iter());
    }
    candidates.extend(mention_ids.iter());

    let mut followers: Vec<String> = Vec::new();
    for id in candidates {
        if id != sender_id && !followers.contains(id) {
            followers.push(id.clone());
        }
    }
    followers
}

impl Notifier {
    /// Alert followers, open the thread room for followers and the sender,
    /// and stamp their last reply time.
    pub async fn update_thread_users_subscriptions(&self, message: &Message, followers: &[String]) -> Result<()> {
        let mut with_sender = vec![message.sender_id.clone()];
        with_sender.extend(followers.iter().filter(|id| **id != message.sender_id).cloned());

        let now = Utc::now();
        let (rid_alert, rid_open, rid_reply) = (
            message.room_id.clone(),
            message.room_id.clone(),
            message.room_id.clone(),
        );
        let alert_ids = followers.to_vec();
        let open_ids = with_sender.clone();

        tokio::try_join!(
            self.blocking(move |db| db.set_alert_for_users(&rid_alert, &alert_ids)),
            self.blocking(move |db| db.set_open_for_users(&rid_open, &open_ids)),
            self.blocking(move |db| db.set_last_reply_for_users(&rid_reply, &with_sender, &now)),
        )?;
        Ok(())
    }

    /// Thread bookkeeping for a saved reply. Messages outside a thread and
    /// replies whose parent is gone or lives in another room are skipped
    /// without error.
    pub async fn process_threads(&self, message: &Message, room: &Room) -> Result<()> {
        let Some(thread_id) = message.thread_id.clone() else {
            return Ok(());
        };

        let parent = {
            let tid = thread_id.clone();
            self.blocking(move |db| db.get_message(&tid)).await?
        };
        let Some(parent) = parent else {
            debug!(message_id = %message.id, thread_id = %thread_id, "thread parent missing, skipping");
            return Ok(());
        };
        if parent.room_id != message.room_id {
            warn!(
                message_id = %message.id,
                thread_id = %thread_id,
                parent_room = %parent.room_id,
                "thread parent belongs to another room, skipping"
            );
            return Ok(());
        }

        let mentions = get_mentions(message, self.resolver()).await?;
        let followers = thread_followers(&parent, room, &message.sender_id, &mentions.mention_ids);

        debug!(
            message_id = %message.id,
            thread_id = %thread_id,
            followers = followers.len(),
            edited = message.is_edited(),
            "processing thread reply"
        );

        if !message.is_edited() {
            self.update_thread_users_subscriptions(message, &followers).await?;

            let mut participants = vec![message.sender_id.clone()];
            participants.extend(followers.iter().cloned());
            let (tid, at) = (thread_id.clone(), message.created_at);
            self.blocking(move |db| db.add_thread_reply(&tid, &participants, &at)).await?;

            self.dispatcher()
                .send_to_users(
                    &followers,
                    NotifyEvent::ThreadReply {
                        thread_id: thread_id.clone(),
                        room_id: message.room_id.clone(),
                        message_id: message.id.clone(),
                        sender_id: message.sender_id.clone(),
                    },
                )
                .await;
        }

        self.dispatcher().broadcast(NotifyEvent::MessageUpdated { id: thread_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn room(kind: RoomType, members: &[&str]) -> Room {
        Room {
            id: "r1".into(),
            kind,
            member_ids: ids(members),
            message_count: 0,
            last_message: None,
            last_message_at: None,
        }
    }

    #[test]
    fn first_reply_follows_parent_author() {
        let parent = Message::new("p1", "r1", "alice", "parent");
        let followers = thread_followers(&parent, &room(RoomType::Channel, &["alice", "bob", "carol"]), "bob", &[]);
        assert_eq!(followers, ids(&["alice"]));
    }

    #[test]
    fn first_reply_in_direct_room_adds_members() {
        let parent = Message::new("p1", "r1", "alice", "parent");
        let followers =
            thread_followers(&parent, &room(RoomType::Direct, &["alice", "bob"]), "bob", &ids(&["dave"]));
        assert_eq!(followers, ids(&["alice", "dave"]));
    }

    #[test]
    fn later_replies_reuse_recorded_followers() {
        let mut parent = Message::new("p1", "r1", "alice", "parent");
        parent.reply_count = 2;
        parent.replies = ids(&["alice", "bob", "carol"]);

        let followers =
            thread_followers(&parent, &room(RoomType::Direct, &["zed"]), "carol", &ids(&["bob", "erin"]));
        assert_eq!(followers, ids(&["alice", "bob", "erin"]));
    }

    #[test]
    fn self_reply_to_own_parent_has_no_followers() {
        let parent = Message::new("p1", "r1", "alice", "parent");
        assert!(thread_followers(&parent, &room(RoomType::Channel, &[]), "alice", &[]).is_empty());
    }
}
