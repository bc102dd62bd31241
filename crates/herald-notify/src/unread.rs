use anyhow::Result;
use tracing::debug;

use herald_types::events::NotifyEvent;
use herald_types::models::{MentionSet, Message, Room, RoomType};

use crate::Notifier;
use crate::mentions::{get_mentions, user_ids_from_highlights};
use crate::settings::{UnreadPolicy, keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionClass {
    /// Named user or highlight keyword
    User,
    /// `@all` / `@here`
    Group,
}

/// Unread increment for one mention. Direct and livechat rooms always count.
pub fn unread_increment(kind: RoomType, policy: UnreadPolicy, class: MentionClass) -> u32 {
    let by_policy = match class {
        MentionClass::User => policy.counts_user_mentions(),
        MentionClass::Group => policy.counts_group_mentions(),
    };
    u32::from(kind.always_counts_unread() || by_policy)
}

impl Notifier {
    /// Bump mention / unread counters for a saved message and flag every
    /// other subscription as alerting and open.
    ///
    /// Counters are additive: running this twice for the same message
    /// counts it twice.
    pub async fn update_users_subscriptions(&self, message: &Message, room: &Room) -> Result<MentionSet> {
        let mentions = get_mentions(message, self.resolver()).await?;

        if !message.is_thread_only() {
            self.increment_counters(message, room, &mentions).await?;
        }

        if self.settings().get_bool(keys::DB_WATCHERS_DISABLED) {
            self.dispatcher().broadcast(NotifyEvent::UserMentions {
                message: message.clone(),
                mentions: mentions.clone(),
            });
        }

        // Two statements instead of one keeps each update on a narrow index.
        let (room_id, sender_id) = (message.room_id.clone(), message.sender_id.clone());
        let (room_id2, sender_id2) = (room_id.clone(), sender_id.clone());
        tokio::try_join!(
            self.blocking(move |db| db.set_alert_excluding_user(&room_id, &sender_id)),
            self.blocking(move |db| db.set_open_excluding_user(&room_id2, &sender_id2)),
        )?;

        Ok(mentions)
    }

    async fn increment_counters(&self, message: &Message, room: &Room, mentions: &MentionSet) -> Result<()> {
        let policy = self.settings().unread_policy(room.kind);

        let highlighted = {
            let msg = message.clone();
            self.blocking(move |db| user_ids_from_highlights(db, &msg)).await?
        };
        let mut user_ids = mentions.mention_ids.clone();
        for uid in highlighted {
            if !user_ids.contains(&uid) {
                user_ids.push(uid);
            }
        }

        debug!(
            message_id = %message.id,
            room_id = %room.id,
            policy = policy.as_str(),
            users = user_ids.len(),
            to_all = mentions.to_all,
            to_here = mentions.to_here,
            "updating subscription counters"
        );

        let room_id = room.id.clone();
        if !user_ids.is_empty() {
            let inc_unread = unread_increment(room.kind, policy, MentionClass::User);
            let (rid, uids) = (room_id.clone(), user_ids.clone());
            self.blocking(move |db| db.inc_user_mentions_and_unread_for_users(&rid, &uids, 1, inc_unread))
                .await?;
        } else if mentions.is_group() {
            let inc_unread = unread_increment(room.kind, policy, MentionClass::Group);
            let (rid, sender) = (room_id.clone(), message.sender_id.clone());
            self.blocking(move |db| {
                db.inc_group_mentions_and_unread_excluding_user(&rid, &sender, 1, inc_unread)
            })
            .await?;
        }

        // Group mentions already covered everybody else
        if !mentions.is_group() && policy == UnreadPolicy::AllMessages {
            let mut excluded = user_ids;
            excluded.push(message.sender_id.clone());
            self.blocking(move |db| db.inc_unread_excluding_users(&room_id, &excluded, 1))
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_kind_overrides_policy() {
        for kind in [RoomType::Direct, RoomType::Livechat] {
            assert_eq!(unread_increment(kind, UnreadPolicy::MentionsOnly, MentionClass::User), 1);
            assert_eq!(unread_increment(kind, UnreadPolicy::UserMentionsOnly, MentionClass::Group), 1);
        }
    }

    #[test]
    fn policy_decides_in_channels() {
        let c = RoomType::Channel;
        assert_eq!(unread_increment(c, UnreadPolicy::AllMessages, MentionClass::Group), 1);
        assert_eq!(unread_increment(c, UnreadPolicy::GroupMentionsOnly, MentionClass::Group), 1);
        assert_eq!(unread_increment(c, UnreadPolicy::GroupMentionsOnly, MentionClass::User), 0);
        assert_eq!(unread_increment(c, UnreadPolicy::UserMentionsOnly, MentionClass::User), 1);
        assert_eq!(unread_increment(c, UnreadPolicy::UserMentionsOnly, MentionClass::Group), 0);
        assert_eq!(unread_increment(c, UnreadPolicy::UserAndGroupMentionsOnly, MentionClass::Group), 1);
        assert_eq!(unread_increment(RoomType::Private, UnreadPolicy::MentionsOnly, MentionClass::User), 0);
    }
}
