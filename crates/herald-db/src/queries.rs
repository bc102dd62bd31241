use crate::Database;
use crate::models::{MessageRow, RoomRow, SubscriptionRow, format_ts};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ToSql};
use tracing::warn;

use herald_types::models::{MentionRef, Message, Room, RoomType, Subscription};

const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, body, thread_id, show_in_room, created_at, \
     edited_at, mentions, reply_count, replies, last_reply_at";

const SUBSCRIPTION_COLUMNS: &str = "room_id, user_id, unread, group_mentions, user_mentions, \
     alert, open, last_reply_at, highlights";

impl Database {
    // -- Rooms --

    /// Create a room, its member list and one subscription per member.
    pub fn create_room(&self, id: &str, kind: RoomType, member_ids: &[String]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("INSERT INTO rooms (id, kind) VALUES (?1, ?2)", (id, kind.code()))?;
            for user_id in member_ids {
                insert_member(&tx, id, user_id)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Join a user to a room. Joining twice is a no-op.
    pub fn add_room_member(&self, room_id: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| insert_member(conn, room_id, user_id))
    }

    pub fn get_room(&self, id: &str) -> Result<Option<Room>> {
        self.with_conn(|conn| query_room(conn, id))
    }

    pub fn inc_room_message_count(&self, room_id: &str, inc: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE rooms SET msg_count = msg_count + ?2 WHERE id = ?1",
                rusqlite::params![room_id, inc],
            )?;
            Ok(())
        })
    }

    pub fn set_room_last_message(&self, room_id: &str, message: &Message) -> Result<()> {
        let encoded = serde_json::to_string(message)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE rooms SET last_message = ?2 WHERE id = ?1",
                rusqlite::params![room_id, encoded],
            )?;
            Ok(())
        })
    }

    /// Bump the message counter and activity timestamp in one statement,
    /// caching `last_message` only when one is given.
    pub fn inc_room_message_count_and_set_last_message(
        &self,
        room_id: &str,
        inc: i64,
        at: &DateTime<Utc>,
        last_message: Option<&Message>,
    ) -> Result<()> {
        let encoded = last_message.map(serde_json::to_string).transpose()?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE rooms
                 SET msg_count = msg_count + ?2,
                     last_message_at = ?3,
                     last_message = COALESCE(?4, last_message)
                 WHERE id = ?1",
                rusqlite::params![room_id, inc, format_ts(at), encoded],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        let mentions = message.mentions.as_ref().map(serde_json::to_string).transpose()?;
        let replies = serde_json::to_string(&message.replies)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, room_id, sender_id, body, thread_id, show_in_room, created_at,
                     edited_at, mentions, reply_count, replies, last_reply_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    message.id,
                    message.room_id,
                    message.sender_id,
                    message.body,
                    message.thread_id,
                    message.show_in_room,
                    format_ts(&message.created_at),
                    message.edited_at.as_ref().map(format_ts),
                    mentions,
                    message.reply_count,
                    replies,
                    message.last_reply_at.as_ref().map(format_ts),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Rewrite a message body. Returns false if the message does not exist
    /// in `room_id`.
    pub fn edit_message(
        &self,
        room_id: &str,
        id: &str,
        body: &str,
        mentions: Option<&[MentionRef]>,
        edited_at: &DateTime<Utc>,
    ) -> Result<bool> {
        let mentions = mentions.map(serde_json::to_string).transpose()?;
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET body = ?2, mentions = ?3, edited_at = ?4
                 WHERE id = ?1 AND room_id = ?5",
                rusqlite::params![id, body, mentions, format_ts(edited_at), room_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Record a reply on a thread parent: bump the reply counter, stamp the
    /// last reply time and fold `participant_ids` into the follower list.
    /// Returns false if the parent does not exist.
    pub fn add_thread_reply(
        &self,
        parent_id: &str,
        participant_ids: &[String],
        at: &DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let raw: Option<String> = conn
                .query_row("SELECT replies FROM messages WHERE id = ?1", [parent_id], |row| {
                    row.get(0)
                })
                .optional()?;

            let Some(raw) = raw else {
                return Ok(false);
            };

            let mut replies: Vec<String> = serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Corrupt replies column on '{}', rebuilding: {}", parent_id, e);
                Vec::new()
            });
            for id in participant_ids {
                if !replies.contains(id) {
                    replies.push(id.clone());
                }
            }

            conn.execute(
                "UPDATE messages
                 SET reply_count = reply_count + 1, last_reply_at = ?2, replies = ?3
                 WHERE id = ?1",
                rusqlite::params![parent_id, format_ts(at), serde_json::to_string(&replies)?],
            )?;
            Ok(true)
        })
    }

    // -- Subscriptions --

    pub fn get_subscription(&self, room_id: &str, user_id: &str) -> Result<Option<Subscription>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE room_id = ?1 AND user_id = ?2"
            );
            let row = conn
                .query_row(&sql, [room_id, user_id], subscription_from_row)
                .optional()?;
            Ok(row.map(SubscriptionRow::into_subscription))
        })
    }

    pub fn list_subscriptions(&self, room_id: &str) -> Result<Vec<Subscription>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE room_id = ?1 ORDER BY rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([room_id], subscription_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(SubscriptionRow::into_subscription).collect())
        })
    }

    /// Replace a user's highlight keywords. Returns false if not subscribed.
    pub fn set_highlights(&self, room_id: &str, user_id: &str, highlights: &[String]) -> Result<bool> {
        let encoded = serde_json::to_string(highlights)?;
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE subscriptions SET highlights = ?3 WHERE room_id = ?1 AND user_id = ?2",
                rusqlite::params![room_id, user_id, encoded],
            )?;
            Ok(changed > 0)
        })
    }

    /// (user_id, highlights) for every subscriber of the room that has any.
    pub fn subscriptions_with_highlights(&self, room_id: &str) -> Result<Vec<(String, Vec<String>)>> {
        let subs = self.list_subscriptions(room_id)?;
        Ok(subs
            .into_iter()
            .filter(|s| !s.highlights.is_empty())
            .map(|s| (s.user_id, s.highlights))
            .collect())
    }

    pub fn inc_group_mentions_and_unread_excluding_user(
        &self,
        room_id: &str,
        exclude_user_id: &str,
        inc_group: u32,
        inc_unread: u32,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE subscriptions
                 SET group_mentions = group_mentions + ?3, unread = unread + ?4
                 WHERE room_id = ?1 AND user_id != ?2",
                rusqlite::params![room_id, exclude_user_id, inc_group, inc_unread],
            )?;
            Ok(changed)
        })
    }

    pub fn inc_user_mentions_and_unread_for_users(
        &self,
        room_id: &str,
        user_ids: &[String],
        inc_user: u32,
        inc_unread: u32,
    ) -> Result<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE subscriptions
                 SET user_mentions = user_mentions + ?1, unread = unread + ?2
                 WHERE room_id = ?3 AND user_id IN ({})",
                placeholders(4, user_ids.len())
            );
            let mut params: Vec<&dyn ToSql> =
                vec![&inc_user as &dyn ToSql, &inc_unread as &dyn ToSql, &room_id as &dyn ToSql];
            params.extend(user_ids.iter().map(|id| id as &dyn ToSql));

            Ok(conn.execute(&sql, params.as_slice())?)
        })
    }

    pub fn inc_unread_excluding_users(
        &self,
        room_id: &str,
        exclude_user_ids: &[String],
        inc: u32,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let mut sql = String::from(
                "UPDATE subscriptions SET unread = unread + ?1 WHERE room_id = ?2",
            );
            if !exclude_user_ids.is_empty() {
                sql.push_str(&format!(
                    " AND user_id NOT IN ({})",
                    placeholders(3, exclude_user_ids.len())
                ));
            }
            let mut params: Vec<&dyn ToSql> = vec![&inc as &dyn ToSql, &room_id as &dyn ToSql];
            params.extend(exclude_user_ids.iter().map(|id| id as &dyn ToSql));

            Ok(conn.execute(&sql, params.as_slice())?)
        })
    }

    pub fn set_alert_excluding_user(&self, room_id: &str, exclude_user_id: &str) -> Result<usize> {
        self.set_flag_excluding_user("alert", room_id, exclude_user_id)
    }

    pub fn set_open_excluding_user(&self, room_id: &str, exclude_user_id: &str) -> Result<usize> {
        self.set_flag_excluding_user("open", room_id, exclude_user_id)
    }

    pub fn set_alert_for_users(&self, room_id: &str, user_ids: &[String]) -> Result<usize> {
        self.set_flag_for_users("alert", room_id, user_ids)
    }

    pub fn set_open_for_users(&self, room_id: &str, user_ids: &[String]) -> Result<usize> {
        self.set_flag_for_users("open", room_id, user_ids)
    }

    pub fn set_last_reply_for_users(
        &self,
        room_id: &str,
        user_ids: &[String],
        at: &DateTime<Utc>,
    ) -> Result<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let at = format_ts(at);
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE subscriptions SET last_reply_at = ?1 WHERE room_id = ?2 AND user_id IN ({})",
                placeholders(3, user_ids.len())
            );
            let mut params: Vec<&dyn ToSql> = vec![&at as &dyn ToSql, &room_id as &dyn ToSql];
            params.extend(user_ids.iter().map(|id| id as &dyn ToSql));

            Ok(conn.execute(&sql, params.as_slice())?)
        })
    }

    // `column` is always one of the two literals above, never user input.
    fn set_flag_excluding_user(&self, column: &str, room_id: &str, exclude_user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE subscriptions SET {column} = 1 WHERE room_id = ?1 AND user_id != ?2"
            );
            Ok(conn.execute(&sql, [room_id, exclude_user_id])?)
        })
    }

    fn set_flag_for_users(&self, column: &str, room_id: &str, user_ids: &[String]) -> Result<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE subscriptions SET {column} = 1 WHERE room_id = ?1 AND user_id IN ({})",
                placeholders(2, user_ids.len())
            );
            let mut params: Vec<&dyn ToSql> = vec![&room_id as &dyn ToSql];
            params.extend(user_ids.iter().map(|id| id as &dyn ToSql));

            Ok(conn.execute(&sql, params.as_slice())?)
        })
    }

    // -- Teams --

    pub fn add_team_member(&self, team_id: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?1, ?2)",
                (team_id, user_id),
            )?;
            Ok(())
        })
    }

    /// Members of the given teams, deduplicated, in insertion order.
    pub fn team_member_ids(&self, team_ids: &[String]) -> Result<Vec<String>> {
        if team_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT user_id FROM team_members WHERE team_id IN ({}) ORDER BY rowid",
                placeholders(1, team_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn ToSql> = team_ids.iter().map(|id| id as &dyn ToSql).collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut members: Vec<String> = Vec::with_capacity(rows.len());
            for id in rows {
                if !members.contains(&id) {
                    members.push(id);
                }
            }
            Ok(members)
        })
    }
}

fn insert_member(conn: &Connection, room_id: &str, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?1, ?2)",
        (room_id, user_id),
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO subscriptions (room_id, user_id) VALUES (?1, ?2)",
        (room_id, user_id),
    )?;
    Ok(())
}

fn query_room(conn: &Connection, id: &str) -> Result<Option<Room>> {
    let row = conn
        .query_row(
            "SELECT id, kind, msg_count, last_message, last_message_at FROM rooms WHERE id = ?1",
            [id],
            |row| {
                Ok(RoomRow {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    msg_count: row.get::<_, i64>(2)?.max(0) as u64,
                    last_message: row.get(3)?,
                    last_message_at: row.get(4)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare("SELECT user_id FROM room_members WHERE room_id = ?1 ORDER BY rowid")?;
    let member_ids = stmt
        .query_map([id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(row.into_room(member_ids))
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<Message>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                room_id: row.get(1)?,
                sender_id: row.get(2)?,
                body: row.get(3)?,
                thread_id: row.get(4)?,
                show_in_room: row.get(5)?,
                created_at: row.get(6)?,
                edited_at: row.get(7)?,
                mentions: row.get(8)?,
                reply_count: row.get(9)?,
                replies: row.get(10)?,
                last_reply_at: row.get(11)?,
            })
        })
        .optional()?;

    Ok(row.map(MessageRow::into_message))
}

fn subscription_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubscriptionRow> {
    Ok(SubscriptionRow {
        room_id: row.get(0)?,
        user_id: row.get(1)?,
        unread: row.get(2)?,
        group_mentions: row.get(3)?,
        user_mentions: row.get(4)?,
        alert: row.get(5)?,
        open: row.get(6)?,
        last_reply_at: row.get(7)?,
        highlights: row.get(8)?,
    })
}

/// "?start, ?start+1, ..." for `count` positional parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn db_with_room(kind: RoomType, members: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_room("r1", kind, &ids(members)).unwrap();
        db
    }

    fn sub(db: &Database, user: &str) -> Subscription {
        db.get_subscription("r1", user).unwrap().unwrap()
    }

    #[test]
    fn create_room_subscribes_members() {
        let db = db_with_room(RoomType::Channel, &["alice", "bob"]);
        let room = db.get_room("r1").unwrap().unwrap();
        assert_eq!(room.kind, RoomType::Channel);
        assert_eq!(room.member_ids, ids(&["alice", "bob"]));
        assert_eq!(db.list_subscriptions("r1").unwrap().len(), 2);

        db.add_room_member("r1", "bob").unwrap();
        db.add_room_member("r1", "carol").unwrap();
        assert_eq!(db.list_subscriptions("r1").unwrap().len(), 3);
        assert!(db.get_room("missing").unwrap().is_none());
    }

    #[test]
    fn message_roundtrip_keeps_mentions_and_thread_fields() {
        let db = db_with_room(RoomType::Channel, &["alice"]);
        let mut msg = Message::new("m1", "r1", "alice", "hello @bob");
        msg.mentions = Some(vec![MentionRef::user("bob"), MentionRef::team("t1")]);
        msg.thread_id = Some("p1".into());
        msg.show_in_room = true;
        db.insert_message(&msg).unwrap();

        let loaded = db.get_message("m1").unwrap().unwrap();
        assert_eq!(loaded.mentions, msg.mentions);
        assert_eq!(loaded.thread_id.as_deref(), Some("p1"));
        assert!(loaded.show_in_room);
        assert_eq!(loaded.created_at.timestamp_millis(), msg.created_at.timestamp_millis());
        assert!(db.get_message("nope").unwrap().is_none());
    }

    #[test]
    fn user_mention_increments_only_listed_users() {
        let db = db_with_room(RoomType::Channel, &["alice", "bob", "carol"]);
        let changed = db
            .inc_user_mentions_and_unread_for_users("r1", &ids(&["bob", "carol"]), 1, 0)
            .unwrap();
        assert_eq!(changed, 2);

        assert_eq!(sub(&db, "bob").user_mentions, 1);
        assert_eq!(sub(&db, "bob").unread, 0);
        assert_eq!(sub(&db, "alice").user_mentions, 0);
        assert_eq!(db.inc_user_mentions_and_unread_for_users("r1", &[], 1, 1).unwrap(), 0);
    }

    #[test]
    fn group_and_plain_unread_skip_excluded_users() {
        let db = db_with_room(RoomType::Channel, &["alice", "bob", "carol"]);
        db.inc_group_mentions_and_unread_excluding_user("r1", "alice", 1, 1).unwrap();
        assert_eq!(sub(&db, "alice").group_mentions, 0);
        assert_eq!(sub(&db, "bob").group_mentions, 1);
        assert_eq!(sub(&db, "carol").unread, 1);

        db.inc_unread_excluding_users("r1", &ids(&["alice", "bob"]), 1).unwrap();
        assert_eq!(sub(&db, "bob").unread, 1);
        assert_eq!(sub(&db, "carol").unread, 2);

        db.inc_unread_excluding_users("r1", &[], 1).unwrap();
        assert_eq!(sub(&db, "alice").unread, 1);
    }

    #[test]
    fn flags_and_last_reply() {
        let db = db_with_room(RoomType::Channel, &["alice", "bob", "carol"]);
        db.set_alert_excluding_user("r1", "alice").unwrap();
        db.set_open_for_users("r1", &ids(&["alice"])).unwrap();
        assert!(!sub(&db, "alice").alert);
        assert!(sub(&db, "alice").open);
        assert!(sub(&db, "bob").alert);
        assert!(!sub(&db, "bob").open);

        let at = Utc::now();
        db.set_last_reply_for_users("r1", &ids(&["carol"]), &at).unwrap();
        assert_eq!(
            sub(&db, "carol").last_reply_at.map(|t| t.timestamp_millis()),
            Some(at.timestamp_millis())
        );
        assert!(sub(&db, "bob").last_reply_at.is_none());
    }

    #[test]
    fn room_counter_and_last_message() {
        let db = db_with_room(RoomType::Channel, &["alice"]);
        let msg = Message::new("m1", "r1", "alice", "hi");

        db.inc_room_message_count("r1", 1).unwrap();
        db.inc_room_message_count_and_set_last_message("r1", 1, &msg.created_at, None).unwrap();
        let room = db.get_room("r1").unwrap().unwrap();
        assert_eq!(room.message_count, 2);
        assert!(room.last_message.is_none());
        assert!(room.last_message_at.is_some());

        db.inc_room_message_count_and_set_last_message("r1", 1, &msg.created_at, Some(&msg)).unwrap();
        let room = db.get_room("r1").unwrap().unwrap();
        assert_eq!(room.message_count, 3);
        assert_eq!(room.last_message.map(|m| m.id), Some("m1".to_string()));
    }

    #[test]
    fn thread_reply_merges_followers() {
        let db = db_with_room(RoomType::Channel, &["alice"]);
        db.insert_message(&Message::new("p1", "r1", "alice", "parent")).unwrap();

        let at = Utc::now();
        assert!(db.add_thread_reply("p1", &ids(&["bob", "alice"]), &at).unwrap());
        assert!(db.add_thread_reply("p1", &ids(&["carol", "bob"]), &at).unwrap());
        assert!(!db.add_thread_reply("missing", &ids(&["bob"]), &at).unwrap());

        let parent = db.get_message("p1").unwrap().unwrap();
        assert_eq!(parent.reply_count, 2);
        assert_eq!(parent.replies, ids(&["bob", "alice", "carol"]));
        assert!(parent.last_reply_at.is_some());
    }

    #[test]
    fn corrupt_follower_list_is_rebuilt() {
        let db = db_with_room(RoomType::Channel, &["alice"]);
        db.insert_message(&Message::new("p1", "r1", "alice", "parent")).unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE messages SET replies = 'oops' WHERE id = 'p1'", [])?;
            Ok(())
        })
        .unwrap();

        assert!(db.add_thread_reply("p1", &ids(&["bob"]), &Utc::now()).unwrap());
        let parent = db.get_message("p1").unwrap().unwrap();
        assert_eq!((parent.reply_count, parent.replies), (1, ids(&["bob"])));
    }

    #[test]
    fn edit_is_scoped_to_the_room() {
        let db = db_with_room(RoomType::Channel, &["alice"]);
        db.create_room("r2", RoomType::Channel, &ids(&["alice"])).unwrap();
        db.insert_message(&Message::new("m1", "r2", "alice", "original")).unwrap();

        let at = Utc::now();
        assert!(!db.edit_message("r1", "m1", "hijacked", None, &at).unwrap());
        let stored = db.get_message("m1").unwrap().unwrap();
        assert_eq!(stored.body, "original");
        assert!(stored.edited_at.is_none());

        assert!(db.edit_message("r2", "m1", "fixed", None, &at).unwrap());
        assert_eq!(db.get_message("m1").unwrap().unwrap().body, "fixed");
        assert!(!db.edit_message("r2", "missing", "x", None, &at).unwrap());
    }

    #[test]
    fn highlights_and_team_members() {
        let db = db_with_room(RoomType::Channel, &["alice", "bob"]);
        assert!(db.set_highlights("r1", "bob", &ids(&["deploy"])).unwrap());
        assert!(!db.set_highlights("r1", "nobody", &ids(&["x"])).unwrap());
        assert_eq!(
            db.subscriptions_with_highlights("r1").unwrap(),
            vec![("bob".to_string(), ids(&["deploy"]))]
        );

        db.add_team_member("t1", "carol").unwrap();
        db.add_team_member("t1", "dave").unwrap();
        db.add_team_member("t2", "carol").unwrap();
        assert_eq!(db.team_member_ids(&ids(&["t1", "t2"])).unwrap(), ids(&["carol", "dave"]));
        assert!(db.team_member_ids(&[]).unwrap().is_empty());
    }
}
