use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (rooms, messages, subscriptions)");
        conn.execute_batch(
            "
            CREATE TABLE rooms (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL,
                msg_count       INTEGER NOT NULL DEFAULT 0,
                last_message    TEXT,
                last_message_at TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE room_members (
                room_id     TEXT NOT NULL REFERENCES rooms(id),
                user_id     TEXT NOT NULL,
                PRIMARY KEY (room_id, user_id)
            );

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                room_id         TEXT NOT NULL REFERENCES rooms(id),
                sender_id       TEXT NOT NULL,
                body            TEXT NOT NULL,
                thread_id       TEXT,
                show_in_room    INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                edited_at       TEXT,
                mentions        TEXT,
                reply_count     INTEGER NOT NULL DEFAULT 0,
                replies         TEXT NOT NULL DEFAULT '[]',
                last_reply_at   TEXT
            );

            CREATE INDEX idx_messages_room
                ON messages(room_id, created_at);

            CREATE INDEX idx_messages_thread
                ON messages(thread_id);

            CREATE TABLE subscriptions (
                room_id         TEXT NOT NULL REFERENCES rooms(id),
                user_id         TEXT NOT NULL,
                unread          INTEGER NOT NULL DEFAULT 0 CHECK (unread >= 0),
                group_mentions  INTEGER NOT NULL DEFAULT 0 CHECK (group_mentions >= 0),
                user_mentions   INTEGER NOT NULL DEFAULT 0 CHECK (user_mentions >= 0),
                alert           INTEGER NOT NULL DEFAULT 0,
                open            INTEGER NOT NULL DEFAULT 0,
                last_reply_at   TEXT,
                highlights      TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (room_id, user_id)
            );

            CREATE INDEX idx_subscriptions_user
                ON subscriptions(user_id);

            CREATE TABLE team_members (
                team_id     TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                PRIMARY KEY (team_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
