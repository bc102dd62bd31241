use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use herald_types::models::{Message, Room};

use crate::Notifier;
use crate::hooks::{Hook, HookRegistry, Priority};
use crate::settings::{SettingValue, keys};

pub const NOTIFY_HOOK: &str = "notify-users-on-message";
pub const THREADS_HOOK: &str = "threads-after-save-message";

/// Messages created or edited further than this from "now" are treated as
/// imported history and never notify.
pub const IMPORT_SKEW_MS: i64 = 60_000;

fn beyond_skew(ts: &DateTime<Utc>, now: &DateTime<Utc>) -> bool {
    (*now - *ts).num_milliseconds().abs() > IMPORT_SKEW_MS
}

impl Notifier {
    /// Room-level bookkeeping for a freshly saved message.
    pub async fn notify_users_on_message(&self, message: &Message, room: &Room) -> Result<()> {
        let now = Utc::now();
        let room_id = message.room_id.clone();
        let store_last_message = self.settings().get_bool(keys::STORE_LAST_MESSAGE);

        if let Some(edited_at) = message.edited_at {
            if beyond_skew(&edited_at, &now) {
                debug!(message_id = %message.id, "old edit, counting as imported");
                return self.blocking(move |db| db.inc_room_message_count(&room_id, 1)).await;
            }

            let is_last = room.last_message.as_ref().is_none_or(|last| last.id == message.id);
            if store_last_message && !message.is_thread_only() && is_last {
                let msg = message.clone();
                self.blocking(move |db| db.set_room_last_message(&room_id, &msg)).await?;
            }
            return Ok(());
        }

        if beyond_skew(&message.created_at, &now) {
            debug!(message_id = %message.id, "imported message, counter only");
            return self.blocking(move |db| db.inc_room_message_count(&room_id, 1)).await;
        }

        // Thread-only replies are handled by the thread hook
        if message.is_thread_only() {
            return self.blocking(move |db| db.inc_room_message_count(&room_id, 1)).await;
        }

        let last = store_last_message.then(|| message.clone());
        let at = message.created_at;
        self.blocking(move |db| {
            db.inc_room_message_count_and_set_last_message(&room_id, 1, &at, last.as_ref())
        })
        .await?;

        self.update_users_subscriptions(message, room).await?;
        Ok(())
    }
}

pub fn notify_hook(notifier: Notifier) -> Hook {
    Hook::new(NOTIFY_HOOK, Priority::Medium, move |message, room| {
        let notifier = notifier.clone();
        async move { notifier.notify_users_on_message(&message, &room).await }
    })
}

/// Runs after the base hook so room-level bookkeeping always lands first.
pub fn threads_hook(notifier: Notifier) -> Hook {
    Hook::new(THREADS_HOOK, Priority::Low, move |message, room| {
        let notifier = notifier.clone();
        async move { notifier.process_threads(&message, &room).await }
    })
    .when(|message| message.thread_id.is_some())
}

pub async fn apply_threads_setting(registry: &HookRegistry, notifier: &Notifier, enabled: bool) {
    if enabled {
        registry.add(threads_hook(notifier.clone())).await;
    } else {
        registry.remove(THREADS_HOOK).await;
    }
}

/// Keeps the thread hook in sync with `Threads_enabled`. Dropping it (or
/// calling `shutdown`) stops the watcher; registered hooks stay as they are.
pub struct HookInstallation {
    watcher: JoinHandle<()>,
}

impl HookInstallation {
    pub async fn shutdown(self) {
        self.watcher.abort();
    }
}

impl Drop for HookInstallation {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Register the after-save hooks and start following the threads toggle.
pub async fn install(registry: &HookRegistry, notifier: &Notifier) -> HookInstallation {
    // Subscribe before reading so no change slips in between
    let mut watch = notifier.settings().watch(keys::THREADS_ENABLED);

    registry.add(notify_hook(notifier.clone())).await;
    apply_threads_setting(registry, notifier, notifier.settings().get_bool(keys::THREADS_ENABLED)).await;

    let registry = registry.clone();
    let notifier = notifier.clone();
    let watcher = tokio::spawn(async move {
        while let Some(value) = watch.changed().await {
            let enabled = matches!(value, SettingValue::Bool(true));
            info!(enabled, "threads setting changed");
            apply_threads_setting(&registry, &notifier, enabled).await;
        }
    });

    HookInstallation { watcher }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn skew_is_symmetric() {
        let now = Utc::now();
        assert!(!beyond_skew(&now, &now));
        assert!(!beyond_skew(&(now - Duration::seconds(59)), &now));
        assert!(beyond_skew(&(now - Duration::seconds(61)), &now));
        assert!(beyond_skew(&(now + Duration::seconds(61)), &now));
    }
}
