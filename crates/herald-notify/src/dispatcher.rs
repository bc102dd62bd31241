use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use herald_types::events::NotifyEvent;

/// Fans pipeline events out to realtime consumers.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel; every subscriber receives every event
    broadcast_tx: broadcast::Sender<NotifyEvent>,

    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<String, (Uuid, mpsc::UnboundedSender<NotifyEvent>)>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotifyEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    pub fn broadcast(&self, event: NotifyEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    /// A newer registration for the same user replaces the older one.
    pub async fn register_user_channel(
        &self,
        user_id: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<NotifyEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id.to_string(), (conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister a per-user targeted channel, but only if conn_id matches.
    pub async fn unregister_user_channel(&self, user_id: &str, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(user_id);
            }
        }
    }

    /// Send a targeted event to each listed user. Offline users are skipped.
    pub async fn send_to_users(&self, user_ids: &[String], event: NotifyEvent) {
        let channels = self.inner.user_channels.read().await;
        for user_id in user_ids {
            if let Some((_, tx)) = channels.get(user_id) {
                let _ = tx.send(event.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn targeted_sends_reach_current_connection_only() {
        let dispatcher = Dispatcher::new();
        let (old_conn, mut old_rx) = dispatcher.register_user_channel("bob").await;
        let (_new_conn, mut new_rx) = dispatcher.register_user_channel("bob").await;

        // Stale connection cannot unregister the newer one
        dispatcher.unregister_user_channel("bob", old_conn).await;

        dispatcher
            .send_to_users(
                &["bob".to_string(), "offline".to_string()],
                NotifyEvent::MessageUpdated { id: "m1".into() },
            )
            .await;

        assert!(matches!(new_rx.recv().await, Some(NotifyEvent::MessageUpdated { .. })));
        assert!(old_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();
        dispatcher.broadcast(NotifyEvent::MessageUpdated { id: "m1".into() });
        assert!(matches!(rx.recv().await, Ok(NotifyEvent::MessageUpdated { id }) if id == "m1"));
    }
}
