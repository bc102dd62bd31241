use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures_util::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{debug, info};

use herald_types::models::{Message, Room};

pub type HookHandler = Arc<dyn Fn(Arc<Message>, Arc<Room>) -> BoxFuture<'static, Result<()>> + Send + Sync>;
pub type HookPredicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// Run order; lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A named after-save handler.
#[derive(Clone)]
pub struct Hook {
    name: String,
    priority: Priority,
    predicate: Option<HookPredicate>,
    handler: HookHandler,
}

impl Hook {
    pub fn new<F, Fut>(name: impl Into<String>, priority: Priority, handler: F) -> Self
    where
        F: Fn(Arc<Message>, Arc<Room>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority,
            predicate: None,
            handler: Arc::new(move |message, room| Box::pin(handler(message, room))),
        }
    }

    /// Only run for messages matching `predicate`.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    fn matches(&self, message: &Message) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(message))
    }
}

/// Ordered, runtime-mutable list of after-save hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Arc<RwLock<Vec<Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, replacing any hook with the same name. Hooks of
    /// equal priority keep registration order.
    pub async fn add(&self, hook: Hook) {
        let mut hooks = self.hooks.write().await;
        hooks.retain(|h| h.name != hook.name);
        info!(hook = %hook.name, priority = ?hook.priority, "hook registered");
        hooks.push(hook);
        hooks.sort_by_key(|h| h.priority);
    }

    /// Returns true if a hook was removed.
    pub async fn remove(&self, name: &str) -> bool {
        let mut hooks = self.hooks.write().await;
        let before = hooks.len();
        hooks.retain(|h| h.name != name);
        let removed = hooks.len() != before;
        if removed {
            info!(hook = %name, "hook removed");
        }
        removed
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.hooks.read().await.iter().any(|h| h.name == name)
    }

    /// Hook names in run order.
    pub async fn names(&self) -> Vec<String> {
        self.hooks.read().await.iter().map(|h| h.name.clone()).collect()
    }

    /// Run every matching hook in order. The first failure stops the run
    /// and is returned as is.
    pub async fn run(&self, message: Arc<Message>, room: Arc<Room>) -> Result<()> {
        // Snapshot so hooks can be added or removed while a run is in flight
        let hooks = self.hooks.read().await.clone();

        for hook in hooks.iter().filter(|h| h.matches(&message)) {
            debug!(hook = %hook.name, message_id = %message.id, "running after-save hook");
            (hook.handler)(message.clone(), room.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_types::models::RoomType;
    use std::sync::Mutex;

    fn room() -> Arc<Room> {
        Arc::new(Room {
            id: "r1".into(),
            kind: RoomType::Channel,
            member_ids: vec![],
            message_count: 0,
            last_message: None,
            last_message_at: None,
        })
    }

    fn recording(name: &'static str, priority: Priority, log: Arc<Mutex<Vec<&'static str>>>) -> Hook {
        Hook::new(name, priority, move |_m, _r| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn runs_by_priority_then_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HookRegistry::new();
        registry.add(recording("low", Priority::Low, log.clone())).await;
        registry.add(recording("medium-a", Priority::Medium, log.clone())).await;
        registry.add(recording("high", Priority::High, log.clone())).await;
        registry.add(recording("medium-b", Priority::Medium, log.clone())).await;

        assert_eq!(registry.names().await, vec!["high", "medium-a", "medium-b", "low"]);

        let msg = Arc::new(Message::new("m1", "r1", "alice", "hi"));
        registry.run(msg, room()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["high", "medium-a", "medium-b", "low"]);
    }

    #[tokio::test]
    async fn add_replaces_and_remove_by_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HookRegistry::new();
        registry.add(recording("a", Priority::Low, log.clone())).await;
        registry.add(recording("a", Priority::High, log.clone())).await;
        assert_eq!(registry.names().await, vec!["a"]);

        assert!(registry.remove("a").await);
        assert!(!registry.remove("a").await);
        assert!(!registry.contains("a").await);
    }

    #[tokio::test]
    async fn predicate_filters_and_errors_stop_the_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HookRegistry::new();
        registry
            .add(recording("threads-only", Priority::High, log.clone()).when(|m| m.thread_id.is_some()))
            .await;
        registry
            .add(Hook::new("boom", Priority::Medium, |_m, _r| async {
                Err(anyhow::anyhow!("storage unavailable"))
            }))
            .await;
        registry.add(recording("after", Priority::Low, log.clone())).await;

        let msg = Arc::new(Message::new("m1", "r1", "alice", "hi"));
        let err = registry.run(msg, room()).await.unwrap_err();
        assert_eq!(err.to_string(), "storage unavailable");
        assert!(log.lock().unwrap().is_empty());
    }
}
