//! Post-save notification pipeline: mention extraction, unread bookkeeping,
//! thread follower tracking and the hook registry that sequences them.

pub mod dispatcher;
pub mod hooks;
pub mod mentions;
pub mod settings;
pub mod threads;
pub mod trigger;
pub mod unread;

use std::sync::Arc;

use anyhow::{Result, anyhow};

use herald_db::Database;

use crate::dispatcher::Dispatcher;
use crate::mentions::{TeamMembersResolver, TeamMentionResolver};
use crate::settings::Settings;

/// Everything the pipeline needs, injected once at startup.
#[derive(Clone)]
pub struct Notifier {
    db: Arc<Database>,
    settings: Settings,
    dispatcher: Dispatcher,
    resolver: Arc<dyn TeamMentionResolver>,
}

impl Notifier {
    /// Team mentions are expanded from the database's team membership.
    pub fn new(db: Arc<Database>, settings: Settings, dispatcher: Dispatcher) -> Self {
        let resolver = Arc::new(TeamMembersResolver::new(db.clone()));
        Self {
            db,
            settings,
            dispatcher,
            resolver,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn TeamMentionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn resolver(&self) -> &dyn TeamMentionResolver {
        self.resolver.as_ref()
    }

    /// Run a database call off the async runtime.
    pub(crate) async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
    }
}
