use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock, Weak};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use herald_types::models::RoomType;

pub mod keys {
    pub const UNREAD_COUNT: &str = "Unread_Count";
    pub const UNREAD_COUNT_DM: &str = "Unread_Count_DM";
    pub const UNREAD_COUNT_OMNI: &str = "Unread_Count_Omni";
    pub const STORE_LAST_MESSAGE: &str = "Store_Last_Message";
    pub const THREADS_ENABLED: &str = "Threads_enabled";
    pub const DB_WATCHERS_DISABLED: &str = "Db_Watchers_Disabled";
}

/// (setting key, environment variable) pairs read by `Settings::from_env`.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    (keys::UNREAD_COUNT, "HERALD_UNREAD_COUNT"),
    (keys::UNREAD_COUNT_DM, "HERALD_UNREAD_COUNT_DM"),
    (keys::UNREAD_COUNT_OMNI, "HERALD_UNREAD_COUNT_OMNI"),
    (keys::STORE_LAST_MESSAGE, "HERALD_STORE_LAST_MESSAGE"),
    (keys::THREADS_ENABLED, "HERALD_THREADS_ENABLED"),
    (keys::DB_WATCHERS_DISABLED, "HERALD_DB_WATCHERS_DISABLED"),
];

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("unknown unread count policy '{0}'")]
    UnknownPolicy(String),

    #[error("setting '{key}' expects a {expected} value")]
    WrongType { key: String, expected: &'static str },

    #[error("invalid boolean '{value}' in {var}")]
    InvalidBool { var: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Str(String),
}

/// Which message classes bump a subscriber's unread counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadPolicy {
    AllMessages,
    GroupMentionsOnly,
    UserMentionsOnly,
    UserAndGroupMentionsOnly,
    /// Mention counters only; unread is never bumped outside direct/livechat rooms.
    MentionsOnly,
}

impl UnreadPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllMessages => "all_messages",
            Self::GroupMentionsOnly => "group_mentions_only",
            Self::UserMentionsOnly => "user_mentions_only",
            Self::UserAndGroupMentionsOnly => "user_and_group_mentions_only",
            Self::MentionsOnly => "mentions_only",
        }
    }

    pub fn counts_user_mentions(self) -> bool {
        matches!(
            self,
            Self::AllMessages | Self::UserMentionsOnly | Self::UserAndGroupMentionsOnly
        )
    }

    pub fn counts_group_mentions(self) -> bool {
        matches!(
            self,
            Self::AllMessages | Self::GroupMentionsOnly | Self::UserAndGroupMentionsOnly
        )
    }
}

impl FromStr for UnreadPolicy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_messages" => Ok(Self::AllMessages),
            "group_mentions_only" => Ok(Self::GroupMentionsOnly),
            "user_mentions_only" => Ok(Self::UserMentionsOnly),
            "user_and_group_mentions_only" => Ok(Self::UserAndGroupMentionsOnly),
            "mentions_only" | "none" => Ok(Self::MentionsOnly),
            other => Err(SettingsError::UnknownPolicy(other.to_string())),
        }
    }
}

fn is_policy_key(key: &str) -> bool {
    matches!(key, keys::UNREAD_COUNT | keys::UNREAD_COUNT_DM | keys::UNREAD_COUNT_OMNI)
}

fn is_bool_key(key: &str) -> bool {
    matches!(
        key,
        keys::STORE_LAST_MESSAGE | keys::THREADS_ENABLED | keys::DB_WATCHERS_DISABLED
    )
}

/// Injected settings store with typed lookups and change subscriptions.
#[derive(Clone)]
pub struct Settings {
    inner: Arc<SettingsInner>,
}

struct SettingsInner {
    values: RwLock<HashMap<String, SettingValue>>,
    changes: broadcast::Sender<(String, SettingValue)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        let defaults = [
            (keys::UNREAD_COUNT, SettingValue::Str("user_and_group_mentions_only".into())),
            (keys::UNREAD_COUNT_DM, SettingValue::Str("all_messages".into())),
            (keys::UNREAD_COUNT_OMNI, SettingValue::Str("all_messages".into())),
            (keys::STORE_LAST_MESSAGE, SettingValue::Bool(true)),
            (keys::THREADS_ENABLED, SettingValue::Bool(true)),
            (keys::DB_WATCHERS_DISABLED, SettingValue::Bool(false)),
        ];
        let (changes, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(SettingsInner {
                values: RwLock::new(
                    defaults.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                ),
                changes,
            }),
        }
    }

    /// Defaults overlaid with `HERALD_*` environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let settings = Self::new();
        for (key, var) in ENV_OVERRIDES {
            let Some(raw) = lookup(var) else {
                continue;
            };
            let value = if is_bool_key(key) {
                SettingValue::Bool(parse_bool(var, &raw)?)
            } else {
                SettingValue::Str(raw)
            };
            settings.set(key, value)?;
        }
        Ok(settings)
    }

    pub fn get(&self, key: &str) -> Option<SettingValue> {
        let values = match self.inner.values.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        values.get(key).cloned()
    }

    /// Missing or non-boolean settings read as false.
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some(SettingValue::Bool(true)))
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(SettingValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Unread-count policy for a room kind.
    pub fn unread_policy(&self, kind: RoomType) -> UnreadPolicy {
        let key = match kind {
            RoomType::Direct => keys::UNREAD_COUNT_DM,
            RoomType::Livechat => keys::UNREAD_COUNT_OMNI,
            RoomType::Channel | RoomType::Private => keys::UNREAD_COUNT,
        };

        match self.get_str(key).as_deref().map(str::parse) {
            Some(Ok(policy)) => policy,
            Some(Err(e)) => {
                warn!("{}: {}, falling back to user_and_group_mentions_only", key, e);
                UnreadPolicy::UserAndGroupMentionsOnly
            }
            None => UnreadPolicy::UserAndGroupMentionsOnly,
        }
    }

    /// Store a value and notify watchers if it changed.
    pub fn set(&self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        match &value {
            SettingValue::Str(s) if is_policy_key(key) => {
                s.parse::<UnreadPolicy>()?;
            }
            SettingValue::Bool(_) if is_policy_key(key) => {
                return Err(SettingsError::WrongType { key: key.to_string(), expected: "string" });
            }
            SettingValue::Str(_) if is_bool_key(key) => {
                return Err(SettingsError::WrongType { key: key.to_string(), expected: "boolean" });
            }
            _ => {}
        }

        let previous = {
            let mut values = match self.inner.values.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            values.insert(key.to_string(), value.clone())
        };

        if previous.as_ref() != Some(&value) {
            info!(key, value = ?value, "setting changed");
            // No receivers is fine
            let _ = self.inner.changes.send((key.to_string(), value));
        }
        Ok(())
    }

    /// Subscribe to changes of one key. Dropping the watch unsubscribes.
    pub fn watch(&self, key: &str) -> SettingWatch {
        SettingWatch {
            key: key.to_string(),
            rx: self.inner.changes.subscribe(),
            settings: Arc::downgrade(&self.inner),
        }
    }
}

pub struct SettingWatch {
    key: String,
    rx: broadcast::Receiver<(String, SettingValue)>,
    settings: Weak<SettingsInner>,
}

impl SettingWatch {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next value of the watched key. `None` once the settings store is gone.
    pub async fn changed(&mut self) -> Option<SettingValue> {
        loop {
            match self.rx.recv().await {
                Ok((key, value)) if key == self.key => return Some(value),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(key = %self.key, skipped, "setting watch lagged, re-reading current value");
                    let inner = self.settings.upgrade()?;
                    let current = Settings { inner }.get(&self.key);
                    if current.is_some() {
                        return current;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidBool { var: var.to_string(), value: raw.to_string() }),
    }
}
