use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use regex::RegexBuilder;
use tracing::warn;

use herald_db::Database;
use herald_types::models::{MENTION_ALL, MENTION_HERE, MentionKind, MentionRef, MentionSet, Message};

/// Expands team mentions into member user ids.
///
/// Receives the already filtered direct user ids and the team mentions; its
/// output replaces the direct id list.
#[async_trait]
pub trait TeamMentionResolver: Send + Sync {
    async fn resolve(&self, user_ids: Vec<String>, teams: &[MentionRef]) -> Result<Vec<String>>;
}

/// Leaves the direct ids untouched. Behaves like having no resolver at all.
#[derive(Debug, Default)]
pub struct PassThroughResolver;

#[async_trait]
impl TeamMentionResolver for PassThroughResolver {
    async fn resolve(&self, user_ids: Vec<String>, _teams: &[MentionRef]) -> Result<Vec<String>> {
        Ok(user_ids)
    }
}

/// Direct ids plus every member of the mentioned teams.
pub struct TeamMembersResolver {
    db: Arc<Database>,
}

impl TeamMembersResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TeamMentionResolver for TeamMembersResolver {
    async fn resolve(&self, user_ids: Vec<String>, teams: &[MentionRef]) -> Result<Vec<String>> {
        let db = self.db.clone();
        let team_ids: Vec<String> = teams.iter().map(|t| t.id.clone()).collect();
        let members = tokio::task::spawn_blocking(move || db.team_member_ids(&team_ids))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

        let mut resolved = user_ids;
        push_unique(&mut resolved, members);
        Ok(resolved)
    }
}

/// Split a message's mention list into broadcast flags and user ids.
pub async fn get_mentions(message: &Message, resolver: &dyn TeamMentionResolver) -> Result<MentionSet> {
    let Some(mentions) = &message.mentions else {
        return Ok(MentionSet::default());
    };

    let to_all = mentions.iter().any(|m| m.id == MENTION_ALL);
    let to_here = mentions.iter().any(|m| m.id == MENTION_HERE);

    let teams: Vec<MentionRef> = mentions
        .iter()
        .filter(|m| m.kind == Some(MentionKind::Team))
        .cloned()
        .collect();

    let direct = mentions
        .iter()
        .filter(|m| m.is_direct())
        .map(|m| m.id.clone());
    let direct = keep_mentionable(direct, &message.sender_id);

    let mention_ids = if teams.is_empty() {
        direct
    } else {
        // Resolver output replaces the direct list
        let resolved = resolver.resolve(direct, &teams).await?;
        keep_mentionable(resolved, &message.sender_id)
    };

    Ok(MentionSet {
        to_all,
        to_here,
        mention_ids,
    })
}

/// Drop the sender and broadcast tokens, dedupe in order.
fn keep_mentionable(ids: impl IntoIterator<Item = String>, sender_id: &str) -> Vec<String> {
    let mut kept = Vec::new();
    push_unique(
        &mut kept,
        ids.into_iter()
            .filter(|id| id != sender_id && id != MENTION_ALL && id != MENTION_HERE),
    );
    kept
}

fn push_unique(target: &mut Vec<String>, ids: impl IntoIterator<Item = String>) {
    for id in ids {
        if !target.contains(&id) {
            target.push(id);
        }
    }
}

/// Case-insensitive literal match of any highlight keyword in `body`.
pub fn message_contains_highlight(body: &str, highlights: &[String]) -> bool {
    highlights.iter().filter(|h| !h.trim().is_empty()).any(|highlight| {
        match RegexBuilder::new(&regex::escape(highlight)).case_insensitive(true).build() {
            Ok(re) => re.is_match(body),
            Err(e) => {
                warn!("Unusable highlight '{}': {}", highlight, e);
                false
            }
        }
    })
}

/// Subscribers of the message's room, other than the sender, whose
/// highlight keywords occur in the body.
pub fn user_ids_from_highlights(db: &Database, message: &Message) -> Result<Vec<String>> {
    let subs = db.subscriptions_with_highlights(&message.room_id)?;
    Ok(subs
        .into_iter()
        .filter(|(uid, highlights)| {
            uid != &message.sender_id && message_contains_highlight(&message.body, highlights)
        })
        .map(|(uid, _)| uid)
        .collect())
}
