//! Conversation CRUD over one JSON file per conversation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use fnord_core::{Message, Role};
use ulid::Ulid;

use crate::types::{Conversation, ConversationMeta};

const CONVERSATIONS_DIR_NAME: &str = "conversations";

/// Owns one project's `conversations/` directory.
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    pub fn open(project_dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = project_dir.into().join(CONVERSATIONS_DIR_NAME);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(ConversationStore { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Creates a new, empty conversation and persists it immediately.
    pub fn create(&self) -> Result<Conversation> {
        let conversation = Conversation::new(Ulid::new().to_string());
        self.save(&conversation)?;
        Ok(conversation)
    }

    pub fn load(&self, id: &str) -> Result<Conversation> {
        let path = self.path_for(id);
        if !path.exists() {
            bail!("no such conversation: {id}");
        }
        let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        let path = self.path_for(conversation.id());
        let content = serde_json::to_string_pretty(conversation)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        if !path.exists() {
            bail!("no such conversation: {id}");
        }
        fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))
    }

    /// Lists every conversation's metadata, most recently updated first.
    pub fn list(&self) -> Result<Vec<ConversationMeta>> {
        let mut metas = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(metas),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.dir.display())),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            if let Ok(conversation) = serde_json::from_str::<Conversation>(&content) {
                metas.push(conversation.meta);
            }
        }
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }

    /// `follow`: appends messages to the named conversation in place.
    pub fn follow(&self, id: &str, new_messages: Vec<Message>) -> Result<Conversation> {
        let mut conversation = self.load(id)?;
        conversation.messages.extend(new_messages);
        conversation.meta.updated_at = Utc::now();
        self.save(&conversation)?;
        Ok(conversation)
    }

    /// `fork`: copies the history up to and including the most recent
    /// assistant message into a new conversation with a fresh id. The
    /// source conversation is left untouched.
    pub fn fork(&self, id: &str) -> Result<Conversation> {
        let source = self.load(id)?;
        let cutoff = source
            .messages
            .iter()
            .rposition(|m| matches!(m.role, Role::Assistant))
            .map(|idx| idx + 1)
            .unwrap_or(source.messages.len());

        let mut forked = Conversation::new(Ulid::new().to_string());
        forked.messages = source.messages[..cutoff].to_vec();
        self.save(&forked)?;
        Ok(forked)
    }

    /// Removes conversations whose last update is older than `max_age_days`.
    /// Used by `conversations --prune <DAYS>`.
    pub fn prune(&self, max_age_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(max_age_days);
        let mut removed = 0;
        for meta in self.list()? {
            if meta.updated_at < cutoff {
                self.delete(&meta.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnord_core::Message;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();
        let conversation = store.create().unwrap();
        let loaded = store.load(conversation.id()).unwrap();
        assert_eq!(loaded.id(), conversation.id());
        assert!(loaded.messages.is_empty());
    }

    #[test]
    fn test_follow_appends_in_place() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();
        let conversation = store.create().unwrap();
        let id = conversation.id().to_string();

        store.follow(&id, vec![Message::user("hello")]).unwrap();
        let followed = store.follow(&id, vec![Message::assistant("hi there")]).unwrap();

        assert_eq!(followed.messages.len(), 2);
        assert_eq!(followed.id(), id);
    }

    #[test]
    fn test_fork_copies_up_to_last_assistant_message_and_leaves_source_untouched() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();
        let conversation = store.create().unwrap();
        let id = conversation.id().to_string();

        store
            .follow(
                &id,
                vec![
                    Message::user("first question"),
                    Message::assistant("first answer"),
                    Message::user("follow-up question"),
                ],
            )
            .unwrap();

        let forked = store.fork(&id).unwrap();
        assert_ne!(forked.id(), id);
        assert_eq!(forked.messages.len(), 2);
        assert_eq!(forked.messages[1].content, "first answer");

        let source_after = store.load(&id).unwrap();
        assert_eq!(source_after.messages.len(), 3);
    }

    #[test]
    fn test_prune_removes_old_conversations() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();
        let mut stale = store.create().unwrap();
        stale.meta.updated_at = Utc::now() - Duration::days(100);
        store.save(&stale).unwrap();
        let fresh = store.create().unwrap();

        let removed = store.prune(30).unwrap();
        assert_eq!(removed, 1);
        assert!(store.load(fresh.id()).is_ok());
        assert!(store.load(stale.id()).is_err());
    }
}
