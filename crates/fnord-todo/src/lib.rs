//! Flat task-list storage for a project (§4.3 "task-list CRUD").
//!
//! Unlike the teacher's `csa-todo`, which tracks plans as a git-versioned
//! DAG of timestamped directories, this is a single flat JSON document per
//! project: `<project>/tasks.json`. The DAG/git-branch machinery has no
//! counterpart in the target system and is not carried over.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TaskDocument {
    tasks: Vec<Task>,
}

/// Owns one project's `tasks.json`, read-modify-write with an atomic
/// temp-file-then-rename write, matching the on-disk conventions used
/// elsewhere in the store (§6).
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn open(project_dir: impl Into<PathBuf>) -> Result<Self> {
        let project_dir = project_dir.into();
        fs::create_dir_all(&project_dir)
            .with_context(|| format!("creating {}", project_dir.display()))?;
        Ok(TaskStore { path: project_dir.join("tasks.json") })
    }

    fn read(&self) -> Result<TaskDocument> {
        if !self.path.exists() {
            return Ok(TaskDocument::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(TaskDocument::default());
        }
        serde_json::from_str(&content).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn write(&self, doc: &TaskDocument) -> Result<()> {
        let content = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Task>> {
        Ok(self.read()?.tasks)
    }

    pub fn add(&self, text: impl Into<String>) -> Result<Task> {
        let mut doc = self.read()?;
        let now = Utc::now();
        let task = Task {
            id: Ulid::new().to_string(),
            text: text.into(),
            status: TaskStatus::Open,
            created_at: now,
            updated_at: now,
        };
        doc.tasks.push(task.clone());
        self.write(&doc)?;
        Ok(task)
    }

    pub fn set_status(&self, id: &str, status: TaskStatus) -> Result<Option<Task>> {
        let mut doc = self.read()?;
        let Some(task) = doc.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        task.status = status;
        task.updated_at = Utc::now();
        let updated = task.clone();
        self.write(&doc)?;
        Ok(Some(updated))
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut doc = self.read()?;
        let before = doc.tasks.len();
        doc.tasks.retain(|t| t.id != id);
        let removed = doc.tasks.len() != before;
        if removed {
            self.write(&doc)?;
        }
        Ok(removed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_list_round_trip() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let task = store.add("write tests").unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, task.id);
        assert_eq!(listed[0].status, TaskStatus::Open);
    }

    #[test]
    fn test_set_status_updates_timestamp() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let task = store.add("ship it").unwrap();
        let updated = store.set_status(&task.id, TaskStatus::Done).unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert!(updated.updated_at >= task.updated_at);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        assert!(!store.remove("does-not-exist").unwrap());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = TaskStore::open(dir.path()).unwrap();
            store.add("persisted").unwrap();
        }
        let reopened = TaskStore::open(dir.path()).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
    }
}
