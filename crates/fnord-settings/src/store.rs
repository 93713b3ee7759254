use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use fnord_core::ApprovalRecord;
use serde_json::Value;

use crate::document::{McpServerConfig, ProjectRecord, SettingsDocument};

const RESERVED_KEYS: [&str; 4] = ["projects", "approvals", "mcp_servers", "version"];

/// Snapshot of every approval list at first load, used to heal accidental
/// data loss from racing writers (§4.1, §9 "Self-healing approvals").
#[derive(Default, Clone)]
struct ApprovalsBaseline {
    global: HashMap<String, Vec<ApprovalRecord>>,
    per_project: HashMap<String, HashMap<String, Vec<ApprovalRecord>>>,
}

pub struct SettingsStore {
    path: PathBuf,
    lock_timeout: Duration,
    stale_after: Duration,
    baseline: Mutex<Option<ApprovalsBaseline>>,
}

impl SettingsStore {
    /// Resolve `~/.fnord/settings.json`, creating the home directory (but
    /// not the file) if absent.
    pub fn default_path() -> Result<PathBuf> {
        let home = directories::BaseDirs::new()
            .map(|b| b.home_dir().to_path_buf())
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .context("could not resolve home directory")?;
        Ok(home.join(".fnord").join("settings.json"))
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let store = SettingsStore {
            path,
            lock_timeout: Duration::from_secs(5),
            stale_after: Duration::from_secs(120),
            baseline: Mutex::new(None),
        };
        store.ensure_migrated()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs migration if needed; idempotent (§4.1).
    fn ensure_migrated(&self) -> Result<()> {
        self.mutate(|_doc| Ok(()))?;
        Ok(())
    }

    fn read_raw(&self) -> Result<Value> {
        if !self.path.exists() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&content).with_context(|| format!("parsing {}", self.path.display()))
    }

    /// Migrates a raw JSON value: if `projects` is absent, moves every
    /// non-reserved top-level key under it and stamps `version`.
    fn migrate_raw(mut raw: Value) -> Value {
        if let Some(obj) = raw.as_object_mut() {
            if !obj.contains_key("projects") {
                let mut projects = serde_json::Map::new();
                let legacy_keys: Vec<String> = obj
                    .keys()
                    .filter(|k| !RESERVED_KEYS.contains(&k.as_str()))
                    .cloned()
                    .collect();
                for key in legacy_keys {
                    if let Some(v) = obj.remove(&key) {
                        projects.insert(key, v);
                    }
                }
                obj.insert("projects".to_string(), Value::Object(projects));
            }
            obj.entry("approvals")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            obj.entry("mcp_servers")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            obj.entry("version")
                .or_insert(Value::from(SettingsDocument::CURRENT_VERSION));
        } else {
            raw = Value::Object(serde_json::Map::new());
            return Self::migrate_raw(raw);
        }
        raw
    }

    fn write_raw(&self, doc: &SettingsDocument) -> Result<()> {
        let content = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }

    fn capture_baseline_if_absent(&self, doc: &SettingsDocument) {
        let mut guard = self.baseline.lock().unwrap();
        if guard.is_none() {
            *guard = Some(ApprovalsBaseline {
                global: doc.approvals.clone(),
                per_project: doc
                    .projects
                    .iter()
                    .map(|(name, p)| (name.clone(), p.approvals.clone()))
                    .collect(),
            });
        }
    }

    /// Heals any approval list that a mutation emptied out despite a
    /// non-empty baseline, by union-merging baseline into the post-mutation
    /// value. Skipped for keys listed in `explicit_clears`.
    fn heal_approvals(&self, doc: &mut SettingsDocument, explicit_clears: &[(Option<String>, String)]) {
        let guard = self.baseline.lock().unwrap();
        let Some(baseline) = guard.as_ref() else {
            return;
        };
        for (kind, baseline_list) in &baseline.global {
            if baseline_list.is_empty() {
                continue;
            }
            if explicit_clears.iter().any(|(p, k)| p.is_none() && k == kind) {
                continue;
            }
            let current = doc.approvals.entry(kind.clone()).or_default();
            if current.is_empty() {
                *current = baseline_list.clone();
            } else {
                union_merge(current, baseline_list);
            }
        }
        for (project_name, project_baseline) in &baseline.per_project {
            let Some(project) = doc.projects.get_mut(project_name) else {
                continue;
            };
            for (kind, baseline_list) in project_baseline {
                if baseline_list.is_empty() {
                    continue;
                }
                if explicit_clears
                    .iter()
                    .any(|(p, k)| p.as_deref() == Some(project_name.as_str()) && k == kind)
                {
                    continue;
                }
                let current = project.approvals.entry(kind.clone()).or_default();
                if current.is_empty() {
                    *current = baseline_list.clone();
                } else {
                    union_merge(current, baseline_list);
                }
            }
        }
    }

    /// Acquire the filesystem lock, read, apply `f`, heal, normalize, write,
    /// release. This is the single read-modify-write entrypoint (§4.1).
    pub fn mutate<R>(&self, f: impl FnOnce(&mut SettingsDocument) -> Result<R>) -> Result<R> {
        self.mutate_with_clears(f, &[])
    }

    pub fn mutate_with_clears<R>(
        &self,
        f: impl FnOnce(&mut SettingsDocument) -> Result<R>,
        explicit_clears: &[(Option<String>, String)],
    ) -> Result<R> {
        let _lock = fnord_lock::acquire(&self.path, "settings mutation", self.lock_timeout, self.stale_after)
            .map_err(|e| fnord_core::FnordError::lock(e.to_string()))?;

        let raw = self.read_raw()?;
        let migrated = Self::migrate_raw(raw);
        let mut doc: SettingsDocument = serde_json::from_value(migrated)
            .map_err(|e| fnord_core::FnordError::config(format!("malformed settings.json: {e}")))?;

        self.capture_baseline_if_absent(&doc);

        let result = f(&mut doc)?;

        self.heal_approvals(&mut doc, explicit_clears);
        doc.normalize_approvals();
        doc.version = SettingsDocument::CURRENT_VERSION;

        self.write_raw(&doc)?;
        Ok(result)
    }

    /// Read-only snapshot; no lock required (§4.1: readers may read without
    /// the lock).
    pub fn read(&self) -> Result<SettingsDocument> {
        let raw = self.read_raw()?;
        let migrated = Self::migrate_raw(raw);
        serde_json::from_value(migrated)
            .map_err(|e| fnord_core::FnordError::config(format!("malformed settings.json: {e}")).into())
    }

    pub fn list_projects(&self) -> Result<Vec<String>> {
        let doc = self.read()?;
        let mut names: Vec<String> = doc.projects.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn get_project(&self, name: &str) -> Result<Option<ProjectRecord>> {
        let doc = self.read()?;
        Ok(doc.projects.get(name).cloned())
    }

    pub fn set_project_data(&self, name: &str, record: ProjectRecord) -> Result<()> {
        let name = name.to_string();
        self.mutate(move |doc| {
            doc.projects.insert(name.clone(), record);
            Ok(())
        })
    }

    pub fn delete_project(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.mutate(move |doc| {
            doc.projects.remove(&name);
            Ok(())
        })
    }

    /// `approvals.get` for a scope (`None` = global, `Some(project)` =
    /// project-scoped) and kind.
    pub fn approvals_get(&self, project: Option<&str>, kind: &str) -> Result<Vec<ApprovalRecord>> {
        let doc = self.read()?;
        Ok(match project {
            None => doc.approvals.get(kind).cloned().unwrap_or_default(),
            Some(p) => doc
                .projects
                .get(p)
                .and_then(|pr| pr.approvals.get(kind).cloned())
                .unwrap_or_default(),
        })
    }

    /// `approvals.approve`: adds one pattern to a scope's approval list.
    pub fn approve(&self, project: Option<&str>, kind: &str, record: ApprovalRecord) -> Result<()> {
        let project = project.map(|s| s.to_string());
        let kind = kind.to_string();
        self.mutate(move |doc| {
            let list = match &project {
                None => doc.approvals.entry(kind.clone()).or_default(),
                Some(p) => doc
                    .projects
                    .entry(p.clone())
                    .or_default()
                    .approvals
                    .entry(kind.clone())
                    .or_default(),
            };
            list.push(record);
            Ok(())
        })
    }

    /// `mcp_servers.effective_config`: project overrides merged over global.
    pub fn effective_mcp_servers(&self, project: &str) -> Result<HashMap<String, McpServerConfig>> {
        let doc = self.read()?;
        let mut merged = doc.mcp_servers.clone();
        if let Some(p) = doc.projects.get(project) {
            for (name, cfg) in &p.mcp_servers {
                merged.insert(name.clone(), cfg.clone());
            }
        }
        Ok(merged)
    }

    pub fn add_mcp_server(&self, name: &str, cfg: McpServerConfig) -> Result<()> {
        let name = name.to_string();
        self.mutate(move |doc| {
            doc.mcp_servers.insert(name.clone(), cfg);
            Ok(())
        })
    }

    pub fn remove_mcp_server(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.mutate(move |doc| {
            doc.mcp_servers.remove(&name);
            Ok(())
        })
    }

    /// Generic dotted-key get over the serialized document, e.g.
    /// `"projects.myapp.exclude"`.
    pub fn get(&self, dotted_key: &str) -> Result<Option<Value>> {
        let doc = self.read()?;
        let value = serde_json::to_value(&doc)?;
        Ok(navigate(&value, dotted_key).cloned())
    }

    pub fn set(&self, dotted_key: &str, value: Value) -> Result<()> {
        let dotted_key = dotted_key.to_string();
        self.mutate(move |doc| {
            let mut root = serde_json::to_value(&doc)?;
            navigate_set(&mut root, &dotted_key, value)?;
            *doc = serde_json::from_value(root)?;
            Ok(())
        })
    }

    pub fn delete(&self, dotted_key: &str) -> Result<()> {
        let dotted_key = dotted_key.to_string();
        self.mutate(move |doc| {
            let mut root = serde_json::to_value(&doc)?;
            navigate_delete(&mut root, &dotted_key);
            *doc = serde_json::from_value(root)?;
            Ok(())
        })
    }
}

fn union_merge(current: &mut Vec<ApprovalRecord>, baseline: &[ApprovalRecord]) {
    let existing_keys: std::collections::HashSet<String> = current.iter().map(key_of).collect();
    for r in baseline {
        if !existing_keys.contains(&key_of(r)) {
            current.push(r.clone());
        }
    }
}

fn key_of(r: &ApprovalRecord) -> String {
    match r {
        ApprovalRecord::Prefix { pattern } => format!("prefix:{pattern}"),
        ApprovalRecord::Regex { pattern } => format!("regex:{pattern}"),
    }
}

fn navigate<'a>(root: &'a Value, dotted_key: &str) -> Option<&'a Value> {
    let mut cur = root;
    for part in dotted_key.split('.') {
        cur = cur.get(part)?;
    }
    Some(cur)
}

fn navigate_set(root: &mut Value, dotted_key: &str, value: Value) -> Result<()> {
    let parts: Vec<&str> = dotted_key.split('.').collect();
    let mut cur = root;
    for part in &parts[..parts.len() - 1] {
        if !cur.is_object() {
            *cur = Value::Object(serde_json::Map::new());
        }
        cur = cur
            .as_object_mut()
            .unwrap()
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !cur.is_object() {
        *cur = Value::Object(serde_json::Map::new());
    }
    cur.as_object_mut()
        .unwrap()
        .insert(parts.last().unwrap().to_string(), value);
    Ok(())
}

fn navigate_delete(root: &mut Value, dotted_key: &str) {
    let parts: Vec<&str> = dotted_key.split('.').collect();
    let mut cur = root;
    for part in &parts[..parts.len() - 1] {
        match cur.get_mut(part) {
            Some(next) => cur = next,
            None => return,
        }
    }
    if let Some(obj) = cur.as_object_mut() {
        obj.remove(*parts.last().unwrap());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> SettingsStore {
        SettingsStore::open(dir.join("settings.json")).unwrap()
    }

    #[test]
    fn test_migration_stamps_version_and_is_idempotent() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{"my-legacy-project": {"root": "/tmp/x"}}"#,
        )
        .unwrap();
        let store = store_in(dir.path());
        let doc = store.read().unwrap();
        assert_eq!(doc.version, SettingsDocument::CURRENT_VERSION);
        assert!(doc.projects.contains_key("my-legacy-project"));

        // Re-opening / re-migrating produces the same document.
        let doc2 = store.read().unwrap();
        assert_eq!(doc.projects.len(), doc2.projects.len());
    }

    #[test]
    fn test_set_project_and_get_project() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .set_project_data(
                "demo",
                ProjectRecord {
                    root: "/home/user/demo".to_string(),
                    exclude: vec!["target/**".to_string()],
                    ..Default::default()
                },
            )
            .unwrap();
        let fetched = store.get_project("demo").unwrap().unwrap();
        assert_eq!(fetched.root, "/home/user/demo");
        assert_eq!(store.list_projects().unwrap(), vec!["demo".to_string()]);
    }

    #[test]
    fn test_approve_is_idempotent_under_set_semantics() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let record = ApprovalRecord::Prefix { pattern: "git log".to_string() };
        store.approve(None, "shell", record.clone()).unwrap();
        store.approve(None, "shell", record).unwrap();
        let list = store.approvals_get(None, "shell").unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_approvals_self_heal_on_concurrent_style_write() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .approve(None, "shell", ApprovalRecord::Prefix { pattern: "git log".to_string() })
            .unwrap();
        // Force baseline capture by reading once more through mutate.
        store.mutate(|_| Ok(())).unwrap();

        // A mutation that wipes the approvals map entirely (simulating a
        // racing writer overwriting without intent) should heal back.
        store
            .mutate(|doc| {
                doc.approvals.clear();
                Ok(())
            })
            .unwrap();

        let list = store.approvals_get(None, "shell").unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_effective_mcp_servers_merges_project_over_global() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .add_mcp_server(
                "search",
                McpServerConfig {
                    transport: crate::document::TransportKind::Stdio,
                    command: Some("global-search".to_string()),
                    args: vec![],
                    url: None,
                    env: HashMap::new(),
                    timeout_ms: 30_000,
                },
            )
            .unwrap();
        store
            .set_project_data(
                "demo",
                ProjectRecord {
                    mcp_servers: HashMap::from([(
                        "search".to_string(),
                        McpServerConfig {
                            transport: crate::document::TransportKind::Stdio,
                            command: Some("project-search".to_string()),
                            args: vec![],
                            url: None,
                            env: HashMap::new(),
                            timeout_ms: 30_000,
                        },
                    )]),
                    ..Default::default()
                },
            )
            .unwrap();

        let effective = store.effective_mcp_servers("demo").unwrap();
        assert_eq!(effective["search"].command.as_deref(), Some("project-search"));
    }

    #[test]
    fn test_dotted_get_set_delete() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .set("projects.demo.root", Value::from("/home/user/demo"))
            .unwrap();
        let value = store.get("projects.demo.root").unwrap().unwrap();
        assert_eq!(value, Value::from("/home/user/demo"));

        store.delete("projects.demo.root").unwrap();
        assert!(store.get("projects.demo.root").unwrap().is_none());
    }

    #[test]
    fn test_write_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .set_project_data(
                "demo",
                ProjectRecord {
                    root: "/x".to_string(),
                    exclude: vec!["a".to_string(), "b".to_string()],
                    ..Default::default()
                },
            )
            .unwrap();
        let reopened = store_in(dir.path());
        let doc = reopened.read().unwrap();
        assert_eq!(doc.projects["demo"].exclude, vec!["a", "b"]);
    }

    #[test]
    fn test_no_projects_key_migration_matches_spec_scenario() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("settings.json"), r#"{}"#).unwrap();
        let store = store_in(dir.path());
        let doc = store.read().unwrap();
        assert!(doc.projects.is_empty());
        assert_eq!(doc.version, SettingsDocument::CURRENT_VERSION);
    }
}
