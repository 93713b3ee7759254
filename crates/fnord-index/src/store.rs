use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use ignore::WalkBuilder;

use crate::entry::IndexEntry;

/// A project's on-disk index root, one directory per entry.
pub struct ProjectIndex {
    pub root: PathBuf,
    pub source_root: PathBuf,
    pub exclude: Vec<String>,
}

impl ProjectIndex {
    pub fn open(root: impl Into<PathBuf>, source_root: impl Into<PathBuf>, exclude: Vec<String>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;
        Ok(ProjectIndex {
            root,
            source_root: source_root.into(),
            exclude,
        })
    }

    pub fn entry(&self, relative_path: &str) -> IndexEntry {
        IndexEntry::open(&self.root, relative_path)
    }

    /// Walks the source root honouring `.gitignore` and the project's
    /// explicit exclude globs (§4.2).
    pub fn source_files(&self) -> Result<Vec<String>> {
        let patterns: Vec<Pattern> = self
            .exclude
            .iter()
            .filter_map(|g| Pattern::new(g).ok())
            .collect();

        let mut out = Vec::new();
        for result in WalkBuilder::new(&self.source_root).hidden(false).build() {
            let entry = result.context("walking source root")?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                let rel = entry
                    .path()
                    .strip_prefix(&self.source_root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                if patterns.iter().any(|p| p.matches(&rel)) {
                    continue;
                }
                out.push(rel);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Every relative path that currently has an index-entry directory.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for dirent in fs::read_dir(&self.root).with_context(|| format!("reading {}", self.root.display()))? {
            let dirent = dirent?;
            if !dirent.file_type()?.is_dir() {
                continue;
            }
            let meta_path = dirent.path().join("meta.json");
            if let Ok(content) = fs::read_to_string(&meta_path) {
                if let Ok(meta) = serde_json::from_str::<fnord_core::IndexEntryMeta>(&content) {
                    out.push(meta.relative_path);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Deletes entries whose source file no longer exists or is now
    /// excluded (§3 Index entry: Deletion).
    pub fn delete_missing_files(&self) -> Result<usize> {
        let live: std::collections::HashSet<String> = self.source_files()?.into_iter().collect();
        let mut removed = 0;
        for relative_path in self.list_files()? {
            if !live.contains(&relative_path) {
                self.entry(&relative_path).delete()?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Destroys the whole project index (`torch`).
    pub fn delete(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).with_context(|| format!("removing {}", self.root.display()))?;
        }
        Ok(())
    }

    pub fn source_path(&self, relative_path: &str) -> PathBuf {
        self.source_root.join(relative_path)
    }
}
