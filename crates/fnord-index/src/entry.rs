use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use fnord_core::hash::entry_key;
use fnord_core::IndexEntryMeta;

/// One per-file derivative entry, rooted at
/// `<project-dir>/<entry-hash>/`.
pub struct IndexEntry {
    dir: PathBuf,
    pub relative_path: String,
}

impl IndexEntry {
    pub fn dir_for(project_dir: &Path, relative_path: &str) -> PathBuf {
        project_dir.join(entry_key(relative_path))
    }

    pub fn open(project_dir: &Path, relative_path: &str) -> Self {
        IndexEntry {
            dir: Self::dir_for(project_dir, relative_path),
            relative_path: relative_path.to_string(),
        }
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.json")
    }

    pub fn read_meta(&self) -> Option<IndexEntryMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Reads the live source file from the project's source root (not the
    /// cached copy), per §4.2's `read_source_file` operation.
    pub fn read_source_file(&self, source_root: &Path) -> Result<String> {
        let path = source_root.join(&self.relative_path);
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    /// True iff the entry is missing, partially present, or its stored hash
    /// no longer matches `current_hash` (§3 Invariant, §8 Property 2).
    pub fn is_stale(&self, current_hash: &str) -> bool {
        match self.read_meta() {
            Some(meta) => meta.content_hash != current_hash || meta.is_partially_present(),
            None => true,
        }
    }

    /// Writes derivatives atomically. Each artifact is staged to a temp file
    /// and renamed; `meta.json` (which carries `content_hash`) is written
    /// last so that a reader observing a partial entry mid-write still sees
    /// a missing or stale-hash meta file (§4.2 step 4).
    pub fn save(
        &self,
        summary: &str,
        outline: &str,
        embedding: &[f32],
        content_hash: &str,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;

        write_atomic(&self.dir.join("summary"), summary.as_bytes())?;
        write_atomic(&self.dir.join("outline"), outline.as_bytes())?;
        let embedding_json = serde_json::to_vec(embedding)?;
        write_atomic(&self.dir.join("embedding"), &embedding_json)?;

        let meta = IndexEntryMeta {
            relative_path: self.relative_path.clone(),
            content_hash: content_hash.to_string(),
            summary: Some(summary.to_string()),
            outline: Some(outline.to_string()),
            embedding_vector: Some(embedding.to_vec()),
            last_indexed_at: Utc::now(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)?;
        write_atomic(&self.meta_path(), &meta_json)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)
                .with_context(|| format!("removing {}", self.dir.display()))?;
        }
        Ok(())
    }

    pub fn embedding(&self) -> Option<Vec<f32>> {
        self.read_meta().and_then(|m| m.embedding_vector)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_entry_is_stale() {
        let dir = tempdir().unwrap();
        let entry = IndexEntry::open(dir.path(), "src/lib.rs");
        assert!(entry.is_stale("anyhash"));
    }

    #[test]
    fn test_save_then_fresh_hash_is_not_stale() {
        let dir = tempdir().unwrap();
        let entry = IndexEntry::open(dir.path(), "src/lib.rs");
        entry.save("a summary", "an outline", &[0.1, 0.2], "hash-1").unwrap();
        assert!(!entry.is_stale("hash-1"));
        assert!(entry.is_stale("hash-2"));
    }

    #[test]
    fn test_partial_entry_is_stale() {
        let dir = tempdir().unwrap();
        let entry = IndexEntry::open(dir.path(), "src/lib.rs");
        fs::create_dir_all(IndexEntry::dir_for(dir.path(), "src/lib.rs")).unwrap();
        let meta = IndexEntryMeta {
            relative_path: "src/lib.rs".to_string(),
            content_hash: "hash-1".to_string(),
            summary: Some("s".to_string()),
            outline: None,
            embedding_vector: None,
            last_indexed_at: Utc::now(),
        };
        fs::write(entry.meta_path(), serde_json::to_string(&meta).unwrap()).unwrap();
        assert!(entry.is_stale("hash-1"));
    }

    #[test]
    fn test_idempotent_reindex_is_byte_identical() {
        let dir = tempdir().unwrap();
        let entry = IndexEntry::open(dir.path(), "a.rs");
        entry.save("sum", "out", &[1.0, 2.0], "h").unwrap();
        let first = fs::read(entry.dir.join("summary")).unwrap();
        entry.save("sum", "out", &[1.0, 2.0], "h").unwrap();
        let second = fs::read(entry.dir.join("summary")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_delete_removes_directory() {
        let dir = tempdir().unwrap();
        let entry = IndexEntry::open(dir.path(), "a.rs");
        entry.save("s", "o", &[], "h").unwrap();
        assert!(entry.dir.exists());
        entry.delete().unwrap();
        assert!(!entry.dir.exists());
    }
}
