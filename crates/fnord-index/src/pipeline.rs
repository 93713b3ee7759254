use fnord_core::hash::sha256_hex;

use crate::capability::{embedding_input, IndexerCapability};
use crate::store::ProjectIndex;

/// Runs the indexing pipeline for one entry (§4.2). Used by both the
/// foreground `index` command and the background indexer (C7).
///
/// Per-entry failures are the caller's responsibility to log and skip
/// (§4.2 Failure policy) — this function simply propagates them.
pub async fn index_entry(
    project: &ProjectIndex,
    capability: &dyn IndexerCapability,
    relative_path: &str,
) -> anyhow::Result<()> {
    let source_path = project.source_path(relative_path);
    let content = tokio::fs::read_to_string(&source_path).await?;
    let content_hash = sha256_hex(content.as_bytes());

    let entry = project.entry(relative_path);
    if !entry.is_stale(&content_hash) {
        return Ok(());
    }

    let (summary, outline) = tokio::try_join!(
        capability.summarize(relative_path, &content),
        capability.outline(relative_path, &content),
    )?;

    let input = embedding_input(relative_path, &summary, &outline, &content);
    let embedding = capability.embed(&input).await?;

    entry.save(&summary, &outline, &embedding, &content_hash)?;
    Ok(())
}

/// Every stale or missing entry for a project, computed dynamically (not
/// pre-queued) so that newly-staled files are picked up by the caller's
/// next iteration (§4.7 step 3).
pub fn next_stale_entry(project: &ProjectIndex) -> anyhow::Result<Option<String>> {
    for relative_path in project.source_files()? {
        let source_path = project.source_path(&relative_path);
        let Ok(content) = std::fs::read_to_string(&source_path) else {
            continue;
        };
        let hash = sha256_hex(content.as_bytes());
        if project.entry(&relative_path).is_stale(&hash) {
            return Ok(Some(relative_path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::tempdir;

    struct FixedCapability;

    #[async_trait]
    impl IndexerCapability for FixedCapability {
        async fn summarize(&self, _relative_path: &str, _content: &str) -> anyhow::Result<String> {
            Ok("a summary".to_string())
        }
        async fn outline(&self, _relative_path: &str, _content: &str) -> anyhow::Result<String> {
            Ok("- an outline".to_string())
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    #[tokio::test]
    async fn test_index_entry_writes_derivatives() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("a.rs"), "fn main() {}").unwrap();
        let store_dir = tempdir().unwrap();
        let project = ProjectIndex::open(store_dir.path(), source.path(), vec![]).unwrap();

        index_entry(&project, &FixedCapability, "a.rs").await.unwrap();

        let entry = project.entry("a.rs");
        assert!(!entry.is_stale(&fnord_core::hash::sha256_hex(b"fn main() {}")));
        assert_eq!(entry.embedding().unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_reindex_after_edit_clears_staleness() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("a.rs"), "fn main() {}").unwrap();
        let store_dir = tempdir().unwrap();
        let project = ProjectIndex::open(store_dir.path(), source.path(), vec![]).unwrap();
        index_entry(&project, &FixedCapability, "a.rs").await.unwrap();

        fs::write(source.path().join("a.rs"), "fn main() {}\n// one more line").unwrap();
        let new_hash = fnord_core::hash::sha256_hex(b"fn main() {}\n// one more line");
        assert!(project.entry("a.rs").is_stale(&new_hash));

        index_entry(&project, &FixedCapability, "a.rs").await.unwrap();
        assert!(!project.entry("a.rs").is_stale(&new_hash));
    }

    #[test]
    fn test_next_stale_entry_finds_unindexed_file() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("a.rs"), "x").unwrap();
        let store_dir = tempdir().unwrap();
        let project = ProjectIndex::open(store_dir.path(), source.path(), vec![]).unwrap();
        assert_eq!(next_stale_entry(&project).unwrap(), Some("a.rs".to_string()));
    }

    #[test]
    fn test_next_stale_entry_none_when_fully_indexed() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("a.rs"), "x").unwrap();
        let store_dir = tempdir().unwrap();
        let project = ProjectIndex::open(store_dir.path(), source.path(), vec![]).unwrap();
        project
            .entry("a.rs")
            .save("s", "o", &[0.0], &fnord_core::hash::sha256_hex(b"x"))
            .unwrap();
        assert_eq!(next_stale_entry(&project).unwrap(), None);
    }
}
