use serde::Serialize;

use crate::store::ProjectIndex;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub relative_path: String,
    pub score: f32,
    pub summary: Option<String>,
    pub outline: Option<String>,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Ranks every valid (non-stale) index entry by cosine similarity to
/// `query_vector`. `detail` additionally surfaces the outline.
pub fn search(project: &ProjectIndex, query_vector: &[f32], limit: usize, detail: bool) -> anyhow::Result<Vec<SearchResult>> {
    let mut results = Vec::new();
    for relative_path in project.list_files()? {
        let entry = project.entry(&relative_path);
        let Some(meta) = entry.read_meta() else {
            continue;
        };
        if meta.is_partially_present() {
            continue;
        }
        let Some(embedding) = &meta.embedding_vector else {
            continue;
        };
        let score = cosine_similarity(query_vector, embedding);
        results.push(SearchResult {
            relative_path,
            score,
            summary: meta.summary.clone(),
            outline: if detail { meta.outline.clone() } else { None },
        });
    }
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cosine_similarity_identical_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let source = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let project = ProjectIndex::open(store_dir.path(), source.path(), vec![]).unwrap();
        project.entry("close.rs").save("s", "o", &[1.0, 0.0], "h1").unwrap();
        project.entry("far.rs").save("s", "o", &[0.0, 1.0], "h2").unwrap();

        let results = search(&project, &[1.0, 0.0], 10, false).unwrap();
        assert_eq!(results[0].relative_path, "close.rs");
        assert_eq!(results[1].relative_path, "far.rs");
    }

    #[test]
    fn test_search_skips_partial_entries() {
        let source = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let project = ProjectIndex::open(store_dir.path(), source.path(), vec![]).unwrap();
        std::fs::create_dir_all(crate::entry::IndexEntry::dir_for(&project.root, "half.rs")).unwrap();
        let meta = fnord_core::IndexEntryMeta {
            relative_path: "half.rs".to_string(),
            content_hash: "h".to_string(),
            summary: Some("s".to_string()),
            outline: None,
            embedding_vector: None,
            last_indexed_at: chrono::Utc::now(),
        };
        std::fs::write(
            crate::entry::IndexEntry::dir_for(&project.root, "half.rs").join("meta.json"),
            serde_json::to_string(&meta).unwrap(),
        )
        .unwrap();

        let results = search(&project, &[1.0, 0.0], 10, false).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_respects_limit() {
        let source = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let project = ProjectIndex::open(store_dir.path(), source.path(), vec![]).unwrap();
        for i in 0..5 {
            project
                .entry(&format!("f{i}.rs"))
                .save("s", "o", &[1.0, 0.0], &format!("h{i}"))
                .unwrap();
        }
        let results = search(&project, &[1.0, 0.0], 2, false).unwrap();
        assert_eq!(results.len(), 2);
    }
}
