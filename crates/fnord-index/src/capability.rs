use async_trait::async_trait;

/// The indexing capability threaded through both the foreground `index`
/// command and the background indexer (C7). Summary/outline generation and
/// embedding are each a single LLM-backed operation; the concrete transport
/// lives in `fnord-agent`.
#[async_trait]
pub trait IndexerCapability: Send + Sync {
    async fn summarize(&self, relative_path: &str, content: &str) -> anyhow::Result<String>;
    async fn outline(&self, relative_path: &str, content: &str) -> anyhow::Result<String>;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Installs a distinct HTTP connection pool for background-indexer
    /// traffic so it does not contend with foreground completion/embedding
    /// calls (§4.7 step 1). No-op unless the concrete capability overrides
    /// it.
    fn use_background_pool(&self) {}

    /// Restores the default pool (§4.7 step 4, on stop).
    fn clear_background_pool(&self) {}
}

/// Composes the embedding-input string per §4.2 step 3.
pub fn embedding_input(relative_path: &str, summary: &str, outline: &str, content: &str) -> String {
    format!(
        "# File\n{relative_path}\n\n## Summary\n{summary}\n\n## Outline\n{outline}\n\n## Contents\n```\n{content}\n```"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_input_shape() {
        let text = embedding_input("src/lib.rs", "does things", "- fn main", "fn main() {}");
        assert!(text.starts_with("# File\nsrc/lib.rs\n"));
        assert!(text.contains("## Summary\ndoes things"));
        assert!(text.contains("## Outline\n- fn main"));
        assert!(text.contains("## Contents\n```\nfn main() {}\n```"));
    }
}
