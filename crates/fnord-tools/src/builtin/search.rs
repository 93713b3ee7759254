use std::sync::Arc;

use async_trait::async_trait;
use fnord_core::ToolSpec;
use fnord_index::{search, ProjectIndex};
use serde_json::{json, Value};

use crate::tool::{optional_u64, require_str, Tool, ToolArgError, ToolOutcome};

/// Embeds free text into the same vector space as indexed entries. Kept as
/// a trait so this crate never depends on a concrete completion provider;
/// `fnord-agent` supplies the implementation at wiring time.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

pub struct SemanticSearchTool {
    index: Arc<ProjectIndex>,
    embedder: Arc<dyn Embedder>,
}

impl SemanticSearchTool {
    pub fn new(index: Arc<ProjectIndex>, embedder: Arc<dyn Embedder>) -> Self {
        SemanticSearchTool { index, embedder }
    }
}

#[async_trait]
impl Tool for SemanticSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "semantic_search".to_string(),
            description: "Ranks indexed files by embedding similarity to a query.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer"},
                    "detail": {"type": "boolean"},
                },
                "required": ["query"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "query")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let query = match require_str(&args, "query") {
            Ok(q) => q,
            Err(e) => return ToolOutcome::Error(e.to_string()),
        };
        let limit = optional_u64(&args, "limit").unwrap_or(10) as usize;
        let detail = args.get("detail").and_then(Value::as_bool).unwrap_or(false);

        let vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => return ToolOutcome::Error(format!("embedding failed: {e}")),
        };

        match search(&self.index, &vector, limit, detail) {
            Ok(results) => {
                let value = json!(results
                    .into_iter()
                    .map(|r| json!({
                        "relative_path": r.relative_path,
                        "score": r.score,
                        "summary": r.summary,
                        "outline": r.outline,
                    }))
                    .collect::<Vec<_>>());
                ToolOutcome::Ok(value)
            }
            Err(e) => ToolOutcome::Error(e.to_string()),
        }
    }
}
