use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message role within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A model-initiated function invocation with JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry in a conversation's message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: None,
        }
    }
}

/// Declarative, JSON-schema-shaped tool description consumed by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

/// Metadata for a project in the settings document and index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub source_root: String,
    pub store_path: String,
}

/// One per-file derivative entry in the project index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntryMeta {
    pub relative_path: String,
    pub content_hash: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub embedding_vector: Option<Vec<f32>>,
    pub last_indexed_at: DateTime<Utc>,
}

impl IndexEntryMeta {
    /// An entry is stale if derivatives are incomplete; hash comparison
    /// against the live file is done by the caller, which has the file.
    pub fn is_partially_present(&self) -> bool {
        self.summary.is_none() || self.outline.is_none() || self.embedding_vector.is_none()
    }
}

/// Scope at which an approval pattern is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalScope {
    Session,
    Project,
    Global,
}

/// A single approval pattern for the `shell` subject family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalRecord {
    /// Matched against the canonicalised prefix as a literal prefix of the
    /// full command string.
    Prefix { pattern: String },
    /// Matched as a regex against the full joined command string. Per
    /// SPEC_FULL.md's Open Question decision, this is intentionally
    /// unanchored.
    Regex { pattern: String },
}

impl ApprovalRecord {
    /// Parse user input for "Approve persistently": a pattern wrapped in
    /// `/…/` is a regex, anything else is a literal prefix.
    pub fn from_user_pattern(input: &str) -> Self {
        if input.len() >= 2 && input.starts_with('/') && input.ends_with('/') {
            ApprovalRecord::Regex {
                pattern: input[1..input.len() - 1].to_string(),
            }
        } else {
            ApprovalRecord::Prefix {
                pattern: input.to_string(),
            }
        }
    }
}

/// `{patch_id, temp_file_path}` for the response-lifetime-only
/// patch-and-apply flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchTicket {
    pub patch_id: String,
    pub temp_file_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.content, "hello");
        assert!(m.tool_calls.is_none());
    }

    #[test]
    fn test_message_roundtrip() {
        let m = Message::tool_result("call-1", "42");
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(back.content, "42");
    }

    #[test]
    fn test_approval_record_from_plain_pattern() {
        match ApprovalRecord::from_user_pattern("git log") {
            ApprovalRecord::Prefix { pattern } => assert_eq!(pattern, "git log"),
            _ => panic!("expected prefix"),
        }
    }

    #[test]
    fn test_approval_record_from_regex_pattern() {
        match ApprovalRecord::from_user_pattern("/^git (log|show)/") {
            ApprovalRecord::Regex { pattern } => assert_eq!(pattern, "^git (log|show)"),
            _ => panic!("expected regex"),
        }
    }

    #[test]
    fn test_index_entry_partial_presence() {
        let entry = IndexEntryMeta {
            relative_path: "src/lib.rs".to_string(),
            content_hash: "abc".to_string(),
            summary: Some("a summary".to_string()),
            outline: None,
            embedding_vector: None,
            last_indexed_at: Utc::now(),
        };
        assert!(entry.is_partially_present());
    }

    #[test]
    fn test_index_entry_fully_present() {
        let entry = IndexEntryMeta {
            relative_path: "src/lib.rs".to_string(),
            content_hash: "abc".to_string(),
            summary: Some("s".to_string()),
            outline: Some("o".to_string()),
            embedding_vector: Some(vec![0.1, 0.2]),
            last_indexed_at: Utc::now(),
        };
        assert!(!entry.is_partially_present());
    }
}
