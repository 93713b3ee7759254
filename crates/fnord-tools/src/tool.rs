use async_trait::async_trait;
use fnord_core::ToolSpec;
use serde_json::Value;

/// Structured argument-validation failure (§4.3 `read_args`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolArgError {
    Missing { key: String },
    Invalid { key: String, reason: String },
}

impl std::fmt::Display for ToolArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolArgError::Missing { key } => write!(f, "missing argument: {key}"),
            ToolArgError::Invalid { key, reason } => write!(f, "invalid argument {key}: {reason}"),
        }
    }
}

impl std::error::Error for ToolArgError {}

/// Result of a tool invocation: `{ok, value} | {error, reason}` (§4.3).
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Ok(Value),
    Error(String),
}

impl ToolOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolOutcome::Ok(_))
    }
}

/// Uniform interface over built-in tools, remote MCP tools, and frobs
/// (§4.3). Every tool is dispatched through this trait object regardless of
/// family.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Environment/capability probe; unavailable tools are hidden from the
    /// registry's active set rather than failing at call time.
    fn is_available(&self) -> bool {
        true
    }

    /// True when invocations of this tool are mutually independent and may
    /// be dispatched concurrently within a round.
    fn is_async(&self) -> bool {
        false
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        Ok(args.clone())
    }

    fn ui_note_on_request(&self, args: &Value) -> String {
        format!("{}({args})", self.spec().name)
    }

    fn ui_note_on_result(&self, _args: &Value, result: &ToolOutcome) -> String {
        match result {
            ToolOutcome::Ok(_) => format!("{} ok", self.spec().name),
            ToolOutcome::Error(reason) => format!("{} failed: {reason}", self.spec().name),
        }
    }

    async fn call(&self, args: Value) -> ToolOutcome;
}

fn missing(key: &str) -> ToolArgError {
    ToolArgError::Missing { key: key.to_string() }
}

fn invalid(key: &str, reason: impl Into<String>) -> ToolArgError {
    ToolArgError::Invalid { key: key.to_string(), reason: reason.into() }
}

pub fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolArgError> {
    args.get(key)
        .ok_or_else(|| missing(key))?
        .as_str()
        .ok_or_else(|| invalid(key, "expected a string"))
}

pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub fn optional_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

pub fn require_array<'a>(args: &'a Value, key: &str) -> Result<&'a Vec<Value>, ToolArgError> {
    args.get(key)
        .ok_or_else(|| missing(key))?
        .as_array()
        .ok_or_else(|| invalid(key, "expected an array"))
}
