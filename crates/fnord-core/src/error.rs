use thiserror::Error;

/// The stable error taxonomy shared across every component. Call sites that
/// only need to propagate wrap this in `anyhow::Error`; call sites that need
/// to branch (CLI exit-code mapping, the completion loop's retry policy)
/// match on the variant directly.
#[derive(Debug, Error)]
pub enum FnordError {
    #[error("config error: {0}")]
    Config(String),

    #[error("lock error: {0}")]
    Lock(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("tool argument error: missing={missing:?} key={key} reason={reason}")]
    ToolArg {
        missing: bool,
        key: String,
        reason: String,
    },

    #[error("tool call error: {0}")]
    ToolCall(String),

    #[error("approval denied: {reason}")]
    ApprovalDenied { reason: String },

    #[error("transport error (retryable={retryable}): {message}")]
    Transport { retryable: bool, message: String },

    #[error("model error: {0}")]
    Model(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl FnordError {
    pub fn config(msg: impl Into<String>) -> Self {
        FnordError::Config(msg.into())
    }

    pub fn lock(msg: impl Into<String>) -> Self {
        FnordError::Lock(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        FnordError::Index(msg.into())
    }

    pub fn tool_arg_missing(key: impl Into<String>) -> Self {
        FnordError::ToolArg {
            missing: true,
            key: key.into(),
            reason: "missing".to_string(),
        }
    }

    pub fn tool_arg_invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        FnordError::ToolArg {
            missing: false,
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn tool_call(msg: impl Into<String>) -> Self {
        FnordError::ToolCall(msg.into())
    }

    pub fn approval_denied(reason: impl Into<String>) -> Self {
        FnordError::ApprovalDenied {
            reason: reason.into(),
        }
    }

    pub fn transport(retryable: bool, message: impl Into<String>) -> Self {
        FnordError::Transport {
            retryable,
            message: message.into(),
        }
    }

    pub fn model(msg: impl Into<String>) -> Self {
        FnordError::Model(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        FnordError::Fatal(msg.into())
    }

    /// Whether this error class should be retried by a bounded-backoff loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FnordError::Transport { retryable: true, .. })
    }

    /// A stable, small non-zero exit code per class, used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            FnordError::Config(_) => 2,
            FnordError::Lock(_) => 3,
            FnordError::Index(_) => 4,
            FnordError::ToolArg { .. } => 5,
            FnordError::ToolCall(_) => 6,
            FnordError::ApprovalDenied { .. } => 7,
            FnordError::Transport { .. } => 8,
            FnordError::Model(_) => 9,
            FnordError::Fatal(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_config() {
        let e = FnordError::config("missing api key");
        assert_eq!(e.to_string(), "config error: missing api key");
    }

    #[test]
    fn test_display_lock() {
        let e = FnordError::lock("timeout waiting for settings.json.lock");
        assert!(e.to_string().starts_with("lock error:"));
    }

    #[test]
    fn test_display_index() {
        let e = FnordError::index("embedding request failed");
        assert!(e.to_string().starts_with("index error:"));
    }

    #[test]
    fn test_display_tool_arg() {
        let e = FnordError::tool_arg_missing("query");
        assert!(e.to_string().contains("missing=true"));
        assert!(e.to_string().contains("key=query"));
    }

    #[test]
    fn test_display_tool_call() {
        let e = FnordError::tool_call("exit status 1");
        assert!(e.to_string().starts_with("tool call error:"));
    }

    #[test]
    fn test_display_approval_denied() {
        let e = FnordError::approval_denied("shell invocation not allowed: bash -c rm -rf /");
        assert!(e.to_string().contains("shell invocation not allowed"));
    }

    #[test]
    fn test_display_transport() {
        let e = FnordError::transport(true, "connection reset");
        assert!(e.to_string().contains("retryable=true"));
        assert!(e.is_retryable());
    }

    #[test]
    fn test_display_model() {
        let e = FnordError::model("non-JSON tool call arguments");
        assert!(e.to_string().starts_with("model error:"));
    }

    #[test]
    fn test_display_fatal() {
        let e = FnordError::fatal("worker panicked");
        assert!(e.to_string().starts_with("fatal:"));
    }

    #[test]
    fn test_exit_codes_distinct() {
        let errs = vec![
            FnordError::config("x"),
            FnordError::lock("x"),
            FnordError::index("x"),
            FnordError::tool_arg_missing("x"),
            FnordError::tool_call("x"),
            FnordError::approval_denied("x"),
            FnordError::transport(false, "x"),
            FnordError::model("x"),
            FnordError::fatal("x"),
        ];
        let codes: Vec<i32> = errs.iter().map(|e| e.exit_code()).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FnordError>();
    }

    #[test]
    fn test_non_retryable_transport() {
        let e = FnordError::transport(false, "dns failure");
        assert!(!e.is_retryable());
    }
}
