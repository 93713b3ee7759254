use std::collections::HashMap;

use fnord_core::ApprovalRecord;
use serde::{Deserialize, Serialize};

/// The on-disk settings document. Top-level keys `projects`, `approvals`,
/// `mcp_servers`, and `version` are reserved.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub projects: HashMap<String, ProjectRecord>,
    #[serde(default)]
    pub approvals: HashMap<String, Vec<ApprovalRecord>>,
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectRecord {
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub approvals: HashMap<String, Vec<ApprovalRecord>>,
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Stdio,
    StreamableHttp,
    WebSocket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub transport: TransportKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl SettingsDocument {
    pub const CURRENT_VERSION: u32 = 1;

    /// Sort-and-dedup every approval list in the document. Invariant §3/§4.1:
    /// approvals lists are unique-and-sorted sets after each write.
    pub fn normalize_approvals(&mut self) {
        normalize_map(&mut self.approvals);
        for project in self.projects.values_mut() {
            normalize_map(&mut project.approvals);
        }
    }
}

fn normalize_map(map: &mut HashMap<String, Vec<ApprovalRecord>>) {
    for list in map.values_mut() {
        let mut seen = std::collections::HashSet::new();
        list.retain(|r| seen.insert(approval_key(r)));
        list.sort_by(|a, b| approval_key(a).cmp(&approval_key(b)));
    }
}

fn approval_key(r: &ApprovalRecord) -> String {
    match r {
        ApprovalRecord::Prefix { pattern } => format!("prefix:{pattern}"),
        ApprovalRecord::Regex { pattern } => format!("regex:{pattern}"),
    }
}
