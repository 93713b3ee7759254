pub mod document;
pub mod store;

pub use document::{McpServerConfig, ProjectRecord, SettingsDocument, TransportKind};
pub use store::SettingsStore;
