pub mod completion;
pub mod http_provider;
pub mod interjections;
pub mod provider;

pub use completion::{CompletionLoop, TurnOutcome};
pub use http_provider::{HttpCompletionProvider, ModelConfig};
pub use interjections::{InterjectionQueue, InterjectionSender};
pub use provider::{CompletionProvider, CompletionResponse, TurnKind};
