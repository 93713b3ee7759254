mod queue;

pub use queue::{InteractionHandle, PromptChoice, UiError, UiHandle, UiQueue};
