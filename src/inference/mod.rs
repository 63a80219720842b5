pub mod prompts;
pub mod provider;
pub mod providers;

pub use prompts::CannedAction;
pub use provider::{GenerationProvider, ProviderError};
pub use providers::GeminiProvider;
