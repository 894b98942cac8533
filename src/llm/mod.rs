pub mod anthropic;
pub mod client;
pub mod context;
pub mod refinement;

pub use anthropic::AnthropicClient;
pub use client::{LLMClient, LLMError, SuggestedCommand};
pub use context::{ContextBuilder, PromptContext};
pub use refinement::{RefinementAgent, RefinementOutcome};
