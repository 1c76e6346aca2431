//! LLM Provider implementations

pub mod anthropic;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

use std::sync::Arc;

use crate::config::RunSettings;

/// Create the Anthropic provider from resolved run settings
pub fn create_provider(settings: &RunSettings) -> Arc<dyn LLMProvider + Send + Sync> {
    Arc::new(AnthropicClient::new(settings.api_key.clone()).with_base_url(&settings.base_url))
}
