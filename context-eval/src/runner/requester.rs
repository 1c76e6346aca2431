//! Single-prompt completion with timing

use std::sync::Arc;
use std::time::Instant;

use crate::cases::CompletionResult;
use crate::config::RunSettings;
use crate::providers::{CompletionRequest, LLMProvider, ProviderResult};

/// Sends one prompt per call with the run's model and output budget
pub struct Requester {
    provider: Arc<dyn LLMProvider + Send + Sync>,
    model: String,
    max_tokens: u32,
}

impl Requester {
    pub fn new(provider: Arc<dyn LLMProvider + Send + Sync>, settings: &RunSettings) -> Self {
        Self {
            provider,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Exactly one request, no retry. Time is wall-clock around the call.
    pub async fn request(&self, prompt: &str) -> ProviderResult<CompletionResult> {
        let request = CompletionRequest::prompt(&self.model, prompt, self.max_tokens);

        let start = Instant::now();
        let response = self.provider.complete(&request).await?;
        let elapsed = start.elapsed();

        tracing::debug!(
            "{} replied in {:?} ({} -> {} tokens)",
            self.provider.name(),
            elapsed,
            response.input_tokens,
            response.output_tokens
        );

        Ok(CompletionResult::from_response(response, elapsed, &self.model))
    }
}
