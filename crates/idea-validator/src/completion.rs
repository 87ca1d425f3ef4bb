use async_trait::async_trait;

use idea_common::openai::{Message, OpenAiClient, OpenAiClientError};

/// Any failure talking to the completion service: network, auth, rate
/// limiting, upstream errors and timeouts alike.
#[derive(Debug, thiserror::Error)]
#[error("completion service call failed: {0}")]
pub struct CompletionError(#[from] pub OpenAiClientError);

/// Text-completion service used by the evaluation pipeline.
///
/// One call is one outbound request; implementations must not retry.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError>;
}

/// [`CompletionClient`] backed by an OpenAI-compatible chat-completions API.
pub struct OpenAiCompletionClient {
    client: OpenAiClient,
}

impl OpenAiCompletionClient {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        Ok(self.client.complete_text(messages.to_vec()).await?)
    }
}
