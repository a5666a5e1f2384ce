//! Upstream LLM collaborator
//!
//! The guard service only ever hands masked text to the model. How the call
//! is made (HTTP client, retries, model choice) lives behind this trait.

use crate::Result;

/// Reply from the upstream model
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LlmReply {
    pub content: String,
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub model: Option<String>,
}

impl LlmReply {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send an already-masked prompt
    ///
    /// # Errors
    /// - `Error::Llm` when the upstream call fails
    async fn complete(&self, masked_prompt: &str) -> Result<LlmReply>;

    /// Model identifier, if known
    fn model(&self) -> Option<&str> {
        None
    }
}
