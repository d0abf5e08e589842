use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::ToolSpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Base trait for LLM backends (Gemini, OpenAI, mocks).
///
/// Implementations own their retry policy and request timeout; a `complete`
/// error means the backend is unusable for this turn.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message for the given instruction, history and tools
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<(Message, Usage)>;

    /// Single-shot text generation for grounding prompts
    async fn complete_text(&self, prompt: &str) -> Result<String> {
        let (message, _) = self
            .complete("", &[Message::user().with_text(prompt)], &[])
            .await?;
        Ok(message.text())
    }
}
