use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completion request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<ChatMessage>,
}

impl ChatCompletionRequest {
    /// A single user turn carrying the prompt.
    pub(crate) fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.into()),
            }],
        }
    }
}

/// Chat message in OpenAI format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct ChatMessage {
    pub(crate) role: String,
    #[serde(default)]
    pub(crate) content: Option<String>,
}

/// OpenAI-compatible chat completion response, reduced to what the gateway reads.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub(crate) choices: Vec<ChatChoice>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if any.
    pub(crate) fn into_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|choice| choice.message.content)
    }
}

/// Chat completion choice.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatChoice {
    pub(crate) message: ChatMessage,
}
