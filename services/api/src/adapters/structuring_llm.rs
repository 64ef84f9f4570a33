//! services/api/src/adapters/structuring_llm.rs
//!
//! This module contains the adapter for the Structuring LLM.
//! It implements the `StructuringService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use serde::Deserialize;
use syllabus_core::{
    domain::Chapter,
    ports::{PortError, PortResult, StructuringService},
};

const DEFAULT_SYSTEM_PROMPT: &str = "You turn course syllabus text into a knowledge tree. \
Respond with a single JSON object of the form {\"chapters\": [{\"title\": \"...\", \"topics\": [...]}]}. \
Keep the chapters in syllabus order and give every chapter a non-empty title.";

/// The JSON document the model is asked to produce.
#[derive(Deserialize)]
struct StructuredSyllabus {
    #[serde(default)]
    chapters: Vec<Chapter>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StructuringService` using an OpenAI-compatible LLM in JSON mode.
#[derive(Clone)]
pub struct OpenAiStructuringAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
}

impl OpenAiStructuringAdapter {
    /// Creates a new `OpenAiStructuringAdapter`. `None` selects the built-in prompt.
    pub fn new(client: Client<OpenAIConfig>, model: String, system_prompt: Option<String>) -> Self {
        Self {
            client,
            model,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

/// Parses the model's reply. Chapters are kept verbatim, untitled ones included.
fn parse_chapters(content: &str) -> PortResult<Vec<Chapter>> {
    let parsed: StructuredSyllabus = serde_json::from_str(content.trim()).map_err(|e| {
        PortError::Unexpected(format!("Structuring LLM returned malformed JSON: {}", e))
    })?;
    Ok(parsed.chapters)
}

//=========================================================================================
// `StructuringService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StructuringService for OpenAiStructuringAdapter {
    async fn structure_syllabus(&self, content: &str) -> PortResult<Vec<Chapter>> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("SYLLABUS:\n\n{}", content))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Transport failures are reported as unavailability, everything else as unexpected.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| match e {
                OpenAIError::Reqwest(_) => PortError::Unavailable(e.to_string()),
                other => PortError::Unexpected(other.to_string()),
            })?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Structuring LLM response contained no text content.".to_string(),
                )
            })?;

        parse_chapters(&reply)
    }
}
