//! services/api/src/adapters/description_llm.rs
//!
//! This module contains the adapter for the plant-description LLM.
//! It implements the `PlantDescriptionService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use garden_core::ports::{PlantDescriptionService, PortError, PortResult};
use regex::Regex;
use std::sync::LazyLock;

const SYSTEM_PROMPT: &str = "You are a botanist helping people care for their house and garden plants. \
Answer ONLY with a JSON object and nothing else, with these keys: \
\"name\" (the most common English name), \"latinName\" (the scientific name), \
\"description\" (two or three sentences about the plant and its care), \
\"wateringFrequency\" (a whole number of days between two waterings), \
\"lightExposure\" (a short phrase such as \"Bright indirect light\").";

/// Matches a fenced code block, capturing its content.
static FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok());

/// Removes the Markdown code fence models often wrap JSON answers in.
pub fn strip_code_fence(raw: &str) -> String {
    FENCE
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| raw.trim().to_string(), |m| m.as_str().to_string())
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PlantDescriptionService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiDescriptionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiDescriptionAdapter {
    /// Creates a new `OpenAiDescriptionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `PlantDescriptionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlantDescriptionService for OpenAiDescriptionAdapter {
    /// Asks the model to describe the species as a JSON object.
    async fn describe_plant(&self, latin_name: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Describe the plant species: {}", latin_name))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Description LLM response contained no text content.".to_string())
            })?;

        Ok(strip_code_fence(&content))
    }
}
