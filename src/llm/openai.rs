//! OpenAI chat-completions 视觉模型实现

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::VisionModel;
use crate::config::ModelConfig;
use crate::error::{LedgerError, Result};
use crate::image::EncodedImage;

pub struct OpenAiVisionModel {
    client: Client,
    config: ModelConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatMessage<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart<'a>> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

impl OpenAiVisionModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LedgerError::Config("OpenAI API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn build_request<'a>(
        &'a self,
        image: &EncodedImage,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage::System {
                    content: system_prompt,
                },
                ChatMessage::User {
                    content: vec![
                        ContentPart::Text { text: user_prompt },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_url(),
                            },
                        },
                    ],
                },
            ],
        }
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionModel {
    async fn describe(
        &self,
        image: &EncodedImage,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String> {
        info!(
            "[Vision] Describing image via OpenAI {} ({} bytes, {})",
            self.config.model,
            image.len(),
            image.mime_type
        );
        let request = self.build_request(image, system_prompt, user_prompt);

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::model_with_source("OpenAI API request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::model_with_source("Failed to read response body", e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LedgerError::model(format!(
                "OpenAI API error ({}): {}",
                status, message
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LedgerError::model_with_source("Failed to parse OpenAI response", e))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LedgerError::model("OpenAI response contained no text content"))?;

        debug!("[Vision] raw reply: {}", content);
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
