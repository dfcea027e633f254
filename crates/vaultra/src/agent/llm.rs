use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::domain::PromptMessage;
use crate::config::{LlmConfig, LlmProvider};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_REPLY_TOKENS: u32 = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation is not configured: {0} is missing")]
    NotConfigured(&'static str),
    #[error("text generation request failed: {0}")]
    Transport(String),
    #[error("text generation backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected text generation payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            GenerationError::Decode(value.to_string())
        } else {
            GenerationError::Transport(value.to_string())
        }
    }
}

/// Chat-completion backend for the assistant.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, messages: &[PromptMessage]) -> Result<String, GenerationError>;
}

/// Picks the backend named by `LLM_PROVIDER`.
pub fn generator_from_config(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    let generator: Arc<dyn TextGenerator> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiGenerator::new(config)?),
        LlmProvider::Ollama => Arc::new(OllamaGenerator::new(config)?),
    };
    Ok(generator)
}

fn http_client(config: &LlmConfig) -> Result<Client, GenerationError> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|err| GenerationError::Transport(err.to_string()))
}

pub struct OpenAiGenerator {
    http: Client,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        Ok(Self {
            http: http_client(config)?,
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        })
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiResponse {
    fn into_text(self) -> Result<String, GenerationError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Decode("completion has no content".to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, messages: &[PromptMessage]) -> Result<String, GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::NotConfigured("OPENAI_API_KEY"));
        }
        let response = self
            .http
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&OpenAiRequest {
                model: &self.model,
                messages,
                max_tokens: MAX_REPLY_TOKENS,
            })
            .send()
            .await?;
        let body: OpenAiResponse = read_json(response).await?;
        body.into_text()
    }
}

pub struct OllamaGenerator {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        Ok(Self {
            http: http_client(config)?,
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
        })
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: ReplyMessage,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, messages: &[PromptMessage]) -> Result<String, GenerationError> {
        if self.base_url.is_empty() {
            return Err(GenerationError::NotConfigured("OLLAMA_BASE_URL"));
        }
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&OllamaRequest {
                model: &self.model,
                messages,
                stream: false,
            })
            .send()
            .await?;
        let body: OllamaResponse = read_json(response).await?;
        body.message
            .content
            .ok_or_else(|| GenerationError::Decode("chat reply has no content".to_string()))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let message = response.text().await.unwrap_or_default();
    Err(GenerationError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::domain::MessageRole;
    use std::time::Duration;

    fn config(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            provider,
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: "http://localhost:11434/".to_string(),
            ollama_model: "llama3".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn openai_without_key_is_not_configured() {
        let generator = OpenAiGenerator::new(&config(LlmProvider::OpenAi)).expect("client");
        let reply = generator
            .generate(&[PromptMessage::new(MessageRole::User, "hi")])
            .await;
        assert_eq!(reply, Err(GenerationError::NotConfigured("OPENAI_API_KEY")));
    }

    #[test]
    fn request_bodies_use_lowercase_roles() {
        let messages = [
            PromptMessage::new(MessageRole::System, "be brief"),
            PromptMessage::new(MessageRole::User, "hi"),
        ];
        let body = serde_json::to_value(OllamaRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
        })
        .expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({
                "model": "llama3",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hi" },
                ],
                "stream": false,
            })
        );
    }

    #[test]
    fn completion_text_comes_from_the_first_choice() {
        let parsed: OpenAiResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Grow steadily."}}]}"#,
        )
        .expect("parse");
        assert_eq!(parsed.into_text(), Ok("Grow steadily.".to_string()));

        let empty: OpenAiResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("parse");
        assert!(matches!(empty.into_text(), Err(GenerationError::Decode(_))));
    }

    #[test]
    fn ollama_base_url_drops_trailing_slash() {
        let generator = OllamaGenerator::new(&config(LlmProvider::Ollama)).expect("client");
        assert_eq!(generator.base_url, "http://localhost:11434");
    }
}
