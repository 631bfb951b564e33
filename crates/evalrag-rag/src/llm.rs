//! LLM Client implementations
//!
//! Provides chat-completion clients for OpenAI-compatible APIs (OpenAI,
//! Azure, Groq) and for Ollama.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use evalrag_core::{ChatMessage, ChatRole, EvalError, LlmClient, LlmConfig, LlmProvider, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EvalError::Configuration(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// OpenAI-compatible Client
// ============================================================================

/// OpenAI-compatible chat completion client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| EvalError::Configuration("LLM API key required".to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .or_else(|| config.provider.default_base_url().map(str::to_string))
            .ok_or_else(|| {
                EvalError::Configuration(format!(
                    "LLM base URL required for provider {:?}",
                    config.provider
                ))
            })?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Set custom base URL (for Azure or compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = OpenAiRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EvalError::LlmError(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EvalError::LlmError(format!(
                "Completion provider error ({status}): {error_text}"
            )));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| EvalError::LlmError(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| EvalError::LlmError("No response generated".to_string()))
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens: 800,
            temperature: 0.2,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut client = Self::new(config.ollama_url.clone(), config.model.clone());
        client.client = http_client(config.timeout_secs)?;
        client.max_tokens = config.max_tokens;
        client.temperature = config.temperature;
        Ok(client)
    }
}

/// Fold chat messages into Ollama's system + prompt pair
fn split_system(messages: &[ChatMessage]) -> (Option<String>, String) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == ChatRole::System)
        .map(|m| m.content.as_str())
        .collect();
    let prompt: Vec<&str> = messages
        .iter()
        .filter(|m| m.role != ChatRole::System)
        .map(|m| m.content.as_str())
        .collect();

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, prompt.join("\n\n"))
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let (system, prompt) = split_system(messages);
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            system,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| EvalError::LlmError(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EvalError::LlmError(format!("Ollama error: {error_text}")));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| EvalError::LlmError(format!("Failed to parse Ollama response: {e}")))?;

        Ok(result.response.trim().to_string())
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure | LlmProvider::Groq => {
            Ok(Box::new(OpenAiClient::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_openai_client_creation() {
        let client = OpenAiClient::new("test-key", "gpt-4o-mini", 2048, 0.1);
        assert_eq!(client.model, "gpt-4o-mini");
    }

    #[test]
    fn test_groq_default_base_url() {
        let config = LlmConfig {
            api_key: Some("gsk-test".to_string()),
            ..Default::default()
        };
        let client = OpenAiClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(client.max_tokens, 800);
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let config = LlmConfig::default();
        assert!(matches!(
            create_llm_client(&config),
            Err(EvalError::Configuration(_))
        ));
    }

    #[test]
    fn test_split_system() {
        let messages = [ChatMessage::system("Be strict."), ChatMessage::user("Grade this.")];
        let (system, prompt) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("Be strict."));
        assert_eq!(prompt, "Grade this.");

        let (system, _) = split_system(&[ChatMessage::user("hi")]);
        assert!(system.is_none());
    }

    #[tokio::test]
    async fn test_openai_chat_sends_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer key"))
            .and(body_partial_json(json!({
                "model": "llama-3.3-70b-versatile",
                "max_tokens": 800,
                "messages": [
                    {"role": "system", "content": "Be strict."},
                    {"role": "user", "content": "Grade this."}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  {\"grade\": 7}\n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new("key", "llama-3.3-70b-versatile", 800, 0.2)
            .with_base_url(server.uri());
        let reply = client
            .chat(&[ChatMessage::system("Be strict."), ChatMessage::user("Grade this.")])
            .await
            .unwrap();

        assert_eq!(reply, "{\"grade\": 7}");
    }

    #[tokio::test]
    async fn test_openai_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("key", "m", 100, 0.0).with_base_url(server.uri());
        let err = client.chat(&[ChatMessage::user("hello")]).await.unwrap_err();
        assert!(matches!(err, EvalError::LlmError(msg) if msg.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_ollama_generate_with_system() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "llama3",
                "system": "Be strict.",
                "prompt": "Grade this.",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "{\"grade\": 3, \"feedback\": \"ok\"}",
                "done": true
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), "llama3");
        let reply = client
            .chat(&[ChatMessage::system("Be strict."), ChatMessage::user("Grade this.")])
            .await
            .unwrap();
        assert!(reply.contains("\"grade\": 3"));
    }
}
