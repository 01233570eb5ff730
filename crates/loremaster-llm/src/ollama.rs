//! Ollama provider via the native `/api/chat` endpoint.
//!
//! Requests are sent with `stream: false`, so the reply is a single object:
//! ```json
//! {"model":"llama3","message":{"role":"assistant","content":"Hi"},"done":true}
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use loremaster_core::ConversationTurn;

use crate::error::LlmError;
use crate::{TextGenerator, VisionGenerator};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama-native message format. Images travel as bare base64 strings.
#[derive(Debug, Clone, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

impl From<&ConversationTurn> for OllamaMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
            images: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessageResponse>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(
        client: Client,
        base_url: Option<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: Vec<OllamaMessage>) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        debug!(
            model = %self.model,
            message_count = messages.len(),
            "Sending Ollama chat"
        );

        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| LlmError::MalformedResponse("missing message.content".to_string()))?;

        let content = content.trim();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content.to_string())
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, messages: &[ConversationTurn]) -> Result<String, LlmError> {
        self.chat(messages.iter().map(OllamaMessage::from).collect())
            .await
    }
}

#[async_trait]
impl VisionGenerator for OllamaClient {
    async fn describe(
        &self,
        system_prompt: &str,
        query: &str,
        image: &[u8],
    ) -> Result<String, LlmError> {
        let messages = vec![
            OllamaMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
                images: Vec::new(),
            },
            OllamaMessage {
                role: "user".to_string(),
                content: query.to_string(),
                images: vec![BASE64.encode(image)],
            },
        ];
        self.chat(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(content: &str) -> Value {
        json!({
            "model": "llama3",
            "message": { "role": "assistant", "content": content },
            "done": true
        })
    }

    #[test]
    fn test_text_message_omits_images() {
        let msg = OllamaMessage::from(&ConversationTurn::user("hi"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "hi"}));
    }

    #[tokio::test]
    async fn test_generate_sends_non_streaming_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Well met, traveler.")))
            .mount(&server)
            .await;

        let client = OllamaClient::new(Client::new(), Some(server.uri()), "llama3", 0.0);
        let text = client
            .generate(&[ConversationTurn::user("Hello")])
            .await
            .unwrap();
        assert_eq!(text, "Well met, traveler.");

        let requests = server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.0);
        assert_eq!(body["messages"][0]["content"], "Hello");
    }

    #[tokio::test]
    async fn test_describe_attaches_base64_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("A map of Hyrule.")))
            .mount(&server)
            .await;

        let client = OllamaClient::new(Client::new(), Some(server.uri()), "llava", 0.7);
        let text = client
            .describe("You are Navi.", "Where am I?", &[0xFF, 0xD8, 0x00])
            .await
            .unwrap();
        assert_eq!(text, "A map of Hyrule.");

        let requests = server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0].get("images").is_none());
        assert_eq!(body["messages"][1]["images"][0], "/9gA");
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(Client::new(), Some(server.uri()), "missing", 0.0);
        let err = client
            .generate(&[ConversationTurn::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_missing_message_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .mount(&server)
            .await;

        let client = OllamaClient::new(Client::new(), Some(server.uri()), "llama3", 0.0);
        let err = client
            .generate(&[ConversationTurn::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }
}
