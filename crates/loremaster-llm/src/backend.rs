//! Provider selection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use loremaster_core::config::{ProviderConfig, ProviderKind};
use loremaster_core::ConversationTurn;

use crate::error::LlmError;
use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;
use crate::{TextGenerator, VisionGenerator};

/// A model bound to one provider, model id and temperature.
///
/// The chat engine holds one per role (parser, chat, vision).
#[derive(Debug, Clone)]
pub enum ModelBackend {
    OpenAi(OpenAiClient),
    Ollama(OllamaClient),
}

impl ModelBackend {
    /// Build a backend from the provider section of the config.
    ///
    /// For OpenAI the API key is read from `provider.api_key_env` here, so a
    /// missing key fails at startup rather than on the first request.
    pub fn from_config(
        provider: &ProviderConfig,
        model: &str,
        temperature: f32,
    ) -> Result<Self, LlmError> {
        let client = build_http_client(provider.request_timeout_secs)?;

        let backend = match provider.kind {
            ProviderKind::OpenAi => {
                let api_key = provider
                    .api_key()
                    .map_err(|_| LlmError::MissingCredential(provider.api_key_env.clone()))?;
                ModelBackend::OpenAi(OpenAiClient::new(
                    client,
                    api_key,
                    provider.base_url(),
                    model,
                    temperature,
                ))
            }
            ProviderKind::Ollama => ModelBackend::Ollama(OllamaClient::new(
                client,
                provider.base_url(),
                model,
                temperature,
            )),
        };

        info!(provider = %provider.kind, model, temperature, "Model backend ready");
        Ok(backend)
    }

    pub fn model(&self) -> &str {
        match self {
            ModelBackend::OpenAi(c) => c.model(),
            ModelBackend::Ollama(c) => c.model(),
        }
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client, LlmError> {
    let mut builder = Client::builder();
    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }
    builder
        .build()
        .map_err(|e| LlmError::Request(format!("failed to build HTTP client: {}", e)))
}

#[async_trait]
impl TextGenerator for ModelBackend {
    async fn generate(&self, messages: &[ConversationTurn]) -> Result<String, LlmError> {
        match self {
            ModelBackend::OpenAi(c) => c.generate(messages).await,
            ModelBackend::Ollama(c) => c.generate(messages).await,
        }
    }
}

#[async_trait]
impl VisionGenerator for ModelBackend {
    async fn describe(
        &self,
        system_prompt: &str,
        query: &str,
        image: &[u8],
    ) -> Result<String, LlmError> {
        match self {
            ModelBackend::OpenAi(c) => c.describe(system_prompt, query, image).await,
            ModelBackend::Ollama(c) => c.describe(system_prompt, query, image).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_openai_without_key_fails() {
        let provider = ProviderConfig {
            api_key_env: "LOREMASTER_BACKEND_TEST_UNSET_KEY".to_string(),
            ..ProviderConfig::default()
        };
        let err = ModelBackend::from_config(&provider, "gpt-4o", 0.7).unwrap_err();
        match err {
            LlmError::MissingCredential(var) => {
                assert_eq!(var, "LOREMASTER_BACKEND_TEST_UNSET_KEY")
            }
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let provider = ProviderConfig {
            kind: ProviderKind::Ollama,
            api_key_env: "LOREMASTER_BACKEND_TEST_UNSET_KEY".to_string(),
            request_timeout_secs: 30,
            ..ProviderConfig::default()
        };
        let backend = ModelBackend::from_config(&provider, "llama3", 0.0).unwrap();
        assert!(matches!(backend, ModelBackend::Ollama(_)));
        assert_eq!(backend.model(), "llama3");
    }

    #[tokio::test]
    async fn test_backend_dispatches_to_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": { "role": "assistant", "content": "Aye." },
                "done": true
            })))
            .mount(&server)
            .await;

        let provider = ProviderConfig {
            kind: ProviderKind::Ollama,
            base_url: server.uri(),
            ..ProviderConfig::default()
        };
        let backend = ModelBackend::from_config(&provider, "llama3", 0.7).unwrap();
        let reply = backend
            .generate(&[ConversationTurn::user("Ready?")])
            .await
            .unwrap();
        assert_eq!(reply, "Aye.");
    }
}
