//! Language-model capabilities for LoreMaster.
//!
//! Exposes the [`TextGenerator`] and [`VisionGenerator`] traits the chat
//! engine calls through, and [`ModelBackend`], the provider handle chosen
//! once from configuration at startup.

pub mod backend;
pub mod error;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;

use loremaster_core::ConversationTurn;

pub use backend::ModelBackend;
pub use error::LlmError;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Chat-completion capability: ordered messages in, reply text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, messages: &[ConversationTurn]) -> Result<String, LlmError>;
}

/// Image-question capability.
///
/// `system_prompt` sets the persona, `query` is the user's question and
/// `image` the encoded screenshot (PNG or JPEG).
#[async_trait]
pub trait VisionGenerator: Send + Sync {
    async fn describe(
        &self,
        system_prompt: &str,
        query: &str,
        image: &[u8],
    ) -> Result<String, LlmError>;
}

/// MIME type of an encoded image, sniffed from its magic bytes.
pub fn image_mime(image: &[u8]) -> &'static str {
    if image.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else {
        "image/jpeg"
    }
}
