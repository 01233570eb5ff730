//! Error types for the dialogue engine.

use loremaster_core::error::LoreError;
use loremaster_llm::LlmError;

/// Errors from the dialogue engine.
///
/// None of these reach the host: the engine turns them into a failure reply.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no active persona")]
    NoActivePersona,
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("LLM error: {0}")]
    LlmError(String),
    #[error("capture error: {0}")]
    CaptureError(String),
    #[error("voice error: {0}")]
    VoiceError(String),
    #[error("speech queue is closed")]
    SpeechQueueClosed,
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        ChatError::LlmError(err.to_string())
    }
}

impl From<LoreError> for ChatError {
    fn from(err: LoreError) -> Self {
        match err {
            LoreError::Capture(msg) => ChatError::CaptureError(msg),
            LoreError::Speech(msg) => ChatError::VoiceError(msg),
            LoreError::Serialization(msg) => ChatError::ParseError(msg),
            other => ChatError::LlmError(other.to_string()),
        }
    }
}
