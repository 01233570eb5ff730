//! Error types for model providers.

use loremaster_core::LoreError;

/// Errors from a text or vision generation call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("model returned an empty reply")]
    EmptyResponse,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request(err.to_string())
    }
}

impl From<LlmError> for LoreError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingCredential(env_var) => LoreError::MissingCredential { env_var },
            other => LoreError::Llm(other.to_string()),
        }
    }
}
