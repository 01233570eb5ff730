use thiserror::Error;

/// Top-level error type for LoreMaster.
///
/// Capability crates define their own error types where they need richer
/// detail and convert into `LoreError` at the boundary so that `?` works
/// across crates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Missing credential: environment variable {env_var} is not set")]
    MissingCredential { env_var: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LoreError {
    fn from(err: toml::de::Error) -> Self {
        LoreError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LoreError {
    fn from(err: toml::ser::Error) -> Self {
        LoreError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LoreError {
    fn from(err: serde_json::Error) -> Self {
        LoreError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for LoreMaster operations.
pub type Result<T> = std::result::Result<T, LoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoreError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(LoreError, &str)> = vec![
            (
                LoreError::Capture("no monitor".to_string()),
                "Capture error: no monitor",
            ),
            (
                LoreError::Speech("engine gone".to_string()),
                "Speech error: engine gone",
            ),
            (
                LoreError::Llm("rate limited".to_string()),
                "LLM error: rate limited",
            ),
            (
                LoreError::Transport("pipe closed".to_string()),
                "Transport error: pipe closed",
            ),
            (
                LoreError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = LoreError::MissingCredential {
            env_var: "OPENAI_API_KEY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing credential: environment variable OPENAI_API_KEY is not set"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let err: LoreError = io_err.into();
        assert!(matches!(err, LoreError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("pipe broken"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let lore_err: LoreError = err.unwrap_err().into();
        assert!(matches!(lore_err, LoreError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let lore_err: LoreError = err.unwrap_err().into();
        assert!(matches!(lore_err, LoreError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
