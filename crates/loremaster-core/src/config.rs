use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LoreError, Result};

/// Top-level configuration for LoreMaster.
///
/// Loaded from `~/.loremaster/config.toml` by default. Every section falls
/// back to its defaults when absent, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub screenshot: ScreenshotConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl LoreConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoreConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory the log file is written to.
    pub log_dir: String,
    /// Log file name inside `log_dir`.
    pub log_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: ".".to_string(),
            log_file: "loremaster.log".to_string(),
        }
    }
}

/// Supported language-model providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = LoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(LoreError::Config(format!("unknown provider: {}", other))),
        }
    }
}

/// Language-model provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Environment variable holding the API key (OpenAI only).
    pub api_key_env: String,
    /// Override for the provider endpoint. Empty uses the provider default.
    pub base_url: String,
    /// Per-request timeout in seconds. 0 disables the timeout.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: String::new(),
            request_timeout_secs: 0,
        }
    }
}

impl ProviderConfig {
    /// Endpoint override, if one is configured.
    pub fn base_url(&self) -> Option<String> {
        let trimmed = self.base_url.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(LoreError::MissingCredential {
                env_var: self.api_key_env.clone(),
            }),
        }
    }
}

/// Model identifiers and sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model used to turn utterances into intents.
    pub parser_model: String,
    /// Model used for in-character replies.
    pub chat_model: String,
    /// Model used when the question needs the screen.
    pub vision_model: String,
    pub parser_temperature: f32,
    pub chat_temperature: f32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            parser_model: "gpt-4o".to_string(),
            chat_model: "gpt-4o".to_string(),
            vision_model: "gpt-4o".to_string(),
            parser_temperature: 0.0,
            chat_temperature: 0.7,
        }
    }
}

/// Screen capture settings for vision questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    /// Monitor index to capture. Out-of-range falls back to the primary monitor.
    pub monitor_index: usize,
    /// Downscale wider captures to this width. 0 keeps native resolution.
    pub max_width: u32,
    /// Format: "jpeg" or "png".
    pub format: String,
    /// JPEG quality (1-100).
    pub quality: u8,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            monitor_index: 0,
            max_width: 1280,
            format: "jpeg".to_string(),
            quality: 80,
        }
    }
}

/// Conversation memory limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// History is halved when its token estimate exceeds this.
    pub token_ceiling: usize,
    /// Number of most recent turns sent with each model call.
    pub window_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_ceiling: 12_000,
            window_size: 10,
        }
    }
}

/// Spoken reply settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// Engine-specific speaking rate adjustment. 0 keeps the engine default.
    pub rate: i32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 0,
        }
    }
}

/// Host pipe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Read size; a shorter read ends the inbound message.
    pub chunk_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { chunk_size: 4096 }
    }
}
