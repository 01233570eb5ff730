//! CLI argument definitions for the LoreMaster binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use loremaster_core::config::ProviderKind;

/// LoreMaster: talk to characters from any game or story, in their voice.
///
/// By default, serves framed JSON commands on stdin/stdout for a host
/// application.
#[derive(Parser, Debug)]
#[command(name = "loremaster", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Model provider (openai, ollama).
    #[arg(long = "provider")]
    pub provider: Option<ProviderKind>,

    /// Run one canned talk turn, log the result and exit.
    #[arg(long = "selftest")]
    pub selftest: bool,

    /// Run one talk turn with this text and print the reply.
    #[arg(long = "ask", value_name = "TEXT", conflicts_with = "selftest")]
    pub ask: Option<String>,

    /// Do not speak replies.
    #[arg(long = "no-speech")]
    pub no_speech: bool,
}

/// What the binary does after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    SelfTest,
    Ask(String),
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > LOREMASTER_CONFIG env var > platform default
    /// (~/.loremaster/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("LOREMASTER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value. `RUST_LOG` overrides
    /// both when the subscriber is built.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// `--ask` wins, then `--selftest` or `SELFTEST=1`, then serving.
    pub fn run_mode(&self) -> RunMode {
        if let Some(ref text) = self.ask {
            return RunMode::Ask(text.clone());
        }
        let env_selftest = std::env::var("SELFTEST").ok();
        if self.selftest || is_truthy(env_selftest.as_deref()) {
            return RunMode::SelfTest;
        }
        RunMode::Serve
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".loremaster").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".loremaster").join("config.toml");
    }
    PathBuf::from("config.toml")
}
