//! LoreMaster application binary - composition root.
//!
//! 1. Parse the CLI and load configuration from TOML
//! 2. Set up logging (file + stderr)
//! 3. Resolve the model backends for the parser, chat and vision roles
//! 4. Start the screen capturer and the speech worker
//! 5. Serve framed commands on stdin/stdout, or run a single turn

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use loremaster_capture::desktop::DesktopCapturer;
use loremaster_chat::{ConversationContext, DispatchEngine, IntentParser, SpeechDispatcher};
use loremaster_core::config::LoreConfig;
use loremaster_llm::ModelBackend;
use loremaster_pipe::{CommandLoop, FramedTransport, LoopExit};
use loremaster_speech::system::SystemSpeechEngine;

use cli::{CliArgs, RunMode};

const SELFTEST_INPUT: &str = "Ask a warrior character about their quest for justice.";

/// Build the dispatch engine from configuration.
///
/// Fails if a backend cannot be configured, e.g. a missing API key.
fn build_engine(config: &LoreConfig) -> anyhow::Result<DispatchEngine> {
    let models = &config.models;
    let backend = |role: &str, model: &str, temperature: f32| {
        ModelBackend::from_config(&config.provider, model, temperature)
            .with_context(|| format!("failed to configure the {role} model ({model})"))
    };

    let parser = backend("parser", &models.parser_model, models.parser_temperature)?;
    let chat = backend("chat", &models.chat_model, models.chat_temperature)?;
    let vision = backend("vision", &models.vision_model, models.chat_temperature)?;

    if !DesktopCapturer::is_available() {
        warn!("Built without the `screen` feature, vision questions will fail");
    }
    let capturer = DesktopCapturer::new(config.screenshot.clone());

    let speech = if config.speech.enabled {
        SpeechDispatcher::spawn(SystemSpeechEngine::new(config.speech.rate))
            .context("failed to start the speech worker")?
    } else {
        info!("Speech disabled");
        SpeechDispatcher::disabled()
    };

    Ok(DispatchEngine::new(
        IntentParser::new(Arc::new(parser)),
        Arc::new(chat),
        Arc::new(vision),
        Arc::new(capturer),
        speech,
    ))
}

/// Serve the host on stdin/stdout until it shuts us down or hangs up.
async fn serve(config: &LoreConfig, engine: DispatchEngine) -> anyhow::Result<()> {
    let transport = FramedTransport::new(
        tokio::io::stdin(),
        tokio::io::stdout(),
        config.transport.chunk_size,
    );
    let mut command_loop =
        CommandLoop::new(transport, engine, ConversationContext::new(&config.context));

    match command_loop.run().await {
        LoopExit::Shutdown => {
            info!("Shutting down");
            // Queued speech is abandoned on shutdown.
            std::process::exit(0);
        }
        LoopExit::Closed => {
            info!("Host disconnected, exiting");
            Ok(())
        }
    }
}

/// Run one `talk` turn outside the pipe and wait for its speech.
async fn single_turn(config: &LoreConfig, engine: DispatchEngine, input: &str, print: bool) {
    let mut ctx = ConversationContext::new(&config.context);
    let response = engine.handle_talk(&mut ctx, input).await;
    info!(
        success = response.success,
        message = %response.message,
        "Single turn finished"
    );
    if print {
        println!("{}", response.message);
    }
    engine.into_speech().drain();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match LoreConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (LoreConfig::default(), Some(e)),
    };

    let level = args.resolve_log_level(&config.general.log_level);
    logging::init(&config.general, &level);

    info!("Starting LoreMaster v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load configuration, using defaults"
        ),
    }

    if let Some(kind) = args.provider {
        config.provider.kind = kind;
    }
    if args.no_speech {
        config.speech.enabled = false;
    }

    let engine = build_engine(&config)?;

    match args.run_mode() {
        RunMode::Serve => serve(&config, engine).await,
        RunMode::SelfTest => {
            info!(input = SELFTEST_INPUT, "Running self-test");
            single_turn(&config, engine, SELFTEST_INPUT, false).await;
            Ok(())
        }
        RunMode::Ask(text) => {
            single_turn(&config, engine, &text, true).await;
            Ok(())
        }
    }
}
