//! Dispatch engine: central coordinator wiring parser, context, models and
//! speech.
//!
//! One `talk` request runs: style command check, intent parsing, persona
//! resolution and context switch, then exactly one of the text or vision
//! paths. Failures below this point become a generic failure reply and
//! leave persona state untouched.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use loremaster_capture::ScreenCapturer;
use loremaster_core::{Role, TalkResponse};
use loremaster_llm::{TextGenerator, VisionGenerator};

use crate::context::{resolve_persona, ConversationContext};
use crate::error::ChatError;
use crate::parser::{style_command, IntentParser};
use crate::response::{persona_prompt, vision_prompt};
use crate::voice::SpeechDispatcher;

/// Reply to `initialize`.
pub const INITIALIZED_MESSAGE: &str = "LoreMaster plugin initialized successfully";

/// Reply when answering fails.
pub const FAILURE_MESSAGE: &str = "An error occurred.";

/// Coordinates one conversational turn end to end.
pub struct DispatchEngine {
    parser: IntentParser,
    text: Arc<dyn TextGenerator>,
    vision: Arc<dyn VisionGenerator>,
    capturer: Arc<dyn ScreenCapturer>,
    speech: SpeechDispatcher,
}

impl DispatchEngine {
    pub fn new(
        parser: IntentParser,
        text: Arc<dyn TextGenerator>,
        vision: Arc<dyn VisionGenerator>,
        capturer: Arc<dyn ScreenCapturer>,
        speech: SpeechDispatcher,
    ) -> Self {
        Self {
            parser,
            text,
            vision,
            capturer,
            speech,
        }
    }

    pub fn initialize(&self) -> TalkResponse {
        info!("Initializing plugin");
        TalkResponse::ok(INITIALIZED_MESSAGE)
    }

    /// Handle one `talk` request.
    pub async fn handle_talk(&self, ctx: &mut ConversationContext, input: &str) -> TalkResponse {
        info!(input = %input, "Input received");

        if let Some(style) = style_command(input) {
            return apply_style(ctx, &style);
        }

        let intent = self.parser.parse(input).await;
        if let Some(style) = style_command(&intent.message) {
            return apply_style(ctx, &style);
        }

        let (key, gender) = resolve_persona(&intent, &ctx.active);
        ctx.activate(key, gender);

        let result = if intent.requires_vision {
            self.respond_with_vision(ctx, &intent.message).await
        } else {
            self.respond_with_text(ctx, &intent.message).await
        };

        match result {
            Ok(reply) => {
                if let Err(e) = self.speech.enqueue(&reply, gender.is_female()) {
                    warn!(error = %e, "Could not queue reply for speech");
                }
                TalkResponse::ok(reply)
            }
            Err(e) => {
                error!(
                    error = %e,
                    vision = intent.requires_vision,
                    "Failed to generate reply"
                );
                TalkResponse::failure(FAILURE_MESSAGE)
            }
        }
    }

    /// Text path. The user turn stays in history even if the model fails.
    async fn respond_with_text(
        &self,
        ctx: &mut ConversationContext,
        message: &str,
    ) -> Result<String, ChatError> {
        let key = ctx.active_key()?.clone();
        ctx.store.append(Role::User, message);

        let prompt = persona_prompt(&key, ctx.style.as_deref());
        let messages = ctx.store.windowed_messages(&prompt, ctx.window_size);
        debug!(
            persona = %key,
            message_count = messages.len(),
            "Requesting text reply"
        );

        let reply = self.text.generate(&messages).await?;
        ctx.store.append(Role::Assistant, reply.as_str());
        info!(persona = %key, reply = %reply, "Generated reply");
        Ok(reply)
    }

    /// Vision path. Same history policy as the text path.
    async fn respond_with_vision(
        &self,
        ctx: &mut ConversationContext,
        message: &str,
    ) -> Result<String, ChatError> {
        let key = ctx.active_key()?.clone();
        ctx.store.append(Role::User, message);

        let image = self.capturer.capture_screen().await?;
        let prompt = vision_prompt(&key, ctx.style.as_deref());
        debug!(persona = %key, image_bytes = image.len(), "Requesting vision reply");

        let reply = self.vision.describe(&prompt, message, &image).await?;
        ctx.store.append(Role::Assistant, reply.as_str());
        info!(persona = %key, reply = %reply, "Generated vision reply");
        Ok(reply)
    }

    pub fn speech(&self) -> &SpeechDispatcher {
        &self.speech
    }

    /// Take the speech dispatcher out, e.g. to drain it before exit.
    pub fn into_speech(self) -> SpeechDispatcher {
        self.speech
    }
}

fn apply_style(ctx: &mut ConversationContext, style: &str) -> TalkResponse {
    ctx.set_style(style);
    TalkResponse::ok(format!("Style set to '{}'", style))
}
