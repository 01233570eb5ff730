//! Intent parser.
//!
//! Asks the parser model to turn a free-form utterance into an [`Intent`].
//! Parsing is total: anything unusable from the model collapses into a
//! generic intent that keeps the user's words verbatim.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use loremaster_core::extract::parse_first_object;
use loremaster_core::{ConversationTurn, Gender, Intent, GENERIC_CHARACTER, GENERIC_GAME};
use loremaster_llm::TextGenerator;

use crate::error::ChatError;

/// Message used when the host sends an empty utterance.
pub const GREETING: &str = "Hello!";

const INSTRUCTION: &str = r#"Your task is to extract structured data from a natural language request addressed to a video game or story character.

Always respond ONLY with valid minified JSON like this:
{"game":"<game>","character":"<character>","gender":"male|female","message":"<message>","requires_vision":false}

Rules:
- "character" is the character being addressed. Use "Character" if none is named.
- "game" is the game, series or setting the character belongs to. Infer it from the character when you can; use "Game" if you cannot.
- "gender" is the character's gender: "male" or "female".
- "message" is what the user wants to say to the character, rephrased as a direct question or remark.
- "requires_vision" is true only when answering needs a look at the user's screen (what is on screen, this item, this map, the enemy in front of me).

Examples:
Input: Ask Zeus from Greek Mythology about his power over thunder
Output: {"game":"Greek Mythology","character":"Zeus","gender":"male","message":"Tell me about your power over thunder.","requires_vision":false}
Input: tell me more
Output: {"game":"Game","character":"Character","gender":"male","message":"tell me more","requires_vision":false}
Input: What about Hera?
Output: {"game":"Game","character":"Hera","gender":"female","message":"What about Hera?","requires_vision":false}
Input: Navi, what is this thing on my screen?
Output: {"game":"The Legend of Zelda: Ocarina of Time","character":"Navi","gender":"female","message":"What is this thing on my screen?","requires_vision":true}"#;

static STYLE_COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*set\s+style(?:\s+(.*))?$").unwrap());

/// Values the model uses when it does not know a character or game.
const UNKNOWN_MARKERS: &[&str] = &["", "unknown", "none", "n/a", "null"];

/// Recognize a `set style <style>` command.
///
/// Returns the trimmed style, or an empty string when the style is being
/// cleared. `None` when `message` is not a style command.
pub fn style_command(message: &str) -> Option<String> {
    STYLE_COMMAND_RE.captures(message).map(|caps| {
        caps.get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    })
}

/// Model-backed utterance parser.
pub struct IntentParser {
    generator: Arc<dyn TextGenerator>,
}

impl IntentParser {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Parse `text` into an intent. Never fails.
    pub async fn parse(&self, text: &str) -> Intent {
        if text.trim().is_empty() {
            debug!("Empty utterance, using greeting intent");
            return Intent::generic(GREETING);
        }

        match self.try_parse(text).await {
            Ok(intent) => {
                debug!(
                    character = %intent.character,
                    game = %intent.game,
                    gender = %intent.gender,
                    requires_vision = intent.requires_vision,
                    "Parsed intent"
                );
                intent
            }
            Err(e) => {
                warn!(error = %e, "Intent parsing failed, using generic fallback");
                Intent::generic(text)
            }
        }
    }

    async fn try_parse(&self, text: &str) -> Result<Intent, ChatError> {
        let messages = [
            ConversationTurn::system(INSTRUCTION),
            ConversationTurn::user(format!("Input: {}\nOutput:", text)),
        ];
        debug!(input = %text, "Sending utterance to parser model");

        let raw = self.generator.generate(&messages).await?;
        debug!(raw = %raw, "Parser model replied");

        let value = parse_first_object(&raw)?;
        intent_from_value(&value, text)
    }
}

/// Normalize the parser model's object into an [`Intent`].
///
/// Accepts `gender` or `sex`, and `requires_vision`, `requiresVision` or
/// `vision`. A missing or blank message falls back to `original`.
pub fn intent_from_value(value: &Value, original: &str) -> Result<Intent, ChatError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ChatError::ParseError("parser reply is not an object".to_string()))?;

    let message = text_field(obj, &["message"])
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(original);

    Ok(Intent {
        game: normalize_name(text_field(obj, &["game"]), GENERIC_GAME),
        character: normalize_name(text_field(obj, &["character"]), GENERIC_CHARACTER),
        gender: text_field(obj, &["gender", "sex"])
            .map(Gender::from_label)
            .unwrap_or_default(),
        message: message.to_string(),
        requires_vision: ["requires_vision", "requiresVision", "vision"]
            .iter()
            .find_map(|key| obj.get(*key))
            .map(truthy)
            .unwrap_or(false),
    })
}

fn text_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| obj.get(*key))
        .and_then(Value::as_str)
}

fn normalize_name(value: Option<&str>, sentinel: &str) -> String {
    let trimmed = value.map(str::trim).unwrap_or("");
    let lowered = trimmed.to_ascii_lowercase();
    if UNKNOWN_MARKERS.contains(&lowered.as_str()) || lowered == sentinel.to_ascii_lowercase() {
        sentinel.to_string()
    } else {
        trimmed.to_string()
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}
