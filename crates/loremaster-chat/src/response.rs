//! Persona system prompts.

use loremaster_core::PersonaKey;

const BEHAVIOR_RULES: &str = "\
Respond fully in character and keep the tone natural, using knowledge and voice appropriate to the character.
If the user asks for a specific fact or game-related detail (such as item locations, codes, puzzle solutions, or mechanics), always give the exact, correct answer as clearly as possible.
If the user is asking for a lore opinion, emotional reflection, or casual dialogue, stay immersive and in character.
Keep responses concise (2-4 sentences), but prioritize clarity and usefulness when giving game-related answers.";

const VISION_RULES: &str = "\
The attached image is a screenshot of what the user is looking at right now.
Base your answer on what is actually visible in it; if the thing asked about is not visible, say so in character rather than guessing.
Refer to on-screen elements the way your character would, without mentioning screenshots or images.";

/// `You are <character> from <game>.` plus the style line, if any.
pub fn identity_line(key: &PersonaKey, style: Option<&str>) -> String {
    match style {
        Some(style) => format!(
            "You are {} from {}. Speak in a {} style.",
            key.character, key.game, style
        ),
        None => format!("You are {} from {}.", key.character, key.game),
    }
}

/// System prompt for the text path.
pub fn persona_prompt(key: &PersonaKey, style: Option<&str>) -> String {
    format!("{}\n{}", identity_line(key, style), BEHAVIOR_RULES)
}

/// System prompt for the vision path: persona rules plus screenshot rules.
pub fn vision_prompt(key: &PersonaKey, style: Option<&str>) -> String {
    format!("{}\n{}", persona_prompt(key, style), VISION_RULES)
}
