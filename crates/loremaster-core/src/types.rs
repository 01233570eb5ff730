use std::fmt;

use serde::{Deserialize, Serialize};

/// Character name used when the utterance does not name anyone.
pub const GENERIC_CHARACTER: &str = "Character";

/// Game name used when the utterance does not name a game or setting.
pub const GENERIC_GAME: &str = "Game";

// =============================================================================
// Enums
// =============================================================================

/// Voice gender of a persona.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Canonical default when the parser cannot tell.
    #[default]
    Male,
    Female,
}

impl Gender {
    /// Interpret a free-form gender label from model output.
    ///
    /// Anything starting with `f` or `w` ("female", "woman") is female;
    /// everything else, including empty input, is the default.
    pub fn from_label(label: &str) -> Self {
        match label.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('f') | Some('w') => Gender::Female,
            _ => Gender::default(),
        }
    }

    pub fn is_female(self) -> bool {
        self == Gender::Female
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// =============================================================================
// Intent
// =============================================================================

/// Structured reading of one user utterance.
///
/// Always fully populated: unknown characters and games carry the
/// [`GENERIC_CHARACTER`] / [`GENERIC_GAME`] sentinels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub game: String,
    pub character: String,
    pub gender: Gender,
    pub message: String,
    pub requires_vision: bool,
}

impl Intent {
    /// Intent that addresses nobody in particular.
    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            game: GENERIC_GAME.to_string(),
            character: GENERIC_CHARACTER.to_string(),
            gender: Gender::default(),
            message: message.into(),
            requires_vision: false,
        }
    }

    pub fn has_generic_character(&self) -> bool {
        self.character == GENERIC_CHARACTER
    }

    pub fn has_generic_game(&self) -> bool {
        self.game == GENERIC_GAME
    }
}

// =============================================================================
// Persona
// =============================================================================

/// Identity of a dialogue persona: which character, from which game.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonaKey {
    pub character: String,
    pub game: String,
}

impl PersonaKey {
    pub fn new(character: impl Into<String>, game: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            game: game.into(),
        }
    }

    /// The generic assistant persona.
    pub fn generic() -> Self {
        Self::new(GENERIC_CHARACTER, GENERIC_GAME)
    }

    pub fn is_generic(&self) -> bool {
        self.character == GENERIC_CHARACTER && self.game == GENERIC_GAME
    }
}

impl fmt::Display for PersonaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.character, self.game)
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// One immutable message in a persona's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Length in characters (not bytes), the unit of the token estimate.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

// =============================================================================
// Speech
// =============================================================================

/// A reply waiting to be spoken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub female: bool,
}

// =============================================================================
// Protocol replies
// =============================================================================

/// Reply body written back to the host for `talk` and `initialize`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkResponse {
    pub success: bool,
    pub message: String,
}

impl TalkResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
