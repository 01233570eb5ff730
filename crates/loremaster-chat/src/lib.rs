//! Conversational engine for LoreMaster.
//!
//! Parses utterances into intents, keeps one conversation history per
//! persona, routes each turn to the text or vision model, and queues
//! replies for speech.

pub mod context;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod parser;
pub mod response;
pub mod voice;

pub use context::{resolve_persona, ActivePersonaState, ConversationContext, PersonaContextStore};
pub use error::ChatError;
pub use orchestrator::{DispatchEngine, FAILURE_MESSAGE, INITIALIZED_MESSAGE};
pub use parser::{style_command, IntentParser};
pub use voice::{select_voice, SpeechDispatcher};
