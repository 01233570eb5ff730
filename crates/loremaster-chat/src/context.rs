//! Conversation context management.
//!
//! Keeps one history per persona, with exactly one of them current, bounds
//! each history by a token estimate, and resolves which persona an
//! utterance is addressed to.

use std::collections::HashMap;

use tracing::{debug, info};

use loremaster_core::config::ContextConfig;
use loremaster_core::{ConversationTurn, Gender, Intent, PersonaKey, Role};

use crate::error::ChatError;

// =============================================================================
// PersonaContextStore
// =============================================================================

/// Per-persona conversation histories.
///
/// The current history lives outside the map while active. Switching
/// persists it under its key and loads (or creates) the incoming one.
#[derive(Debug)]
pub struct PersonaContextStore {
    current_key: Option<PersonaKey>,
    current: Vec<ConversationTurn>,
    stored: HashMap<PersonaKey, Vec<ConversationTurn>>,
    /// History is halved when `chars / 4` exceeds this.
    token_ceiling: usize,
}

impl PersonaContextStore {
    pub fn new(token_ceiling: usize) -> Self {
        Self {
            current_key: None,
            current: Vec::new(),
            stored: HashMap::new(),
            token_ceiling,
        }
    }

    pub fn current_key(&self) -> Option<&PersonaKey> {
        self.current_key.as_ref()
    }

    /// The current history, oldest first.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.current
    }

    /// History stored for `key`, current or not.
    pub fn history_for(&self, key: &PersonaKey) -> Option<&[ConversationTurn]> {
        if self.current_key.as_ref() == Some(key) {
            Some(&self.current)
        } else {
            self.stored.get(key).map(Vec::as_slice)
        }
    }

    /// Make `key` the current persona. Returns `false` if it already was.
    pub fn switch_context(&mut self, key: &PersonaKey) -> bool {
        if self.current_key.as_ref() == Some(key) {
            return false;
        }

        let from = self.current_key_label();
        let incoming = self.stored.remove(key).unwrap_or_default();
        let outgoing = std::mem::replace(&mut self.current, incoming);
        if let Some(previous) = self.current_key.take() {
            self.stored.insert(previous, outgoing);
        }
        self.current_key = Some(key.clone());

        info!(
            from = %from,
            to = %key,
            restored_turns = self.current.len(),
            "Context switched"
        );
        true
    }

    /// Append a turn to the current history, then enforce the token budget.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.current.push(ConversationTurn::new(role, content));
        self.enforce_budget();
    }

    /// System prompt followed by the last `window` turns of the current
    /// history.
    pub fn windowed_messages(&self, system_prompt: &str, window: usize) -> Vec<ConversationTurn> {
        let start = self.current.len().saturating_sub(window);
        let mut messages = Vec::with_capacity(self.current.len() - start + 1);
        messages.push(ConversationTurn::system(system_prompt));
        messages.extend_from_slice(&self.current[start..]);
        messages
    }

    /// Total characters in the current history divided by 4.
    pub fn token_estimate(&self) -> usize {
        self.current.iter().map(ConversationTurn::char_len).sum::<usize>() / 4
    }

    /// Keep the most recent half (rounded down) when over budget.
    ///
    /// Runs once per append, so one call never halves more than once.
    fn enforce_budget(&mut self) {
        let estimate = self.token_estimate();
        debug!(tokens = estimate, ceiling = self.token_ceiling, "Estimated context tokens");
        if estimate <= self.token_ceiling {
            return;
        }

        let before = self.current.len();
        let keep = before / 2;
        self.current.drain(..before - keep);
        info!(
            persona = %self.current_key_label(),
            tokens = estimate,
            ceiling = self.token_ceiling,
            before,
            after = keep,
            "Context limit exceeded, history halved"
        );
    }

    fn current_key_label(&self) -> String {
        self.current_key
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "none".to_string())
    }
}

// =============================================================================
// Persona resolution
// =============================================================================

/// The persona currently being addressed and the last gender used for it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActivePersonaState {
    pub key: Option<PersonaKey>,
    pub last_gender: Option<Gender>,
}

/// Reconcile a parsed intent with the active persona.
///
/// | character | game     | active | result                                 |
/// |-----------|----------|--------|----------------------------------------|
/// | generic   | generic  | k      | k, last known gender                   |
/// | generic   | generic  | none   | generic persona                        |
/// | generic   | specific | k      | character from k, game from intent     |
/// | specific  | generic  | k      | game from k, character from intent     |
/// | specific  | specific | any    | intent's key                           |
///
/// Other combinations take the intent's key as-is. The last known gender
/// carries over whenever the character comes from the active persona.
pub fn resolve_persona(intent: &Intent, active: &ActivePersonaState) -> (PersonaKey, Gender) {
    let Some(current) = active.key.as_ref() else {
        return (
            PersonaKey::new(&intent.character, &intent.game),
            intent.gender,
        );
    };

    let carried_gender = active.last_gender.unwrap_or(intent.gender);
    match (intent.has_generic_character(), intent.has_generic_game()) {
        (true, true) => (current.clone(), carried_gender),
        (true, false) => (
            PersonaKey::new(&current.character, &intent.game),
            carried_gender,
        ),
        (false, true) => (
            PersonaKey::new(&intent.character, &current.game),
            intent.gender,
        ),
        (false, false) => (
            PersonaKey::new(&intent.character, &intent.game),
            intent.gender,
        ),
    }
}

// =============================================================================
// ConversationContext
// =============================================================================

/// All mutable dialogue state, owned by the command loop and passed into
/// each request.
#[derive(Debug)]
pub struct ConversationContext {
    pub store: PersonaContextStore,
    pub active: ActivePersonaState,
    /// Set by `set style <style>`; shapes every persona prompt.
    pub style: Option<String>,
    /// Turns sent with each model call.
    pub window_size: usize,
}

impl ConversationContext {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            store: PersonaContextStore::new(config.token_ceiling),
            active: ActivePersonaState::default(),
            style: None,
            window_size: config.window_size,
        }
    }

    /// Switch the store to `key` and record it as active.
    pub fn activate(&mut self, key: PersonaKey, gender: Gender) {
        self.store.switch_context(&key);
        self.active.key = Some(key);
        self.active.last_gender = Some(gender);
    }

    pub fn active_key(&self) -> Result<&PersonaKey, ChatError> {
        self.active.key.as_ref().ok_or(ChatError::NoActivePersona)
    }

    /// Set the conversation style. An empty style clears it.
    pub fn set_style(&mut self, style: &str) {
        let style = style.trim();
        self.style = (!style.is_empty()).then(|| style.to_string());
        info!(style = ?self.style, "Conversation style updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loremaster_core::{GENERIC_CHARACTER, GENERIC_GAME};

    fn zeus() -> PersonaKey {
        PersonaKey::new("Zeus", "Greek Mythology")
    }

    fn intent(character: &str, game: &str, gender: Gender) -> Intent {
        Intent {
            game: game.to_string(),
            character: character.to_string(),
            gender,
            message: "hello".to_string(),
            requires_vision: false,
        }
    }

    fn active(key: PersonaKey, gender: Gender) -> ActivePersonaState {
        ActivePersonaState {
            key: Some(key),
            last_gender: Some(gender),
        }
    }

    // -----------------------------------------------------------------
    // Store
    // -----------------------------------------------------------------

    #[test]
    fn test_switch_persists_and_restores_history() {
        let mut store = PersonaContextStore::new(12_000);
        let hera = PersonaKey::new("Hera", "Greek Mythology");

        assert!(store.switch_context(&zeus()));
        store.append(Role::User, "thunder?");
        store.append(Role::Assistant, "mine.");

        assert!(store.switch_context(&hera));
        assert!(store.history().is_empty());
        store.append(Role::User, "hi");

        assert!(store.switch_context(&zeus()));
        assert_eq!(
            store.history(),
            &[
                ConversationTurn::user("thunder?"),
                ConversationTurn::assistant("mine.")
            ]
        );
        assert_eq!(store.history_for(&hera).unwrap().len(), 1);
    }

    #[test]
    fn test_switch_to_same_key_is_noop() {
        let mut store = PersonaContextStore::new(12_000);
        store.switch_context(&zeus());
        store.append(Role::User, "one");
        assert!(!store.switch_context(&zeus()));
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_windowed_messages_bounded() {
        let mut store = PersonaContextStore::new(12_000);
        store.switch_context(&zeus());
        for i in 0..25 {
            store.append(Role::User, format!("turn {i}"));
        }

        let messages = store.windowed_messages("You are Zeus.", 10);
        assert_eq!(messages.len(), 11);
        assert_eq!(messages[0], ConversationTurn::system("You are Zeus."));
        assert_eq!(messages[1].content, "turn 15");
        assert_eq!(messages[10].content, "turn 24");
    }

    #[test]
    fn test_windowed_messages_short_history() {
        let mut store = PersonaContextStore::new(12_000);
        store.switch_context(&zeus());
        store.append(Role::User, "only");
        let messages = store.windowed_messages("sys", 10);
        assert_eq!(messages.len(), 2);
        assert_eq!(store.windowed_messages("sys", 0).len(), 1);
    }

    #[test]
    fn test_eviction_keeps_most_recent_half() {
        // ceiling 10 tokens = 40 chars; each turn is 8 chars.
        let mut store = PersonaContextStore::new(10);
        store.switch_context(&zeus());
        for i in 0..5 {
            store.append(Role::User, format!("turn-{i:03}"));
        }
        assert_eq!(store.history().len(), 5);
        assert_eq!(store.token_estimate(), 10);

        // 6 turns = 48 chars = 12 tokens > 10: keep 3.
        store.append(Role::Assistant, "turn-005");
        let kept: Vec<&str> = store.history().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(kept, vec!["turn-003", "turn-004", "turn-005"]);
    }

    #[test]
    fn test_eviction_halves_odd_length_rounding_down() {
        let mut store = PersonaContextStore::new(1);
        store.switch_context(&zeus());
        store.append(Role::User, "abc");
        store.append(Role::User, "def");
        // 6 chars = 1 token, within budget.
        assert_eq!(store.history().len(), 2);
        // 9 chars = 2 tokens > 1: 3 turns keep 1.
        store.append(Role::User, "ghi");
        assert_eq!(store.history(), &[ConversationTurn::user("ghi")]);
    }

    #[test]
    fn test_single_oversized_turn_is_evicted() {
        let mut store = PersonaContextStore::new(2);
        store.switch_context(&zeus());
        store.append(Role::User, "x".repeat(100));
        assert!(store.history().is_empty());
        assert_eq!(store.windowed_messages("sys", 10).len(), 1);
    }

    #[test]
    fn test_eviction_only_touches_current_history() {
        let mut store = PersonaContextStore::new(5);
        let hera = PersonaKey::new("Hera", "Greek Mythology");
        store.switch_context(&hera);
        store.append(Role::User, "0123456789");
        store.switch_context(&zeus());
        store.append(Role::User, "x".repeat(40));
        assert_eq!(store.history_for(&hera).unwrap().len(), 1);
    }

    // -----------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------

    #[test]
    fn test_generic_intent_keeps_active_persona() {
        let state = active(zeus(), Gender::Male);
        let (key, gender) = resolve_persona(
            &intent(GENERIC_CHARACTER, GENERIC_GAME, Gender::Female),
            &state,
        );
        assert_eq!(key, zeus());
        assert_eq!(gender, Gender::Male);
    }

    #[test]
    fn test_generic_intent_without_active_is_generic_persona() {
        let (key, gender) = resolve_persona(
            &intent(GENERIC_CHARACTER, GENERIC_GAME, Gender::Male),
            &ActivePersonaState::default(),
        );
        assert!(key.is_generic());
        assert_eq!(gender, Gender::Male);
    }

    #[test]
    fn test_specific_game_takes_character_from_active() {
        let state = active(zeus(), Gender::Male);
        let (key, gender) =
            resolve_persona(&intent(GENERIC_CHARACTER, "Hades", Gender::Female), &state);
        assert_eq!(key, PersonaKey::new("Zeus", "Hades"));
        assert_eq!(gender, Gender::Male);
    }

    #[test]
    fn test_specific_character_takes_game_from_active() {
        let state = active(zeus(), Gender::Male);
        let (key, gender) =
            resolve_persona(&intent("Hera", GENERIC_GAME, Gender::Female), &state);
        assert_eq!(key, PersonaKey::new("Hera", "Greek Mythology"));
        assert_eq!(gender, Gender::Female);
    }

    #[test]
    fn test_fully_specific_intent_always_switches() {
        let target = PersonaKey::new("Navi", "Ocarina of Time");
        for state in [ActivePersonaState::default(), active(zeus(), Gender::Male)] {
            let (key, gender) =
                resolve_persona(&intent("Navi", "Ocarina of Time", Gender::Female), &state);
            assert_eq!(key, target);
            assert_eq!(gender, Gender::Female);
        }
    }

    #[test]
    fn test_partial_intent_without_active_uses_intent_as_is() {
        let (key, _) = resolve_persona(
            &intent("Hera", GENERIC_GAME, Gender::Female),
            &ActivePersonaState::default(),
        );
        assert_eq!(key, PersonaKey::new("Hera", GENERIC_GAME));
    }

    // -----------------------------------------------------------------
    // ConversationContext
    // -----------------------------------------------------------------

    #[test]
    fn test_activate_updates_store_and_state() {
        let mut ctx = ConversationContext::new(&ContextConfig::default());
        assert!(matches!(ctx.active_key(), Err(ChatError::NoActivePersona)));

        ctx.activate(zeus(), Gender::Male);
        assert_eq!(ctx.active_key().unwrap(), &zeus());
        assert_eq!(ctx.store.current_key(), Some(&zeus()));
        assert_eq!(ctx.active.last_gender, Some(Gender::Male));
        assert_eq!(ctx.window_size, 10);
    }

    #[test]
    fn test_set_and_clear_style() {
        let mut ctx = ConversationContext::new(&ContextConfig::default());
        ctx.set_style(" pirate ");
        assert_eq!(ctx.style.as_deref(), Some("pirate"));
        ctx.set_style("");
        assert_eq!(ctx.style, None);
    }
}
