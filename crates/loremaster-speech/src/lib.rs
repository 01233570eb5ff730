//! LoreMaster Speech crate - spoken replies.
//!
//! [`SpeechEngine`] is the blocking synthesizer interface the speech worker
//! drives. [`SystemSpeechEngine`] talks to the operating system's
//! synthesizer; [`MockSpeechEngine`] records what it was asked to say.

pub mod system;

use std::sync::{Arc, Mutex};

use loremaster_core::error::{LoreError, Result};

pub use system::SystemSpeechEngine;

/// An installed synthesizer voice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Voice {
    /// Engine-specific identifier used to select the voice.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

impl Voice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Blocking text-to-speech engine.
///
/// Calls block until playback finishes, so an engine is owned by a single
/// worker thread.
pub trait SpeechEngine: Send {
    /// Installed voices.
    fn voices(&mut self) -> Result<Vec<Voice>>;

    /// Speak `text`, using `voice` when given or the engine default.
    fn speak(&mut self, text: &str, voice: Option<&Voice>) -> Result<()>;
}

/// One utterance recorded by [`MockSpeechEngine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpokenLine {
    pub text: String,
    pub voice_id: Option<String>,
}

/// Mock engine for testing.
///
/// Clones share the same log, so a test can keep one clone while another is
/// moved into a worker.
#[derive(Clone, Debug, Default)]
pub struct MockSpeechEngine {
    voices: Vec<Voice>,
    fail_speak: bool,
    spoken: Arc<Mutex<Vec<SpokenLine>>>,
}

impl MockSpeechEngine {
    /// Mock with no installed voices.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voices(voices: Vec<Voice>) -> Self {
        Self {
            voices,
            ..Self::default()
        }
    }

    /// Mock whose `speak` always fails.
    pub fn failing() -> Self {
        Self {
            fail_speak: true,
            ..Self::default()
        }
    }

    /// Everything spoken so far, in order.
    pub fn spoken(&self) -> Vec<SpokenLine> {
        self.spoken
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SpeechEngine for MockSpeechEngine {
    fn voices(&mut self) -> Result<Vec<Voice>> {
        Ok(self.voices.clone())
    }

    fn speak(&mut self, text: &str, voice: Option<&Voice>) -> Result<()> {
        if self.fail_speak {
            return Err(LoreError::Speech("mock engine failure".to_string()));
        }
        self.spoken
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SpokenLine {
                text: text.to_string(),
                voice_id: voice.map(|v| v.id.clone()),
            });
        Ok(())
    }
}
