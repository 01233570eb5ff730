//! Speech dispatcher.
//!
//! Replies are queued on an unbounded channel and spoken one at a time, in
//! order, by a dedicated worker thread, so the command loop never waits on
//! playback.

use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use loremaster_core::SpeechRequest;
use loremaster_speech::{SpeechEngine, Voice};

use crate::error::ChatError;

const WORKER_NAME: &str = "speech-worker";

/// Handle to the speech worker.
pub struct SpeechDispatcher {
    sender: Option<UnboundedSender<SpeechRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl SpeechDispatcher {
    /// Start a worker that owns `engine`.
    pub fn spawn<E>(engine: E) -> Result<Self, ChatError>
    where
        E: SpeechEngine + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = std::thread::Builder::new()
            .name(WORKER_NAME.to_owned())
            .spawn(move || run_worker(engine, receiver))
            .map_err(|e| ChatError::VoiceError(format!("failed to spawn speech worker: {e}")))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Dispatcher that accepts requests and drops them.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            worker: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue `text` for playback. Never blocks.
    pub fn enqueue(&self, text: &str, female: bool) -> Result<(), ChatError> {
        let Some(sender) = &self.sender else {
            debug!("Speech disabled, dropping reply");
            return Ok(());
        };
        sender
            .send(SpeechRequest {
                text: text.to_string(),
                female,
            })
            .map_err(|_| ChatError::SpeechQueueClosed)
    }

    /// Close the queue and wait until everything queued has been spoken.
    pub fn drain(mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Speech worker panicked");
            }
        }
    }
}

/// First voice matching the requested gender, in engine order.
///
/// Female: name contains "female", or id contains "zira" or "eva".
/// Male: name contains "male" but not "female", or id contains "david" or
/// "mark".
pub fn select_voice(voices: &[Voice], female: bool) -> Option<&Voice> {
    voices.iter().find(|voice| {
        let name = voice.name.to_lowercase();
        let id = voice.id.to_lowercase();
        if female {
            name.contains("female") || id.contains("zira") || id.contains("eva")
        } else {
            (name.contains("male") && !name.contains("female"))
                || id.contains("david")
                || id.contains("mark")
        }
    })
}

fn run_worker<E: SpeechEngine>(mut engine: E, mut receiver: UnboundedReceiver<SpeechRequest>) {
    let voices = engine.voices().unwrap_or_else(|e| {
        warn!(error = %e, "Could not list voices, using engine default");
        Vec::new()
    });
    info!(voices = voices.len(), "Speech worker started");

    while let Some(request) = receiver.blocking_recv() {
        let voice = select_voice(&voices, request.female);
        match voice {
            Some(v) => info!(
                female = request.female,
                voice_name = %v.name,
                voice_id = %v.id,
                "Voice selected"
            ),
            None => info!(
                female = request.female,
                "No matching voice found, using default"
            ),
        }

        debug!(text = %request.text, "Speaking");
        if let Err(e) = engine.speak(&request.text, voice) {
            error!(error = %e, "Speech playback failed");
        }
    }

    info!("Speech worker stopped");
}
