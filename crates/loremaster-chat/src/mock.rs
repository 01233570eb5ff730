//! Scripted model for tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use loremaster_core::ConversationTurn;
use loremaster_llm::{LlmError, TextGenerator, VisionGenerator};

/// Text and vision generator that replays queued replies in order.
///
/// Every request is recorded. A vision request is recorded as a system turn
/// (the prompt) followed by a user turn (the query). An exhausted script
/// answers with [`LlmError::EmptyResponse`].
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<Vec<ConversationTurn>>>,
    images: Mutex<Vec<Vec<u8>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: &[&str]) -> Self {
        let generator = Self::new();
        for reply in replies {
            generator.push_reply(reply);
        }
        generator
    }

    pub fn push_reply(&self, reply: &str) {
        lock(&self.replies).push_back(Ok(reply.to_string()));
    }

    /// Queue a failed request.
    pub fn push_error(&self, message: &str) {
        lock(&self.replies).push_back(Err(message.to_string()));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Vec<ConversationTurn>> {
        lock(&self.requests).clone()
    }

    /// Images passed to vision requests, in order.
    pub fn images(&self) -> Vec<Vec<u8>> {
        lock(&self.images).clone()
    }

    fn next_reply(&self) -> Result<String, LlmError> {
        match lock(&self.replies).pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(LlmError::Request(message)),
            None => Err(LlmError::EmptyResponse),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, messages: &[ConversationTurn]) -> Result<String, LlmError> {
        lock(&self.requests).push(messages.to_vec());
        self.next_reply()
    }
}

#[async_trait]
impl VisionGenerator for ScriptedGenerator {
    async fn describe(
        &self,
        system_prompt: &str,
        query: &str,
        image: &[u8],
    ) -> Result<String, LlmError> {
        lock(&self.requests).push(vec![
            ConversationTurn::system(system_prompt),
            ConversationTurn::user(query),
        ]);
        lock(&self.images).push(image.to_vec());
        self.next_reply()
    }
}
