//! LoreMaster Capture crate - screenshots for vision questions.
//!
//! Provides the [`ScreenCapturer`] trait the chat engine calls when a
//! question needs the screen, a [`MockCaptureService`] for tests, and a
//! [`DesktopCapturer`] that grabs a monitor and encodes it for upload.

pub mod desktop;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use loremaster_core::error::{LoreError, Result};

pub use desktop::{encode_frame, DesktopCapturer};

/// Source of encoded screenshots (JPEG or PNG bytes).
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    /// Capture the configured monitor.
    async fn capture_screen(&self) -> Result<Vec<u8>>;
}

/// Mock capturer for testing.
///
/// Returns a fixed byte payload, or a fixed error, and counts calls.
#[derive(Debug, Default)]
pub struct MockCaptureService {
    image: Vec<u8>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockCaptureService {
    /// Mock returning a tiny JPEG-looking payload.
    pub fn new() -> Self {
        Self::with_image(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
    }

    pub fn with_image(image: Vec<u8>) -> Self {
        Self {
            image,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Mock whose every capture fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            image: Vec::new(),
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of captures requested so far.
    pub fn capture_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenCapturer for MockCaptureService {
    async fn capture_screen(&self) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(LoreError::Capture(message.clone())),
            None => Ok(self.image.clone()),
        }
    }
}
