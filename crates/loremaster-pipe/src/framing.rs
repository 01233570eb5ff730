//! Framed transport over the host pipe.
//!
//! Inbound: the host writes one message at a time. It is read in fixed-size
//! chunks and a chunk shorter than the chunk size ends the message. The
//! first balanced `{...}` in the decoded text is the command.
//!
//! Outbound: JSON text followed by [`FRAME_TERMINATOR`], in a single write.
//!
//! A failing reader is retried with a growing pause between attempts, reset
//! by the next successful read.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use loremaster_core::error::{LoreError, Result};
use loremaster_core::first_balanced_object;

/// Marks the end of every outbound message.
pub const FRAME_TERMINATOR: &str = "<<END>>";

const READ_RETRY_BASE: Duration = Duration::from_millis(10);
const READ_RETRY_MAX: Duration = Duration::from_secs(1);

/// Outcome of one inbound read.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A parsed command object.
    Command(Value),
    /// Nothing usable was read; the caller should read again.
    Skipped,
    /// The host closed the pipe.
    Closed,
}

pub struct FramedTransport<R, W> {
    reader: R,
    writer: W,
    chunk_size: usize,
    /// Consecutive failed reads.
    read_errors: u32,
}

impl<R, W> FramedTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, chunk_size: usize) -> Self {
        Self {
            reader,
            writer,
            chunk_size: chunk_size.max(1),
            read_errors: 0,
        }
    }

    /// Read one message and extract its command object.
    pub async fn read_command(&mut self) -> Inbound {
        let bytes = match self.read_message().await {
            Ok(bytes) => {
                self.read_errors = 0;
                bytes
            }
            Err(e) => {
                self.read_errors = self.read_errors.saturating_add(1);
                let pause = read_retry_delay(self.read_errors);
                error!(
                    error = %e,
                    consecutive = self.read_errors,
                    retry_in_ms = pause.as_millis() as u64,
                    "Error reading from pipe"
                );
                tokio::time::sleep(pause).await;
                return Inbound::Skipped;
            }
        };

        if bytes.is_empty() {
            info!("Pipe closed by host");
            return Inbound::Closed;
        }

        let text = String::from_utf8_lossy(&bytes);
        info!(raw = %text, bytes = bytes.len(), "Received raw input");

        let Some(span) = first_balanced_object(&text) else {
            warn!(raw = %text, "No JSON object found in input");
            return Inbound::Skipped;
        };
        debug!(extracted = %span, "Extracted JSON object");

        match serde_json::from_str(span) {
            Ok(value) => Inbound::Command(value),
            Err(e) => {
                warn!(error = %e, extracted = %span, "Failed to parse command JSON");
                Inbound::Skipped
            }
        }
    }

    /// Read chunks until one comes back short. Empty means EOF.
    async fn read_message(&mut self) -> Result<Vec<u8>> {
        let mut message = Vec::new();
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let n = self
                .reader
                .read(&mut chunk)
                .await
                .map_err(|e| LoreError::Transport(format!("read failed: {}", e)))?;
            message.extend_from_slice(&chunk[..n]);
            if n < self.chunk_size {
                return Ok(message);
            }
        }
    }

    /// Serialize `response`, append the terminator and write it in one call.
    ///
    /// Failures are logged, never returned.
    pub async fn write_response<T: Serialize>(&mut self, response: &T) {
        let mut frame = match serde_json::to_string(response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize response");
                return;
            }
        };
        frame.push_str(FRAME_TERMINATOR);

        if let Err(e) = self.write_frame(frame.as_bytes()).await {
            error!(error = %e, "Error writing response");
            return;
        }
        debug!(frame = %frame, "Response written");
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.writer
            .write_all(frame)
            .await
            .map_err(|e| LoreError::Transport(format!("write failed: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| LoreError::Transport(format!("flush failed: {}", e)))
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// Pause after the `errors`-th consecutive read failure: doubles from
/// [`READ_RETRY_BASE`] up to [`READ_RETRY_MAX`].
fn read_retry_delay(errors: u32) -> Duration {
    let doublings = errors.saturating_sub(1).min(16);
    READ_RETRY_BASE
        .saturating_mul(1u32 << doublings)
        .min(READ_RETRY_MAX)
}
