//! Command loop: read a command, run its tool calls, write the replies.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use loremaster_chat::{ConversationContext, DispatchEngine};

use crate::framing::{FramedTransport, Inbound};
use crate::protocol::{tool_calls, Command};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The host sent `shutdown`.
    Shutdown,
    /// The host closed the pipe.
    Closed,
}

/// Serves commands from one host connection until shutdown or EOF.
pub struct CommandLoop<R, W> {
    transport: FramedTransport<R, W>,
    engine: DispatchEngine,
    context: ConversationContext,
}

impl<R, W> CommandLoop<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        transport: FramedTransport<R, W>,
        engine: DispatchEngine,
        context: ConversationContext,
    ) -> Self {
        Self {
            transport,
            engine,
            context,
        }
    }

    pub async fn run(&mut self) -> LoopExit {
        info!("Command loop started");
        loop {
            let envelope = match self.transport.read_command().await {
                Inbound::Command(envelope) => envelope,
                Inbound::Skipped => continue,
                Inbound::Closed => return LoopExit::Closed,
            };

            let request_id = Uuid::new_v4();
            let span = info_span!("command", %request_id);
            if self.handle_envelope(&envelope).instrument(span).await == Some(LoopExit::Shutdown) {
                return LoopExit::Shutdown;
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: &serde_json::Value) -> Option<LoopExit> {
        let calls = tool_calls(envelope);
        if calls.is_empty() {
            warn!(command = %envelope, "Command has no tool_calls");
            return None;
        }

        for call in calls {
            match call.command() {
                Command::Talk { input } => {
                    let response = self.engine.handle_talk(&mut self.context, &input).await;
                    self.transport.write_response(&response).await;
                }
                Command::Initialize => {
                    let response = self.engine.initialize();
                    self.transport.write_response(&response).await;
                }
                Command::Shutdown => {
                    info!("Shutdown command received");
                    return Some(LoopExit::Shutdown);
                }
                Command::Unknown(func) => {
                    warn!(func = %func, "Unknown function");
                }
            }
        }
        None
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn into_parts(self) -> (FramedTransport<R, W>, DispatchEngine, ConversationContext) {
        (self.transport, self.engine, self.context)
    }
}
