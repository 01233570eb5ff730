//! Host-facing side of LoreMaster: the framed pipe transport, the
//! `tool_calls` envelope and the command loop.

pub mod framing;
pub mod protocol;
pub mod server;

pub use framing::{FramedTransport, Inbound, FRAME_TERMINATOR};
pub use protocol::{talk_input, tool_calls, Command, ToolCall};
pub use server::{CommandLoop, LoopExit};
