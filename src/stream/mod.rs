//! Streaming event relay.
//!
//! Decodes the agent backend's chunked turn protocol into typed frames
//! and assembles them into the visible message timeline.

mod assembler;
mod frame;
mod parser;
mod relay;

pub use assembler::StreamSession;
pub use frame::{ErrorContent, RelayEvent, StreamFrame, ToolCallFrame, ToolResultFrame, DONE_SENTINEL};
pub use parser::{parse_stream_line, FrameParser, StreamLine};
pub use relay::AgentClient;
