//! Stateful parser assembling protocol frames from transport lines.
//!
//! The transport is SSE-shaped: `data:` lines carry payloads, `:`-prefixed
//! comment lines are keep-alives, and a blank line ends one frame. The
//! literal `data: [DONE]` closes the sequence.

use crate::error::FrameParseError;

use super::frame::{RelayEvent, StreamFrame, DONE_SENTINEL};

/// A single classified transport line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// Payload line (`data: ...`)
    Data(String),
    /// Comment/keep-alive line (starts with ':')
    Comment(String),
    /// Blank line, signalling end of frame
    Empty,
}

/// Classify one transport line.
pub fn parse_stream_line(line: &str) -> StreamLine {
    if line.is_empty() {
        return StreamLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return StreamLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        return StreamLine::Data(rest.trim().to_string());
    }

    // Unknown line format - treat as comment for resilience
    StreamLine::Comment(line.to_string())
}

/// Accumulates `data:` lines and emits complete frames.
#[derive(Debug, Default)]
pub struct FrameParser {
    /// Accumulated data lines (the framing allows several per frame)
    data_buffer: Vec<String>,
    /// Set once the termination sentinel was seen
    done: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a line to the parser, potentially completing an event.
    ///
    /// Returns:
    /// - `Ok(Some(event))` - a complete frame (or the end sentinel)
    /// - `Ok(None)` - line consumed, frame incomplete
    /// - `Err(error)` - the payload did not parse
    pub fn feed_line(&mut self, line: &str) -> Result<Option<RelayEvent>, FrameParseError> {
        if self.done {
            return Ok(None);
        }

        match parse_stream_line(line) {
            StreamLine::Data(data) if data == DONE_SENTINEL => {
                self.done = true;
                self.data_buffer.clear();
                Ok(Some(RelayEvent::Done))
            }
            StreamLine::Data(data) => {
                self.data_buffer.push(data);
                Ok(None)
            }
            StreamLine::Empty => self.try_emit(),
            StreamLine::Comment(_) => Ok(None),
        }
    }

    /// Flush a trailing frame when the transport closed without a final
    /// blank line.
    pub fn finish(&mut self) -> Result<Option<RelayEvent>, FrameParseError> {
        if self.done {
            return Ok(None);
        }
        self.try_emit()
    }

    /// Whether the termination sentinel was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Reset parser state for reuse.
    pub fn reset(&mut self) {
        self.data_buffer.clear();
        self.done = false;
    }

    fn try_emit(&mut self) -> Result<Option<RelayEvent>, FrameParseError> {
        if self.data_buffer.is_empty() {
            return Ok(None);
        }

        let data = self.data_buffer.join("\n");
        self.data_buffer.clear();

        match serde_json::from_str::<StreamFrame>(&data) {
            Ok(frame) => Ok(Some(RelayEvent::Frame(frame))),
            Err(err) => Err(FrameParseError::InvalidJson {
                detail: err.to_string(),
            }),
        }
    }
}
