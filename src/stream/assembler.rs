//! Per-turn message assembly.
//!
//! A [`StreamSession`] holds one agent turn's decoding state and applies
//! relay events to the cache's timeline for its thread. The session
//! addresses the thread through the cache's provisional-id redirect, so a
//! turn that started against an unconfirmed thread keeps landing on the
//! right timeline after confirmation.

use crate::cache::ThreadCache;
use crate::models::{
    ChatMessage, MessageRole, TimelineItem, TimelineMessage, ToolMessage,
};

use super::frame::{ErrorContent, RelayEvent, StreamFrame, ToolCallFrame, ToolResultFrame};

/// One agent turn's decoding state.
///
/// Created when the user message is appended; dropped once the stream
/// terminates via the sentinel or a terminal error.
#[derive(Debug)]
pub struct StreamSession {
    thread_id: String,
    /// Id of the placeholder entry tokens accumulate into
    provisional_message_id: Option<String>,
    finished: bool,
    errored: bool,
}

impl StreamSession {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            provisional_message_id: None,
            finished: false,
            errored: false,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Whether the turn has ended (sentinel or terminal error).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the turn ended with a terminal error.
    pub fn is_errored(&self) -> bool {
        self.errored
    }

    /// Apply one relay event to the timeline. Events arriving after the
    /// turn ended are dropped.
    pub fn apply(&mut self, cache: &mut ThreadCache, event: RelayEvent) {
        if self.finished {
            tracing::debug!(thread_id = %self.thread_id, "event after turn end dropped");
            return;
        }
        match event {
            RelayEvent::Done => self.finish(cache),
            RelayEvent::Frame(frame) => self.apply_frame(cache, frame),
        }
    }

    /// End the turn: settle the placeholder on whatever accumulated and
    /// clear the thread's running flag.
    pub fn finish(&mut self, cache: &mut ThreadCache) {
        if self.finished {
            return;
        }
        self.finalize_placeholder(cache);
        cache.clear_running(&self.thread_id);
        self.finished = true;
    }

    /// Abort the turn on a transport-level failure: the partial message is
    /// finalized and a terminal error entry lands in the timeline.
    pub fn abort(&mut self, cache: &mut ThreadCache, message: impl Into<String>) {
        if self.finished {
            return;
        }
        self.finalize_placeholder(cache);
        cache.push_item(
            &self.thread_id,
            TimelineItem::Message(TimelineMessage::error(message)),
        );
        cache.clear_running(&self.thread_id);
        self.errored = true;
        self.finished = true;
    }

    fn apply_frame(&mut self, cache: &mut ThreadCache, frame: StreamFrame) {
        match frame {
            StreamFrame::Token(text) => self.on_token(cache, &text),
            StreamFrame::Message(message) => self.on_message(cache, message),
            StreamFrame::ToolCall(call) => self.on_tool_call(cache, call),
            StreamFrame::ToolResult(result) => self.on_tool_result(cache, result),
            StreamFrame::Custom(progress) => {
                // Same run id evolves in place, never appends a duplicate
                match cache.find_progress_mut(&self.thread_id, &progress.run_id) {
                    Some(existing) => *existing = progress,
                    None => {
                        cache.push_item(&self.thread_id, TimelineItem::Progress(progress));
                    }
                }
            }
            StreamFrame::Error(error) => self.on_error(cache, error),
        }
    }

    /// First token allocates the placeholder; subsequent tokens append to
    /// it in place. Tokens never append new timeline entries.
    fn on_token(&mut self, cache: &mut ThreadCache, text: &str) {
        if self.provisional_message_id.is_none() {
            let id = ThreadCache::provisional_message_id();
            cache.push_item(
                &self.thread_id,
                TimelineItem::Message(TimelineMessage::placeholder(id.clone())),
            );
            self.provisional_message_id = Some(id);
        }

        let id = self.provisional_message_id.clone().unwrap_or_default();
        if let Some(message) = cache.find_message_mut(&self.thread_id, &id) {
            message.append_token(text);
        }
    }

    fn on_message(&mut self, cache: &mut ThreadCache, message: ChatMessage) {
        match message.role {
            MessageRole::Assistant if !message.content.is_empty() => {
                if let Some(provisional) = self.provisional_message_id.take() {
                    // Authoritative final text wins over token concatenation
                    if let Some(entry) = cache.find_message_mut(&self.thread_id, &provisional) {
                        entry.content = message.content;
                        entry.partial_content.clear();
                        entry.is_streaming = false;
                        if let Some(server_id) = message.id {
                            entry.id = server_id;
                        }
                        return;
                    }
                }
                // No placeholder (non-streaming path): append directly
                let mut entry =
                    TimelineMessage::finalized(MessageRole::Assistant, message.content);
                if let Some(server_id) = message.id {
                    entry.id = server_id;
                }
                cache.push_item(&self.thread_id, TimelineItem::Message(entry));
            }
            MessageRole::Assistant => {
                // Empty assistant message, e.g. a turn that was all tool
                // calls; nothing to show
            }
            MessageRole::User | MessageRole::System => {
                let mut entry = TimelineMessage::finalized(message.role, message.content);
                if let Some(server_id) = message.id {
                    entry.id = server_id;
                }
                cache.push_item(&self.thread_id, TimelineItem::Message(entry));
            }
        }
    }

    /// A tool call is its own timeline entry, never merged into the text
    /// placeholder. A repeated announcement for the same id updates the
    /// existing entry instead of duplicating it.
    fn on_tool_call(&mut self, cache: &mut ThreadCache, call: ToolCallFrame) {
        match cache.find_tool_mut(&self.thread_id, &call.id) {
            Some(existing) => {
                existing.name = call.name;
                existing.arguments = call.arguments;
            }
            None => {
                cache.push_item(
                    &self.thread_id,
                    TimelineItem::Tool(ToolMessage::new(call.id, call.name, call.arguments)),
                );
            }
        }
    }

    fn on_tool_result(&mut self, cache: &mut ThreadCache, result: ToolResultFrame) {
        match cache.find_tool_mut(&self.thread_id, &result.id) {
            Some(entry) => entry.complete(result.result),
            None => {
                tracing::warn!(
                    tool_call_id = %result.id,
                    "tool result without matching call dropped"
                );
            }
        }
    }

    fn on_error(&mut self, cache: &mut ThreadCache, error: ErrorContent) {
        if error.is_recoverable() {
            // Surfaced without ending accumulation
            cache.push_item(
                &self.thread_id,
                TimelineItem::Message(TimelineMessage::error(error.message())),
            );
            return;
        }
        self.abort(cache, error.message());
    }

    fn finalize_placeholder(&mut self, cache: &mut ThreadCache) {
        if let Some(provisional) = self.provisional_message_id.take() {
            if let Some(entry) = cache.find_message_mut(&self.thread_id, &provisional) {
                entry.finalize();
            }
        }
    }
}
