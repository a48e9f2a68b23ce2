//! Message timeline and per-thread running flags.
//!
//! All lookups resolve provisional ids first, so a stream that started
//! against an unconfirmed thread keeps updating the right timeline after
//! the id swap.

use crate::models::{TimelineItem, TimelineMessage};

use super::ThreadCache;

impl ThreadCache {
    /// The visible timeline for a thread.
    pub fn timeline(&self, thread_id: &str) -> Option<&Vec<TimelineItem>> {
        self.timelines.get(self.resolve_id(thread_id))
    }

    /// Append a finalized user message. Returns `false` when the thread
    /// does not exist.
    pub fn push_user_message(&mut self, thread_id: &str, content: impl Into<String>) -> bool {
        let resolved = self.resolve_id(thread_id).to_string();
        if !self.records.contains_key(&resolved) {
            return false;
        }
        self.timelines
            .entry(resolved)
            .or_default()
            .push(TimelineItem::Message(TimelineMessage::user(content)));
        true
    }

    /// Append an arbitrary timeline entry. Returns `false` when the thread
    /// does not exist.
    pub fn push_item(&mut self, thread_id: &str, item: TimelineItem) -> bool {
        let resolved = self.resolve_id(thread_id).to_string();
        if !self.records.contains_key(&resolved) {
            return false;
        }
        self.timelines.entry(resolved).or_default().push(item);
        true
    }

    /// Mutable access to a text entry by message id.
    pub(crate) fn find_message_mut(
        &mut self,
        thread_id: &str,
        message_id: &str,
    ) -> Option<&mut TimelineMessage> {
        let resolved = self.resolve_id(thread_id).to_string();
        self.timelines.get_mut(&resolved)?.iter_mut().find_map(|item| match item {
            TimelineItem::Message(m) if m.id == message_id => Some(m),
            _ => None,
        })
    }

    /// Mutable access to a tool entry by correlation id.
    pub(crate) fn find_tool_mut(
        &mut self,
        thread_id: &str,
        tool_call_id: &str,
    ) -> Option<&mut crate::models::ToolMessage> {
        let resolved = self.resolve_id(thread_id).to_string();
        self.timelines.get_mut(&resolved)?.iter_mut().find_map(|item| match item {
            TimelineItem::Tool(t) if t.tool_call_id == tool_call_id => Some(t),
            _ => None,
        })
    }

    /// Mutable access to a progress entry by run id.
    pub(crate) fn find_progress_mut(
        &mut self,
        thread_id: &str,
        run_id: &str,
    ) -> Option<&mut crate::models::ProgressMessage> {
        let resolved = self.resolve_id(thread_id).to_string();
        self.timelines.get_mut(&resolved)?.iter_mut().find_map(|item| match item {
            TimelineItem::Progress(p) if p.run_id == run_id => Some(p),
            _ => None,
        })
    }

    /// Mark a thread as producing a response.
    pub fn set_running(&mut self, thread_id: &str) {
        let resolved = self.resolve_id(thread_id).to_string();
        self.running.insert(resolved);
    }

    /// Clear a thread's running flag.
    pub fn clear_running(&mut self, thread_id: &str) {
        let resolved = self.resolve_id(thread_id).to_string();
        self.running.remove(&resolved);
    }

    /// Whether a thread is currently producing a response. Background
    /// threads keep their flag while a different thread is displayed.
    pub fn is_running(&self, thread_id: &str) -> bool {
        self.running.contains(self.resolve_id(thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageRole, ToolMessage};

    #[test]
    fn test_push_user_message_requires_thread() {
        let mut cache = ThreadCache::new("user-1");
        assert!(!cache.push_user_message("missing", "hello"));

        let id = cache.begin_create("T", None, None);
        assert!(cache.push_user_message(&id, "hello"));

        let timeline = cache.timeline(&id).unwrap();
        assert_eq!(timeline.len(), 1);
        let msg = timeline[0].as_message().unwrap();
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_running_flag_roundtrip() {
        let mut cache = ThreadCache::new("user-1");
        let id = cache.begin_create("T", None, None);

        assert!(!cache.is_running(&id));
        cache.set_running(&id);
        assert!(cache.is_running(&id));
        cache.clear_running(&id);
        assert!(!cache.is_running(&id));
    }

    #[test]
    fn test_timeline_access_through_provisional_id() {
        let mut cache = ThreadCache::new("user-1");
        let provisional = cache.begin_create("T", None, None);
        cache.push_user_message(&provisional, "first");
        cache.set_running(&provisional);

        cache.confirm_create(&provisional, "thr-1");

        // Updates addressed with the stale id land on the confirmed thread
        assert!(cache.push_user_message(&provisional, "second"));
        assert_eq!(cache.timeline("thr-1").unwrap().len(), 2);
        assert_eq!(cache.timeline(&provisional).unwrap().len(), 2);
        assert!(cache.is_running(&provisional));
        assert!(cache.is_running("thr-1"));
    }

    #[test]
    fn test_find_tool_mut_by_correlation_id() {
        let mut cache = ThreadCache::new("user-1");
        let id = cache.begin_create("T", None, None);
        cache.push_item(
            &id,
            TimelineItem::Tool(ToolMessage::new("a1", "search", serde_json::Value::Null)),
        );

        cache.find_tool_mut(&id, "a1").unwrap().complete("42");

        let timeline = cache.timeline(&id).unwrap();
        assert_eq!(timeline[0].as_tool().unwrap().result.as_deref(), Some("42"));
        assert!(cache.find_tool_mut(&id, "zz").is_none());
    }
}
