use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for client-generated provisional record ids.
///
/// Records created optimistically carry an id of the form `pending-<uuid>`
/// until the authoritative store confirms them with its own id. The prefix
/// keeps provisional ids trivially distinguishable from server ids.
pub const PROVISIONAL_ID_PREFIX: &str = "pending-";

/// Generate a fresh provisional record id.
pub fn provisional_id() -> String {
    format!("{}{}", PROVISIONAL_ID_PREFIX, Uuid::new_v4())
}

/// Check whether an id is client-generated (unconfirmed).
pub fn is_provisional_id(id: &str) -> bool {
    id.starts_with(PROVISIONAL_ID_PREFIX)
}

/// Truncate text for use as a preview, respecting UTF-8 char boundaries.
///
/// Returns the original text when it already fits within `max_chars` bytes.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars.saturating_sub(3);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// A conversation thread's persisted metadata, as held by the authoritative
/// store and mirrored in the local cache.
///
/// The wire format sends `last_activity` as integer milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadRecord {
    /// Opaque unique id; provisional until confirmed by the store
    pub id: String,
    /// Display title (API also accepts "name")
    #[serde(default, alias = "name")]
    pub title: String,
    /// Last activity timestamp, milliseconds on the wire
    #[serde(with = "chrono::serde::ts_milliseconds", alias = "last_activity_at")]
    pub last_activity: DateTime<Utc>,
    /// Selected agent for this thread
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Selected model for this thread
    #[serde(default)]
    pub model_id: Option<String>,
    /// Truncated preview of the last message
    #[serde(default)]
    pub preview: Option<String>,
    /// Soft-delete flag
    #[serde(default)]
    pub archived: bool,
    /// Owning user id
    #[serde(default)]
    pub owner_id: String,
}

impl ThreadRecord {
    /// Create a new, unconfirmed record with a provisional id.
    pub fn provisional(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: provisional_id(),
            title: title.into(),
            last_activity: Utc::now(),
            agent_id: None,
            model_id: None,
            preview: None,
            archived: false,
            owner_id: owner_id.into(),
        }
    }

    /// Whether this record's id is still client-generated.
    pub fn is_provisional(&self) -> bool {
        is_provisional_id(&self.id)
    }
}

/// A partial update to a [`ThreadRecord`].
///
/// Only the fields that are `Some` are applied; the same shape doubles as
/// the rollback snapshot taken before an optimistic update, so a failed
/// persistence call restores exactly the fields it changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThreadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl ThreadPatch {
    /// Patch that only renames the thread.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Patch that bumps activity and optionally the preview.
    pub fn activity(at: DateTime<Utc>, preview: Option<String>) -> Self {
        Self {
            last_activity: Some(at),
            preview,
            ..Self::default()
        }
    }

    /// Patch that selects an agent.
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Self::default()
        }
    }

    /// Patch that selects a model.
    pub fn model(model_id: impl Into<String>) -> Self {
        Self {
            model_id: Some(model_id.into()),
            ..Self::default()
        }
    }

    /// Patch that toggles the archived flag.
    pub fn archived(archived: bool) -> Self {
        Self {
            archived: Some(archived),
            ..Self::default()
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.last_activity.is_none()
            && self.agent_id.is_none()
            && self.model_id.is_none()
            && self.preview.is_none()
            && self.archived.is_none()
    }

    /// Apply this patch to a record, mutating only the fields that are set.
    pub fn apply_to(&self, record: &mut ThreadRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(at) = self.last_activity {
            record.last_activity = at;
        }
        if let Some(agent_id) = &self.agent_id {
            record.agent_id = Some(agent_id.clone());
        }
        if let Some(model_id) = &self.model_id {
            record.model_id = Some(model_id.clone());
        }
        if let Some(preview) = &self.preview {
            record.preview = Some(preview.clone());
        }
        if let Some(archived) = self.archived {
            record.archived = archived;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_id_has_prefix() {
        let id = provisional_id();
        assert!(id.starts_with(PROVISIONAL_ID_PREFIX));
        assert!(is_provisional_id(&id));
        // Rest should be a UUID (36 chars)
        assert_eq!(id.len(), PROVISIONAL_ID_PREFIX.len() + 36);
    }

    #[test]
    fn test_server_id_is_not_provisional() {
        assert!(!is_provisional_id("thr-42"));
        assert!(!is_provisional_id(""));
    }

    #[test]
    fn test_truncate_preview_short_text_unchanged() {
        assert_eq!(truncate_preview("hello", 40), "hello");
    }

    #[test]
    fn test_truncate_preview_long_text() {
        let long = "a".repeat(100);
        let truncated = truncate_preview(&long, 40);
        assert_eq!(truncated.len(), 40);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_preview_respects_char_boundaries() {
        // Multi-byte characters must not be split mid-sequence
        let text = "日本語のテキストが長い場合でも安全に切り詰められる必要があります";
        let truncated = truncate_preview(text, 40);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 40);
    }

    #[test]
    fn test_record_provisional_constructor() {
        let record = ThreadRecord::provisional("user-1", "First thread");
        assert!(record.is_provisional());
        assert_eq!(record.title, "First thread");
        assert_eq!(record.owner_id, "user-1");
        assert!(!record.archived);
        assert!(record.agent_id.is_none());
    }

    #[test]
    fn test_record_millisecond_wire_format() {
        let json = r#"{
            "id": "thr-1",
            "title": "Wire test",
            "last_activity": 1736956800000,
            "owner_id": "user-1"
        }"#;
        let record: ThreadRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.last_activity.timestamp_millis(), 1736956800000);

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["last_activity"], serde_json::json!(1736956800000i64));
    }

    #[test]
    fn test_record_accepts_name_alias_and_defaults() {
        let json = r#"{"id": "thr-2", "name": "Aliased", "last_activity": 0}"#;
        let record: ThreadRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.title, "Aliased");
        assert!(!record.archived);
        assert!(record.preview.is_none());
    }

    #[test]
    fn test_patch_apply_only_set_fields() {
        let mut record = ThreadRecord::provisional("user-1", "Original");
        record.agent_id = Some("agent-a".to_string());

        ThreadPatch::title("Renamed").apply_to(&mut record);

        assert_eq!(record.title, "Renamed");
        assert_eq!(record.agent_id, Some("agent-a".to_string()));
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(ThreadPatch::default().is_empty());
        assert!(!ThreadPatch::title("x").is_empty());
        assert!(!ThreadPatch::archived(true).is_empty());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let json = serde_json::to_value(ThreadPatch::title("New")).unwrap();
        assert_eq!(json, serde_json::json!({"title": "New"}));
    }
}
