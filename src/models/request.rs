use serde::{Deserialize, Serialize};

use super::thread::ThreadRecord;

/// Request body for one agent turn, streaming or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnRequest {
    /// The user's message
    pub message: String,
    /// Thread the turn belongs to (may be a provisional id)
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            thread_id: thread_id.into(),
            agent_id: None,
            model_id: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}

/// Body sent when creating a record; the provisional id is intentionally
/// omitted because the store assigns the canonical one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRecordBody {
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub archived: bool,
    pub owner_id: String,
}

impl From<&ThreadRecord> for CreateRecordBody {
    fn from(record: &ThreadRecord) -> Self {
        Self {
            title: record.title.clone(),
            last_activity: record.last_activity,
            agent_id: record.agent_id.clone(),
            model_id: record.model_id.clone(),
            preview: record.preview.clone(),
            archived: record.archived,
            owner_id: record.owner_id.clone(),
        }
    }
}

/// Response from the record list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListRecordsResponse {
    pub threads: Vec<ThreadRecord>,
}

/// Response from the record create endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRecordResponse {
    pub id: String,
}

/// Acknowledgement for update/delete calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AckResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_request_builder() {
        let request = TurnRequest::new("Hello", "thr-1")
            .with_agent("research")
            .with_model("sonnet");
        assert_eq!(request.agent_id.as_deref(), Some("research"));
        assert_eq!(request.model_id.as_deref(), Some("sonnet"));
    }

    #[test]
    fn test_turn_request_omits_unset_selectors() {
        let json = serde_json::to_value(TurnRequest::new("Hi", "thr-1")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "Hi", "thread_id": "thr-1"}));
    }

    #[test]
    fn test_create_body_drops_provisional_id() {
        let record = ThreadRecord::provisional("user-1", "New Chat");
        let body = CreateRecordBody::from(&record);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["title"], "New Chat");
        assert_eq!(json["owner_id"], "user-1");
    }
}
