//! Data model types shared across the cache, sync, and stream layers.

mod message;
mod request;
mod thread;

pub use message::{
    ChatMessage, MessageRole, ProgressMessage, ProgressState, TimelineItem, TimelineMessage,
    ToolMessage, ToolStatus,
};
pub use request::{
    AckResponse, CreateRecordBody, CreateRecordResponse, ListRecordsResponse, TurnRequest,
};
pub use thread::{
    is_provisional_id, provisional_id, truncate_preview, ThreadPatch, ThreadRecord,
    PROVISIONAL_ID_PREFIX,
};
