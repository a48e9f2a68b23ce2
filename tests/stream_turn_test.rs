//! Integration tests for turn streaming: frame assembly into the
//! timeline, tool correlation, progress replacement, error handling, and
//! equivalence between the streaming and non-streaming paths.

use std::sync::Arc;

use futures_util::stream;
use threadsync::config::EngineConfig;
use threadsync::engine::{EngineEvent, SyncEngine};
use threadsync::error::RelayError;
use threadsync::models::{ChatMessage, MessageRole, ProgressMessage, ProgressState, ToolStatus};
use threadsync::store::MockRecordStore;
use threadsync::stream::{
    ErrorContent, RelayEvent, StreamFrame, ToolCallFrame, ToolResultFrame,
};
use tokio::sync::mpsc::UnboundedReceiver;

fn engine() -> (SyncEngine, UnboundedReceiver<EngineEvent>) {
    let store = MockRecordStore::new();
    SyncEngine::new(Arc::new(store), "user-1", EngineConfig::default())
}

fn ok_frames(frames: Vec<StreamFrame>) -> Vec<Result<RelayEvent, RelayError>> {
    let mut events: Vec<Result<RelayEvent, RelayError>> =
        frames.into_iter().map(|f| Ok(RelayEvent::Frame(f))).collect();
    events.push(Ok(RelayEvent::Done));
    events
}

#[tokio::test]
async fn test_token_accumulation_yields_single_final_message() {
    let (engine, _events) = engine();
    engine.create_thread("T");
    engine.wait_idle().await;
    let id = engine.threads()[0].id.clone();

    let mut session = engine.send_message(&id, "Say hello").unwrap();
    assert!(engine.is_running(&id));

    let frames = ok_frames(vec![
        StreamFrame::Token("Hel".to_string()),
        StreamFrame::Token("lo".to_string()),
        StreamFrame::Message(ChatMessage::assistant("Hello")),
    ]);
    engine
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    let timeline = engine.timeline(&id);
    // User message plus exactly one assistant entry, no duplicates
    assert_eq!(timeline.len(), 2);
    let user = timeline[0].as_message().unwrap();
    assert_eq!(user.role, MessageRole::User);
    assert_eq!(user.content, "Say hello");
    let assistant = timeline[1].as_message().unwrap();
    assert_eq!(assistant.role, MessageRole::Assistant);
    assert_eq!(assistant.content, "Hello");
    assert!(!assistant.is_streaming);
    assert!(!engine.is_running(&id));
}

#[tokio::test]
async fn test_tool_correlation_single_entry() {
    let (engine, _events) = engine();
    engine.create_thread("T");
    engine.wait_idle().await;
    let id = engine.threads()[0].id.clone();

    let mut session = engine.send_message(&id, "search something").unwrap();
    let frames = ok_frames(vec![
        StreamFrame::ToolCall(ToolCallFrame {
            id: "a1".to_string(),
            name: "search".to_string(),
            arguments: serde_json::json!({"q": "rust"}),
        }),
        StreamFrame::ToolResult(ToolResultFrame {
            id: "a1".to_string(),
            result: "42".to_string(),
        }),
        StreamFrame::Message(ChatMessage::assistant("It is 42.")),
    ]);
    engine
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    let timeline = engine.timeline(&id);
    let tools: Vec<_> = timeline.iter().filter_map(|i| i.as_tool()).collect();
    assert_eq!(tools.len(), 1, "exactly one entry for correlation id a1");
    assert_eq!(tools[0].name, "search");
    assert_eq!(tools[0].result.as_deref(), Some("42"));
    assert_eq!(tools[0].status, ToolStatus::Complete);
}

#[tokio::test]
async fn test_progress_frames_render_as_one_evolving_entry() {
    let (engine, _events) = engine();
    engine.create_thread("T");
    engine.wait_idle().await;
    let id = engine.threads()[0].id.clone();

    let mut session = engine.send_message(&id, "index the docs").unwrap();
    let frames = ok_frames(vec![
        StreamFrame::Custom(ProgressMessage {
            name: "indexer".to_string(),
            run_id: "r1".to_string(),
            state: ProgressState::Running,
            result: None,
            data: serde_json::json!({"done": 10}),
        }),
        StreamFrame::Custom(ProgressMessage {
            name: "indexer".to_string(),
            run_id: "r1".to_string(),
            state: ProgressState::Complete,
            result: Some(serde_json::json!({"count": 80})),
            data: serde_json::json!({"done": 80}),
        }),
    ]);
    engine
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    let timeline = engine.timeline(&id);
    let progress: Vec<_> = timeline.iter().filter_map(|i| i.as_progress()).collect();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].state, ProgressState::Complete);
    assert_eq!(progress[0].data["done"], 80);
}

#[tokio::test]
async fn test_streaming_and_invoke_produce_identical_state() {
    let (engine_a, _ev_a) = engine();
    engine_a.create_thread("T");
    engine_a.wait_idle().await;
    let id_a = engine_a.threads()[0].id.clone();
    let mut session = engine_a.send_message(&id_a, "hi").unwrap();
    let frames = ok_frames(vec![
        StreamFrame::Token("Hel".to_string()),
        StreamFrame::Token("lo".to_string()),
        StreamFrame::Message(ChatMessage::assistant("Hello")),
    ]);
    engine_a
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    let (engine_b, _ev_b) = engine();
    engine_b.create_thread("T");
    engine_b.wait_idle().await;
    let id_b = engine_b.threads()[0].id.clone();
    let mut session = engine_b.send_message(&id_b, "hi").unwrap();
    engine_b.complete_turn(&mut session, ChatMessage::assistant("Hello"));

    let project = |engine: &SyncEngine, id: &str| -> Vec<(MessageRole, String)> {
        engine
            .timeline(id)
            .iter()
            .filter_map(|i| i.as_message())
            .map(|m| (m.role, m.visible_text().to_string()))
            .collect()
    };

    assert_eq!(project(&engine_a, &id_a), project(&engine_b, &id_b));
    assert!(!engine_a.is_running(&id_a));
    assert!(!engine_b.is_running(&id_b));
}

#[tokio::test]
async fn test_transport_error_finalizes_turn_with_error_entry() {
    let (engine, mut events) = engine();
    engine.create_thread("T");
    engine.wait_idle().await;
    let id = engine.threads()[0].id.clone();

    let mut session = engine.send_message(&id, "hi").unwrap();
    let frames: Vec<Result<RelayEvent, RelayError>> = vec![
        Ok(RelayEvent::Frame(StreamFrame::Token("par".to_string()))),
        Err(RelayError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        }),
    ];
    engine
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    assert!(session.is_finished());
    assert!(!engine.is_running(&id));

    let timeline = engine.timeline(&id);
    // user + partial assistant + terminal error entry
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[1].as_message().unwrap().content, "par");
    assert!(timeline[2].as_message().unwrap().is_error);

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::StreamFailed { thread_id, message } = event {
            assert_eq!(thread_id, id);
            assert!(message.contains("502"));
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn test_fatal_error_frame_ends_turn() {
    let (engine, _events) = engine();
    engine.create_thread("T");
    engine.wait_idle().await;
    let id = engine.threads()[0].id.clone();

    let mut session = engine.send_message(&id, "hi").unwrap();
    let frames: Vec<Result<RelayEvent, RelayError>> = vec![
        Ok(RelayEvent::Frame(StreamFrame::Error(ErrorContent::Text(
            "model unavailable".to_string(),
        )))),
        // Anything after the terminal error must be ignored
        Ok(RelayEvent::Frame(StreamFrame::Token("late".to_string()))),
    ];
    engine
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    let timeline = engine.timeline(&id);
    assert_eq!(timeline.len(), 2);
    let error = timeline[1].as_message().unwrap();
    assert!(error.is_error);
    assert_eq!(error.content, "model unavailable");
    assert!(!engine.is_running(&id));
}

#[tokio::test]
async fn test_switching_threads_does_not_cancel_background_stream() {
    let (engine, _events) = engine();
    engine.create_thread("First");
    engine.wait_idle().await;
    let first = engine.threads()[0].id.clone();

    let mut session = engine.send_message(&first, "long question").unwrap();

    // User switches away mid-turn
    engine.create_thread("Second");
    engine.wait_idle().await;
    let second = engine.current_thread_id().unwrap();
    assert_ne!(first, second);

    // The background thread still shows as producing a response
    assert!(engine.is_running(&first));
    assert!(!engine.is_running(&second));

    let frames = ok_frames(vec![
        StreamFrame::Token("back".to_string()),
        StreamFrame::Message(ChatMessage::assistant("background answer")),
    ]);
    engine
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    // The stream updated the background thread, not the visible one
    let first_timeline = engine.timeline(&first);
    assert_eq!(
        first_timeline.last().unwrap().as_message().unwrap().content,
        "background answer"
    );
    assert_eq!(engine.timeline(&second).len(), 0);
    assert!(!engine.is_running(&first));
    // Selection was untouched by the background completion
    assert_eq!(engine.current_thread_id(), Some(second));
}

#[tokio::test]
async fn test_stream_addressed_by_provisional_id_lands_after_confirm() {
    let (engine, _events) = engine();

    // Send on the provisional thread before the create confirms
    let provisional = engine.create_thread("T");
    let mut session = engine.send_message(&provisional, "hi").unwrap();

    // Create confirms while the stream is mid-flight
    engine.wait_idle().await;
    let server_id = engine.threads()[0].id.clone();
    assert_ne!(provisional, server_id);

    let frames = ok_frames(vec![
        StreamFrame::Token("Hi ".to_string()),
        StreamFrame::Token("there".to_string()),
    ]);
    engine
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    let timeline = engine.timeline(&server_id);
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[1].as_message().unwrap().content, "Hi there");
    assert!(!engine.is_running(&server_id));
}

#[tokio::test]
async fn test_transport_close_without_sentinel_settles_turn() {
    let (engine, _events) = engine();
    engine.create_thread("T");
    engine.wait_idle().await;
    let id = engine.threads()[0].id.clone();

    let mut session = engine.send_message(&id, "hi").unwrap();
    // Stream ends abruptly with no Done and no error
    let frames: Vec<Result<RelayEvent, RelayError>> = vec![Ok(RelayEvent::Frame(
        StreamFrame::Token("half an answ".to_string()),
    ))];
    engine
        .stream_turn(&mut session, stream::iter(frames))
        .await;

    assert!(session.is_finished());
    assert!(!engine.is_running(&id));
    let timeline = engine.timeline(&id);
    assert_eq!(timeline[1].as_message().unwrap().content, "half an answ");
}
