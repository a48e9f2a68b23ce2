//! Engine composition root.
//!
//! Ties the reconciling cache, the sync queue, the record store, and the
//! stream sessions together. Every user action is one synchronous cache
//! transition followed by an asynchronous persistence tail funneled
//! through the queue; outcomes the rendering layer cares about come back
//! as [`EngineEvent`]s on an unbounded channel.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::cache::{PendingKind, ThreadCache};
use crate::config::EngineConfig;
use crate::error::RelayError;
use crate::models::{
    truncate_preview, ChatMessage, ThreadPatch, ThreadRecord, TimelineItem, TurnRequest,
};
use crate::stream::{RelayEvent, StreamFrame, StreamSession};
use crate::sync::{Reconciler, SyncQueue};
use crate::traits::RecordStore;

/// Notifications surfaced to the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A provisional record was confirmed under its server id
    RecordConfirmed {
        provisional_id: String,
        server_id: String,
    },
    /// A persistence call failed; the optimistic change was rolled back
    PersistenceFailed {
        record_id: String,
        kind: PendingKind,
        message: String,
    },
    /// A turn's transport failed mid-stream
    StreamFailed { thread_id: String, message: String },
}

/// The client-resident sync engine.
///
/// All state lives in the [`ThreadCache`] behind a mutex whose critical
/// sections are single synchronous transitions, never held across an
/// await. Persistence is serialized through the [`SyncQueue`].
pub struct SyncEngine {
    cache: Arc<Mutex<ThreadCache>>,
    store: Arc<dyn RecordStore>,
    queue: SyncQueue,
    config: EngineConfig,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl SyncEngine {
    /// Create an engine for the given owner. Returns the engine and the
    /// receiving end of its event channel.
    pub fn new(
        store: Arc<dyn RecordStore>,
        owner_id: impl Into<String>,
        config: EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let engine = Self {
            cache: Arc::new(Mutex::new(ThreadCache::new(owner_id))),
            store,
            queue: SyncQueue::new(),
            config,
            events,
        };
        (engine, receiver)
    }

    /// Shared handle to the cache, for the reconciler and for embedders
    /// that need direct read access.
    pub fn cache_handle(&self) -> Arc<Mutex<ThreadCache>> {
        Arc::clone(&self.cache)
    }

    /// Build the periodic reconciler for this engine's cache and store.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.store),
            self.config.reconcile_interval,
        )
    }

    /// Wait until all queued persistence calls settled.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    // ------------------------------------------------------------------
    // Snapshot views
    // ------------------------------------------------------------------

    /// Active threads, most recent activity first.
    pub fn threads(&self) -> Vec<ThreadRecord> {
        let cache = self.cache.lock().unwrap();
        cache.threads().into_iter().cloned().collect()
    }

    /// Archived threads, most recent activity first.
    pub fn archived_threads(&self) -> Vec<ThreadRecord> {
        let cache = self.cache.lock().unwrap();
        cache.archived_threads().into_iter().cloned().collect()
    }

    /// The currently selected thread.
    pub fn current_thread(&self) -> Option<ThreadRecord> {
        self.cache.lock().unwrap().current_thread().cloned()
    }

    /// Id of the currently selected thread.
    pub fn current_thread_id(&self) -> Option<String> {
        self.cache
            .lock()
            .unwrap()
            .current_thread_id()
            .map(str::to_string)
    }

    /// The visible timeline for a thread.
    pub fn timeline(&self, thread_id: &str) -> Vec<TimelineItem> {
        self.cache
            .lock()
            .unwrap()
            .timeline(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether a thread is currently producing a response.
    pub fn is_running(&self, thread_id: &str) -> bool {
        self.cache.lock().unwrap().is_running(thread_id)
    }

    /// Whether any record has an unconfirmed mutation.
    pub fn has_pending(&self) -> bool {
        self.cache.lock().unwrap().has_pending()
    }

    // ------------------------------------------------------------------
    // Record mutations
    // ------------------------------------------------------------------

    /// Create a thread. It is visible and current immediately; the store
    /// call runs behind the queue and swaps in the server id on success.
    pub fn create_thread(&self, title: impl Into<String>) -> String {
        self.create_thread_with(title, None, None)
    }

    /// Create a thread with agent/model selectors.
    pub fn create_thread_with(
        &self,
        title: impl Into<String>,
        agent_id: Option<String>,
        model_id: Option<String>,
    ) -> String {
        let id = self
            .cache
            .lock()
            .unwrap()
            .begin_create(title, agent_id, model_id);
        Self::spawn_create_task(
            Arc::clone(&self.cache),
            Arc::clone(&self.store),
            self.queue.clone(),
            self.events.clone(),
            self.config.default_thread_title.clone(),
            id.clone(),
            false,
        );
        id
    }

    /// Rename a thread.
    pub fn rename_thread(&self, thread_id: &str, title: impl Into<String>) -> bool {
        self.update_record(thread_id, ThreadPatch::title(title))
    }

    /// Change a thread's agent selector.
    pub fn set_thread_agent(&self, thread_id: &str, agent_id: impl Into<String>) -> bool {
        self.update_record(thread_id, ThreadPatch::agent(agent_id))
    }

    /// Change a thread's model selector.
    pub fn set_thread_model(&self, thread_id: &str, model_id: impl Into<String>) -> bool {
        self.update_record(thread_id, ThreadPatch::model(model_id))
    }

    /// Archive or unarchive a thread.
    pub fn set_archived(&self, thread_id: &str, archived: bool) -> bool {
        let changed = self.update_record(thread_id, ThreadPatch::archived(archived));
        if changed && archived {
            // Archiving the last active thread must not leave the user
            // with an empty list
            self.maybe_schedule_safety_net();
        }
        changed
    }

    /// Bump a thread's activity timestamp and preview.
    pub fn note_activity(&self, thread_id: &str, preview: Option<&str>) -> bool {
        let preview = preview.map(|p| truncate_preview(p, self.config.preview_max_chars));
        self.update_record(thread_id, ThreadPatch::activity(Utc::now(), preview))
    }

    /// Delete a thread. It disappears immediately; failure re-inserts it.
    pub fn delete_thread(&self, thread_id: &str) -> bool {
        let ticket = self.cache.lock().unwrap().begin_delete(thread_id);
        let Some(ticket) = ticket else {
            return false;
        };
        let record_id = ticket.record.id.clone();

        self.maybe_schedule_safety_net();

        let cache = Arc::clone(&self.cache);
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        self.queue.enqueue(async move {
            let target = {
                let guard = cache.lock().unwrap();
                guard.resolve_id(&record_id).to_string()
            };
            match store.delete(&target).await {
                Ok(()) => {
                    cache.lock().unwrap().resolve_delete(&record_id);
                    Ok(())
                }
                Err(err) => {
                    let message = err.to_string();
                    cache.lock().unwrap().rollback_delete(ticket);
                    let _ = events.send(EngineEvent::PersistenceFailed {
                        record_id,
                        kind: PendingKind::Delete,
                        message,
                    });
                    Err(err.into())
                }
            }
        });
        true
    }

    /// Switch the current thread. An in-flight stream on the previous
    /// thread keeps running in the background.
    pub fn switch_thread(&self, thread_id: &str) -> bool {
        self.cache.lock().unwrap().switch_current(thread_id)
    }

    // ------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------

    /// Build the turn request for a thread, carrying its selectors.
    pub fn turn_request(&self, thread_id: &str, content: &str) -> Option<TurnRequest> {
        let cache = self.cache.lock().unwrap();
        let record = cache.get(thread_id)?;
        let mut request = TurnRequest::new(content, record.id.clone());
        request.agent_id = record.agent_id.clone();
        request.model_id = record.model_id.clone();
        Some(request)
    }

    /// Append the user's message, flag the thread as running, and bump its
    /// activity. Returns the session that will assemble the response, or
    /// `None` when the thread is unknown or already producing one.
    pub fn send_message(&self, thread_id: &str, content: &str) -> Option<StreamSession> {
        {
            let mut cache = self.cache.lock().unwrap();
            if cache.is_running(thread_id) {
                return None;
            }
            if !cache.push_user_message(thread_id, content) {
                return None;
            }
            cache.set_running(thread_id);
        }
        self.note_activity(thread_id, Some(content));
        Some(StreamSession::new(thread_id))
    }

    /// Drive a session over a frame stream until the sentinel, a terminal
    /// error, or transport close. Frames apply strictly in arrival order.
    pub async fn stream_turn<S>(&self, session: &mut StreamSession, mut frames: S)
    where
        S: Stream<Item = Result<RelayEvent, RelayError>> + Unpin,
    {
        while let Some(item) = frames.next().await {
            match item {
                Ok(event) => {
                    let mut cache = self.cache.lock().unwrap();
                    session.apply(&mut cache, event);
                    if session.is_finished() {
                        break;
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    {
                        let mut cache = self.cache.lock().unwrap();
                        session.abort(&mut cache, message.clone());
                    }
                    let _ = self.events.send(EngineEvent::StreamFailed {
                        thread_id: session.thread_id().to_string(),
                        message,
                    });
                    break;
                }
            }
        }

        // Transport closed without the sentinel: settle what arrived
        if !session.is_finished() {
            let mut cache = self.cache.lock().unwrap();
            session.finish(&mut cache);
        }
    }

    /// Apply a non-streaming turn result. Produces the same final state as
    /// the streaming form of the same message.
    pub fn complete_turn(&self, session: &mut StreamSession, message: ChatMessage) {
        let mut cache = self.cache.lock().unwrap();
        session.apply(&mut cache, RelayEvent::Frame(StreamFrame::Message(message)));
        session.apply(&mut cache, RelayEvent::Done);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn update_record(&self, thread_id: &str, patch: ThreadPatch) -> bool {
        let ticket = self.cache.lock().unwrap().begin_update(thread_id, &patch);
        let Some(ticket) = ticket else {
            return false;
        };
        let record_id = ticket.record_id.clone();

        let cache = Arc::clone(&self.cache);
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        self.queue.enqueue(async move {
            let target = {
                let guard = cache.lock().unwrap();
                guard.resolve_id(&record_id).to_string()
            };
            match store.update(&target, &patch).await {
                Ok(()) => {
                    cache.lock().unwrap().resolve_update(&record_id);
                    Ok(())
                }
                Err(err) => {
                    let message = err.to_string();
                    cache.lock().unwrap().rollback_update(ticket);
                    let _ = events.send(EngineEvent::PersistenceFailed {
                        record_id,
                        kind: PendingKind::Update,
                        message,
                    });
                    Err(err.into())
                }
            }
        });
        true
    }

    fn maybe_schedule_safety_net(&self) {
        let created = self
            .cache
            .lock()
            .unwrap()
            .ensure_default_record(&self.config.default_thread_title);
        if let Some(id) = created {
            Self::spawn_create_task(
                Arc::clone(&self.cache),
                Arc::clone(&self.store),
                self.queue.clone(),
                self.events.clone(),
                self.config.default_thread_title.clone(),
                id,
                true,
            );
        }
    }

    /// Enqueue the persistence tail of a create. On failure the record is
    /// removed again and, unless this already was the safety-net create,
    /// the zero-thread invariant is re-checked.
    fn spawn_create_task(
        cache: Arc<Mutex<ThreadCache>>,
        store: Arc<dyn RecordStore>,
        queue: SyncQueue,
        events: mpsc::UnboundedSender<EngineEvent>,
        default_title: String,
        provisional_id: String,
        is_safety_net: bool,
    ) {
        let queue_handle = queue.clone();
        queue.enqueue(async move {
            // The record may have been deleted before we got to persist it
            let record = { cache.lock().unwrap().get(&provisional_id).cloned() };
            let Some(record) = record else {
                return Ok(());
            };

            match store.create(&record).await {
                Ok(server_id) => {
                    cache
                        .lock()
                        .unwrap()
                        .confirm_create(&provisional_id, &server_id);
                    let _ = events.send(EngineEvent::RecordConfirmed {
                        provisional_id,
                        server_id,
                    });
                    Ok(())
                }
                Err(err) => {
                    let message = err.to_string();
                    cache.lock().unwrap().abort_create(&provisional_id);
                    let _ = events.send(EngineEvent::PersistenceFailed {
                        record_id: provisional_id,
                        kind: PendingKind::Create,
                        message,
                    });
                    if !is_safety_net {
                        let created = {
                            cache
                                .lock()
                                .unwrap()
                                .ensure_default_record(&default_title)
                        };
                        if let Some(new_id) = created {
                            Self::spawn_create_task(
                                Arc::clone(&cache),
                                Arc::clone(&store),
                                queue_handle.clone(),
                                events.clone(),
                                default_title.clone(),
                                new_id,
                                true,
                            );
                        }
                    }
                    Err(err.into())
                }
            }
        });
    }
}
