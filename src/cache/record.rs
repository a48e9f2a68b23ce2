//! Optimistic mutation operations for [`ThreadCache`].
//!
//! Each operation is split into a synchronous `begin_*` transition applied
//! to the snapshot immediately, and a `confirm`/`resolve`/`rollback`
//! counterpart invoked when the persistence call settles. Rollbacks
//! restore exactly what the mutation changed, so unrelated edits applied
//! in the meantime survive.

use chrono::{DateTime, Utc};

use crate::models::{provisional_id, ThreadPatch, ThreadRecord, TimelineItem};

use super::{PendingKind, ThreadCache};

/// Snapshot of the prior values of the fields an update changed.
///
/// `None` means the field was not touched; restoring applies only the
/// captured fields.
#[derive(Debug, Clone)]
pub struct UpdateTicket {
    pub record_id: String,
    prior_title: Option<String>,
    prior_last_activity: Option<DateTime<Utc>>,
    prior_agent_id: Option<Option<String>>,
    prior_model_id: Option<Option<String>>,
    prior_preview: Option<Option<String>>,
    prior_archived: Option<bool>,
}

/// Everything needed to undo an optimistic delete.
#[derive(Debug, Clone)]
pub struct DeleteTicket {
    pub record: ThreadRecord,
    timeline: Vec<TimelineItem>,
    was_current: bool,
    was_running: bool,
}

impl ThreadCache {
    /// Optimistically create a record: it appears in the snapshot at once,
    /// becomes current, and is marked `pending:create`. Returns the
    /// provisional id the engine should persist under.
    pub fn begin_create(
        &mut self,
        title: impl Into<String>,
        agent_id: Option<String>,
        model_id: Option<String>,
    ) -> String {
        let mut record = ThreadRecord::provisional(self.owner_id.clone(), title);
        record.agent_id = agent_id;
        record.model_id = model_id;
        let id = record.id.clone();

        self.records.insert(id.clone(), record);
        self.timelines.entry(id.clone()).or_default();
        self.current_thread_id = Some(id.clone());
        self.pending.insert(id.clone(), PendingKind::Create);
        id
    }

    /// Swap a confirmed record's provisional id for the server-assigned id,
    /// in place, across every structure that references it: the records
    /// map, the current selection, the timeline, and the running set. The
    /// provisional id keeps working afterwards through the redirect table.
    pub fn confirm_create(&mut self, provisional: &str, server_id: &str) {
        if provisional == server_id {
            self.clear_pending(provisional, PendingKind::Create);
            self.clear_safety_net_guard(provisional);
            return;
        }

        if let Some(mut record) = self.records.remove(provisional) {
            record.id = server_id.to_string();
            self.records.insert(server_id.to_string(), record);
        }

        if let Some(timeline) = self.timelines.remove(provisional) {
            self.timelines.insert(server_id.to_string(), timeline);
        }

        if self.running.remove(provisional) {
            self.running.insert(server_id.to_string());
        }

        if self.current_thread_id.as_deref() == Some(provisional) {
            self.current_thread_id = Some(server_id.to_string());
        }

        // Whatever operation is pending moves with the record; the create
        // itself is the one being confirmed.
        match self.pending.remove(provisional) {
            Some(PendingKind::Create) | None => {}
            Some(kind) => {
                self.pending.insert(server_id.to_string(), kind);
            }
        }

        self.pending_to_real
            .insert(provisional.to_string(), server_id.to_string());
        self.clear_safety_net_guard(provisional);
    }

    /// Undo a failed create: the record vanishes; if it was current, the
    /// most recently active remaining record takes over (or none).
    pub fn abort_create(&mut self, provisional: &str) {
        self.records.remove(provisional);
        self.timelines.remove(provisional);
        self.running.remove(provisional);
        self.pending.remove(provisional);
        if self.current_thread_id.as_deref() == Some(provisional) {
            self.select_most_recent();
        }
        self.clear_safety_net_guard(provisional);
    }

    /// Optimistically apply a partial update, snapshotting the prior value
    /// of every field the patch sets. Returns `None` when the record does
    /// not exist.
    pub fn begin_update(&mut self, id: &str, patch: &ThreadPatch) -> Option<UpdateTicket> {
        let resolved = self.resolve_id(id).to_string();
        let record = self.records.get_mut(&resolved)?;

        let ticket = UpdateTicket {
            record_id: resolved.clone(),
            prior_title: patch.title.as_ref().map(|_| record.title.clone()),
            prior_last_activity: patch.last_activity.map(|_| record.last_activity),
            prior_agent_id: patch.agent_id.as_ref().map(|_| record.agent_id.clone()),
            prior_model_id: patch.model_id.as_ref().map(|_| record.model_id.clone()),
            prior_preview: patch.preview.as_ref().map(|_| record.preview.clone()),
            prior_archived: patch.archived.map(|_| record.archived),
        };

        patch.apply_to(record);
        self.pending.insert(resolved, PendingKind::Update);

        // Archiving the current thread invalidates the selection
        if patch.archived == Some(true)
            && self.current_thread_id.as_deref() == Some(ticket.record_id.as_str())
        {
            self.select_most_recent();
        }

        Some(ticket)
    }

    /// Clear the pending marker after an update persisted.
    pub fn resolve_update(&mut self, id: &str) {
        let resolved = self.resolve_id(id).to_string();
        self.clear_pending(&resolved, PendingKind::Update);
    }

    /// Undo a failed update, restoring exactly the snapshotted fields.
    /// Edits to other fields applied after the mutation began survive.
    pub fn rollback_update(&mut self, ticket: UpdateTicket) {
        let resolved = self.resolve_id(&ticket.record_id).to_string();
        if let Some(record) = self.records.get_mut(&resolved) {
            if let Some(title) = ticket.prior_title {
                record.title = title;
            }
            if let Some(at) = ticket.prior_last_activity {
                record.last_activity = at;
            }
            if let Some(agent_id) = ticket.prior_agent_id {
                record.agent_id = agent_id;
            }
            if let Some(model_id) = ticket.prior_model_id {
                record.model_id = model_id;
            }
            if let Some(preview) = ticket.prior_preview {
                record.preview = preview;
            }
            if let Some(archived) = ticket.prior_archived {
                record.archived = archived;
            }
        }
        self.clear_pending(&resolved, PendingKind::Update);
    }

    /// Optimistically delete a record: it leaves the snapshot at once and,
    /// if it was current, the next most recently active record is
    /// selected. Returns `None` when the record does not exist.
    pub fn begin_delete(&mut self, id: &str) -> Option<DeleteTicket> {
        let resolved = self.resolve_id(id).to_string();
        let record = self.records.remove(&resolved)?;

        let was_current = self.current_thread_id.as_deref() == Some(resolved.as_str());
        let ticket = DeleteTicket {
            record,
            timeline: self.timelines.remove(&resolved).unwrap_or_default(),
            was_current,
            was_running: self.running.remove(&resolved),
        };

        if was_current {
            self.select_most_recent();
        }
        self.pending.insert(resolved, PendingKind::Delete);
        Some(ticket)
    }

    /// Clear delete bookkeeping after the store confirmed.
    pub fn resolve_delete(&mut self, id: &str) {
        let resolved = self.resolve_id(id).to_string();
        self.clear_pending(&resolved, PendingKind::Delete);
        // Drop redirects pointing at the dead record
        self.pending_to_real.retain(|_, real| real != &resolved);
        self.pending_to_real.remove(&resolved);
    }

    /// Undo a failed delete, re-inserting the exact prior record and
    /// restoring it as current when it had been.
    pub fn rollback_delete(&mut self, ticket: DeleteTicket) {
        let id = ticket.record.id.clone();
        self.records.insert(id.clone(), ticket.record);
        self.timelines.insert(id.clone(), ticket.timeline);
        if ticket.was_running {
            self.running.insert(id.clone());
        }
        if ticket.was_current {
            self.current_thread_id = Some(id.clone());
        }
        self.clear_pending(&id, PendingKind::Delete);
    }

    /// Safety net: when the snapshot holds no non-archived record, create
    /// a default one. At most one safety-net creation may be in flight at
    /// a time; repeat calls while it is pending return `None`.
    pub fn ensure_default_record(&mut self, title: &str) -> Option<String> {
        if self.safety_net_create.is_some() {
            return None;
        }
        if self.records.values().any(|r| !r.archived) {
            return None;
        }
        let id = self.begin_create(title, None, None);
        self.safety_net_create = Some(id.clone());
        tracing::debug!(id, "safety net created default thread");
        Some(id)
    }

    /// Generate a provisional message id for streamed placeholders.
    pub(crate) fn provisional_message_id() -> String {
        provisional_id()
    }

    fn clear_pending(&mut self, id: &str, kind: PendingKind) {
        // A newer operation supersedes the marker; only clear our own
        if self.pending.get(id) == Some(&kind) {
            self.pending.remove(id);
        }
    }

    fn clear_safety_net_guard(&mut self, provisional: &str) {
        if self.safety_net_create.as_deref() == Some(provisional) {
            self.safety_net_create = None;
        }
    }
}
