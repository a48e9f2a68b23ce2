//! Reconciling thread cache.
//!
//! Holds the client-visible snapshot of all thread records, the current
//! thread selection, per-record pending-operation state, and the message
//! timelines. Mutations apply instantly to the snapshot; the engine layer
//! persists them asynchronously and feeds confirmations or rollbacks back
//! through the operations in [`record`](self) and [`merge`](self).

mod merge;
mod record;
mod timeline;

pub use merge::MergeStats;
pub use record::{DeleteTicket, UpdateTicket};

use std::collections::{HashMap, HashSet};

use crate::models::{ThreadRecord, TimelineItem};

/// Kind of in-flight, unconfirmed mutation on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Create,
    Update,
    Delete,
}

/// The client-visible cache snapshot.
///
/// Mutated only through its operations, each of which is a single
/// synchronous state transition; the asynchronous persistence tail lives
/// in the engine. Consumers sort by `last_activity` descending via the
/// view methods.
#[derive(Debug, Default)]
pub struct ThreadCache {
    /// All known records, keyed by id
    pub(crate) records: HashMap<String, ThreadRecord>,
    /// Currently selected thread, if any
    pub(crate) current_thread_id: Option<String>,
    /// Owner of every record in this cache
    pub(crate) owner_id: String,
    /// At most one pending operation per record id
    pub(crate) pending: HashMap<String, PendingKind>,
    /// Message timelines, keyed by thread id
    pub(crate) timelines: HashMap<String, Vec<TimelineItem>>,
    /// Threads with a response currently being produced
    pub(crate) running: HashSet<String>,
    /// Mapping from provisional ids to confirmed server ids, so stream
    /// updates addressed with a stale provisional id land on the right
    /// thread after confirmation.
    pub(crate) pending_to_real: HashMap<String, String>,
    /// Provisional id of the safety-net create currently in flight, if any
    pub(crate) safety_net_create: Option<String>,
}

impl ThreadCache {
    /// Create an empty cache for the given owner.
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Self::default()
        }
    }

    /// Owner id all records belong to.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Active (non-archived) records, most recent activity first.
    pub fn threads(&self) -> Vec<&ThreadRecord> {
        let mut records: Vec<&ThreadRecord> =
            self.records.values().filter(|r| !r.archived).collect();
        records.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        records
    }

    /// Archived records, most recent activity first.
    pub fn archived_threads(&self) -> Vec<&ThreadRecord> {
        let mut records: Vec<&ThreadRecord> =
            self.records.values().filter(|r| r.archived).collect();
        records.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        records
    }

    /// Get a record by id, following provisional-id redirects.
    pub fn get(&self, id: &str) -> Option<&ThreadRecord> {
        self.records.get(self.resolve_id(id))
    }

    /// Id of the currently selected thread.
    pub fn current_thread_id(&self) -> Option<&str> {
        self.current_thread_id.as_deref()
    }

    /// The currently selected record, if any.
    pub fn current_thread(&self) -> Option<&ThreadRecord> {
        self.current_thread_id
            .as_deref()
            .and_then(|id| self.records.get(id))
    }

    /// Number of cached records, archived included.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Whether any record has an in-flight mutation.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The pending operation on a record, if any.
    pub fn pending_kind(&self, id: &str) -> Option<PendingKind> {
        self.pending.get(self.resolve_id(id)).copied()
    }

    /// Resolve an id, following the provisional-to-server mapping when the
    /// record was confirmed under a different id.
    pub(crate) fn resolve_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.pending_to_real
            .get(id)
            .map(|s| s.as_str())
            .unwrap_or(id)
    }

    /// Point the current selection at the most recently active non-archived
    /// record, or clear it when none remain.
    pub(crate) fn select_most_recent(&mut self) {
        let next = self.threads().first().map(|record| record.id.clone());
        self.current_thread_id = next;
    }

    /// Switch the current thread. Only existing, non-archived records are
    /// valid targets.
    pub fn switch_current(&mut self, id: &str) -> bool {
        let resolved = self.resolve_id(id).to_string();
        match self.records.get(&resolved) {
            Some(record) if !record.archived => {
                self.current_thread_id = Some(resolved);
                true
            }
            _ => false,
        }
    }
}
