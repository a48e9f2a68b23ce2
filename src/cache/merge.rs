//! Authoritative snapshot merging.

use std::collections::HashSet;

use crate::models::ThreadRecord;

use super::ThreadCache;

/// What a merge changed, for logging and engine events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl MergeStats {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

impl ThreadCache {
    /// Reconcile a full server snapshot into the local one without
    /// discarding unconfirmed local edits.
    ///
    /// Rules:
    /// - records with a pending operation are left untouched (local wins);
    /// - other local records are overwritten with the server version, or
    ///   removed when the server no longer has them;
    /// - unseen server records are inserted, unless their id has a pending
    ///   operation (a delete in flight must not resurrect the record);
    /// - local-only records that are still `pending:create` survive even
    ///   though the server response does not know them yet.
    ///
    /// The current selection self-heals if its record went away.
    pub fn merge_authoritative(&mut self, server_records: Vec<ThreadRecord>) -> MergeStats {
        let mut stats = MergeStats::default();
        let server_ids: HashSet<String> =
            server_records.iter().map(|r| r.id.clone()).collect();

        for record in server_records {
            if self.pending.contains_key(&record.id) {
                continue;
            }
            match self.records.insert(record.id.clone(), record) {
                Some(_) => stats.updated += 1,
                None => stats.added += 1,
            }
        }

        // Local records the server no longer has, and that carry no
        // in-flight operation, were deleted elsewhere.
        let stale: Vec<String> = self
            .records
            .keys()
            .filter(|id| !server_ids.contains(*id) && !self.pending.contains_key(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.records.remove(id);
            self.timelines.remove(id);
            self.running.remove(id);
            stats.removed += 1;
        }

        let current_valid = self
            .current_thread()
            .map(|record| !record.archived)
            .unwrap_or(false);
        if !current_valid {
            self.select_most_recent();
        }

        if !stats.is_noop() {
            tracing::debug!(
                added = stats.added,
                updated = stats.updated,
                removed = stats.removed,
                "merged authoritative snapshot"
            );
        }
        stats
    }
}
