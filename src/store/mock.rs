//! Mock record store for testing.
//!
//! Provides a configurable in-memory store that records every call and can
//! inject failures, letting tests drive the optimistic cache through
//! confirm and rollback paths without network access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ThreadPatch, ThreadRecord};
use crate::traits::RecordStore;

/// Kind of store call, for verification in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCallKind {
    List,
    Create,
    Update,
    Delete,
}

/// A recorded store call.
#[derive(Debug, Clone)]
pub struct StoreCall {
    pub kind: StoreCallKind,
    /// Target record id (absent for list; provisional id for create)
    pub id: Option<String>,
}

#[derive(Debug, Default)]
struct MockInner {
    records: HashMap<String, ThreadRecord>,
    calls: Vec<StoreCall>,
    next_id: u64,
    fail_creates: usize,
    fail_updates: usize,
    fail_deletes: usize,
    fail_lists: usize,
    active: usize,
    max_active: usize,
}

/// In-memory [`RecordStore`] with failure injection and call recording.
///
/// # Example
///
/// ```ignore
/// let store = MockRecordStore::new();
/// store.fail_next_update();
/// // ... drive the engine; the next update call returns a 500
/// assert_eq!(store.calls().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockRecordStore {
    inner: Arc<Mutex<MockInner>>,
    /// Artificial latency per call, to widen overlap windows in tests
    latency: Duration,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add per-call latency so concurrency bugs have room to show up.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Seed the server-side state with existing records.
    pub fn with_records(self, records: Vec<ThreadRecord>) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            for record in records {
                inner.records.insert(record.id.clone(), record);
            }
        }
        self
    }

    /// Make the next create call fail with a server error.
    pub fn fail_next_create(&self) {
        self.inner.lock().unwrap().fail_creates += 1;
    }

    /// Make the next update call fail with a server error.
    pub fn fail_next_update(&self) {
        self.inner.lock().unwrap().fail_updates += 1;
    }

    /// Make the next delete call fail with a server error.
    pub fn fail_next_delete(&self) {
        self.inner.lock().unwrap().fail_deletes += 1;
    }

    /// Make the next list call fail with a server error.
    pub fn fail_next_list(&self) {
        self.inner.lock().unwrap().fail_lists += 1;
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Current server-side records.
    pub fn records(&self) -> Vec<ThreadRecord> {
        self.inner.lock().unwrap().records.values().cloned().collect()
    }

    /// Number of server-side records.
    pub fn record_count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Highest number of concurrently in-flight calls observed.
    ///
    /// Stays at 1 when the sync queue serializes correctly.
    pub fn max_concurrent_calls(&self) -> usize {
        self.inner.lock().unwrap().max_active
    }

    fn injected_failure() -> StoreError {
        StoreError::Status {
            status: 500,
            message: "injected failure".to_string(),
        }
    }

    fn begin_call(&self, kind: StoreCallKind, id: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StoreCall { kind, id });
        inner.active += 1;
        if inner.active > inner.max_active {
            inner.max_active = inner.active;
        }
    }

    fn end_call(&self) {
        self.inner.lock().unwrap().active -= 1;
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn list(&self) -> Result<Vec<ThreadRecord>, StoreError> {
        self.begin_call(StoreCallKind::List, None);
        self.simulate_latency().await;
        let result = {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_lists > 0 {
                inner.fail_lists -= 1;
                Err(Self::injected_failure())
            } else {
                Ok(inner.records.values().cloned().collect())
            }
        };
        self.end_call();
        result
    }

    async fn create(&self, record: &ThreadRecord) -> Result<String, StoreError> {
        self.begin_call(StoreCallKind::Create, Some(record.id.clone()));
        self.simulate_latency().await;
        let result = {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_creates > 0 {
                inner.fail_creates -= 1;
                Err(Self::injected_failure())
            } else {
                inner.next_id += 1;
                let server_id = format!("thr-{}", inner.next_id);
                let mut stored = record.clone();
                stored.id = server_id.clone();
                inner.records.insert(server_id.clone(), stored);
                Ok(server_id)
            }
        };
        self.end_call();
        result
    }

    async fn update(&self, id: &str, patch: &ThreadPatch) -> Result<(), StoreError> {
        self.begin_call(StoreCallKind::Update, Some(id.to_string()));
        self.simulate_latency().await;
        let result = {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_updates > 0 {
                inner.fail_updates -= 1;
                Err(Self::injected_failure())
            } else {
                // Update of an absent record is idempotent-safe success
                if let Some(record) = inner.records.get_mut(id) {
                    patch.apply_to(record);
                }
                Ok(())
            }
        };
        self.end_call();
        result
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.begin_call(StoreCallKind::Delete, Some(id.to_string()));
        self.simulate_latency().await;
        let result = {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_deletes > 0 {
                inner.fail_deletes -= 1;
                Err(Self::injected_failure())
            } else {
                // Delete of an absent record is idempotent-safe success
                inner.records.remove(id);
                Ok(())
            }
        };
        self.end_call();
        result
    }
}
