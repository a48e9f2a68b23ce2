//! Record store trait abstraction.
//!
//! Abstracts the authoritative backend's CRUD surface so the engine can be
//! exercised against an in-memory store in tests and the HTTP store in
//! production.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ThreadPatch, ThreadRecord};

/// CRUD operations against the authoritative thread record store.
///
/// Implementations must treat `update`/`delete` of an already-absent
/// record as success, so retried calls stay idempotent-safe.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the full authoritative record list for the signed-in user.
    async fn list(&self) -> Result<Vec<ThreadRecord>, StoreError>;

    /// Create a record; returns the server-assigned id.
    ///
    /// The record's provisional id is not sent; the store owns id
    /// assignment for confirmed records.
    async fn create(&self, record: &ThreadRecord) -> Result<String, StoreError>;

    /// Apply a partial update to a record.
    async fn update(&self, id: &str, patch: &ThreadPatch) -> Result<(), StoreError>;

    /// Delete a record.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
