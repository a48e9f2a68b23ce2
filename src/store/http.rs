//! HTTP client for the authoritative record store.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::StoreError;
use crate::models::{
    AckResponse, CreateRecordBody, CreateRecordResponse, ListRecordsResponse, ThreadPatch,
    ThreadRecord,
};
use crate::traits::RecordStore;

/// Thin request/response wrapper for thread record CRUD against the
/// backend's `/v1/threads` endpoints.
pub struct HttpRecordStore {
    /// Base URL for the record store API
    pub base_url: String,
    /// Reusable HTTP client
    client: Client,
}

impl HttpRecordStore {
    /// Create a store client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn threads_url(&self) -> String {
        format!("{}/v1/threads", self.base_url)
    }

    fn thread_url(&self, id: &str) -> String {
        format!("{}/v1/threads/{}", self.base_url, id)
    }

    async fn error_for(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        StoreError::Status { status, message }
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn list(&self) -> Result<Vec<ThreadRecord>, StoreError> {
        let response = self.client.get(self.threads_url()).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let body: ListRecordsResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(body.threads)
    }

    async fn create(&self, record: &ThreadRecord) -> Result<String, StoreError> {
        let body = CreateRecordBody::from(record);
        let response = self
            .client
            .post(self.threads_url())
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let created: CreateRecordResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(created.id)
    }

    async fn update(&self, id: &str, patch: &ThreadPatch) -> Result<(), StoreError> {
        let response = self
            .client
            .patch(self.thread_url(id))
            .json(patch)
            .send()
            .await?;
        // A retried update against an already-deleted record is success
        if response.status().as_u16() == 404 {
            tracing::debug!(id, "update on absent record treated as success");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let _ack: AckResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self.client.delete(self.thread_url(id)).send().await?;
        // A retried delete against an already-deleted record is success
        if response.status().as_u16() == 404 {
            tracing::debug!(id, "delete on absent record treated as success");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let _ack: AckResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(())
    }
}
