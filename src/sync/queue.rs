//! FIFO, single-consumer queue for outbound persistence calls.
//!
//! Every optimistic mutation enqueues its network tail here. A single
//! drain loop, guarded by a draining flag, awaits tasks strictly in
//! arrival order, so at most one store mutation is outstanding at any
//! instant. That eliminates write-write races against the authoritative
//! store for the whole cache, trading throughput for strict serialization.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::SyncResult;

type QueueTask = Pin<Box<dyn Future<Output = SyncResult<()>> + Send>>;

#[derive(Default)]
struct QueueInner {
    tasks: VecDeque<QueueTask>,
    draining: bool,
}

/// Ordered queue with a single logical worker.
#[derive(Clone, Default)]
pub struct SyncQueue {
    inner: Arc<Mutex<QueueInner>>,
    idle: Arc<Notify>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task. If no drain loop is active, one is spawned; an
    /// enqueue while draining never spawns a second loop.
    pub fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = SyncResult<()>> + Send + 'static,
    {
        let start_drain = {
            let mut inner = self.inner.lock().unwrap();
            inner.tasks.push_back(Box::pin(task));
            if inner.draining {
                false
            } else {
                inner.draining = true;
                true
            }
        };

        if start_drain {
            let inner = Arc::clone(&self.inner);
            let idle = Arc::clone(&self.idle);
            tokio::spawn(Self::drain(inner, idle));
        }
    }

    async fn drain(inner: Arc<Mutex<QueueInner>>, idle: Arc<Notify>) {
        loop {
            let task = {
                let mut guard = inner.lock().unwrap();
                match guard.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        guard.draining = false;
                        drop(guard);
                        idle.notify_waiters();
                        return;
                    }
                }
            };

            // A failing task must not halt the queue
            if let Err(err) = task.await {
                tracing::warn!("sync task failed: {err}");
            }
        }
    }

    /// Number of tasks waiting behind the one currently running.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }

    /// True when no task is queued or running.
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.tasks.is_empty() && !inner.draining
    }

    /// Wait until every enqueued task has run and the drain loop parked.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register for the wakeup before re-checking, so a drain that
            // finishes in between cannot be missed
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}
