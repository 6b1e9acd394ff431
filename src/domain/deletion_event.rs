//! Messages and settings for the asynchronous deletion pipeline.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::domain::entities::ShortUrl;

/// Message passed from request tasks to the deletion worker.
///
/// Request handlers never touch the worker's buffer directly; everything goes
/// through the pipeline channel.
#[derive(Debug)]
pub enum DeletionEvent {
    /// A resolved record the owner asked to delete.
    Delete(ShortUrl),
    /// Flush the buffer now and acknowledge once done.
    Flush(oneshot::Sender<()>),
}

/// Tuning knobs of [`crate::domain::deletion_worker::DeletionPipeline`].
#[derive(Debug, Clone)]
pub struct DeletionSettings {
    /// Buffer size that triggers an immediate flush.
    pub max_batch_size: usize,
    /// Silence after which whatever is buffered gets flushed.
    pub idle_timeout: Duration,
    /// Bound for validating and resolving one delete request.
    pub resolve_timeout: Duration,
    /// Bound for a single `batch_soft_delete` call.
    pub flush_timeout: Duration,
    /// Capacity of the channel between request tasks and the worker.
    pub queue_capacity: usize,
    /// Most records the worker holds while flushes keep failing; the oldest
    /// are dropped beyond it. Never below `max_batch_size`.
    pub max_pending: usize,
}

impl Default for DeletionSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            idle_timeout: Duration::from_secs(5),
            resolve_timeout: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(5),
            queue_capacity: 10_000,
            max_pending: 10_000,
        }
    }
}

impl DeletionSettings {
    /// Settings with the given size and idle triggers, other fields defaulted.
    pub fn new(max_batch_size: usize, idle_timeout: Duration) -> Self {
        let defaults = Self::default();
        let max_batch_size = max_batch_size.max(1);

        Self {
            max_batch_size,
            idle_timeout,
            max_pending: defaults.max_pending.max(max_batch_size),
            ..defaults
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(self.max_batch_size);
        self
    }
}
