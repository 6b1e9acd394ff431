//! Background deletion pipeline.
//!
//! Delete requests are validated and resolved in short-lived tasks, then the
//! resolved records travel over a bounded channel to a single worker that
//! buffers them and applies them in batches.
//!
//! # Flush triggers
//!
//! - the buffer reaches `max_batch_size`
//! - no record arrived for `idle_timeout`
//! - an explicit [`DeletionPipeline::flush`] or [`DeletionPipeline::shutdown`]
//!
//! Each store call carries at most `max_batch_size` records. A failed flush
//! keeps the buffer and turns the size trigger off, so the retry happens on
//! the next idle tick or explicit flush. While flushes keep failing the buffer
//! is capped at `max_pending`, dropping the oldest records first. If the
//! worker panics, the supervisor logs it and starts a new worker with an empty
//! buffer; the records the old buffer held are lost.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

use crate::domain::deletion_event::{DeletionEvent, DeletionSettings};
use crate::domain::entities::{DeleteOutcome, OwnerId, ShortUrl};
use crate::domain::repositories::ShortUrlRepository;
use crate::utils::uid_codec::UidCodec;

type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<DeletionEvent>>>;

/// Handle to the deletion worker.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct DeletionPipeline {
    sender: Mutex<Option<mpsc::Sender<DeletionEvent>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    repo: Arc<dyn ShortUrlRepository>,
    codec: Arc<UidCodec>,
    resolve_timeout: Duration,
}

impl DeletionPipeline {
    /// Starts the supervisor and its worker on the current runtime.
    pub fn start(
        repo: Arc<dyn ShortUrlRepository>,
        codec: Arc<UidCodec>,
        settings: DeletionSettings,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let resolve_timeout = settings.resolve_timeout;

        let supervisor = tokio::spawn(supervise(receiver, Arc::clone(&repo), settings));

        Self {
            sender: Mutex::new(Some(sender)),
            supervisor: Mutex::new(Some(supervisor)),
            repo,
            codec,
            resolve_timeout,
        }
    }

    /// Queues deletion of `codes` on behalf of `owner_id` and returns at once.
    ///
    /// The returned task validates every code, resolves the owner's records and
    /// hands them to the worker. A single malformed code drops the whole
    /// request. Codes the owner does not own are never resolved. Callers may
    /// ignore the handle.
    pub fn push(&self, codes: Vec<String>, owner_id: OwnerId) -> JoinHandle<()> {
        let sender = self.sender.lock().clone();
        let repo = Arc::clone(&self.repo);
        let codec = Arc::clone(&self.codec);
        let resolve_timeout = self.resolve_timeout;

        tokio::spawn(async move {
            let Some(sender) = sender else {
                warn!("Deletion pipeline is shut down, dropping request of {}", owner_id);
                return;
            };

            if codes.is_empty() {
                return;
            }

            if let Some(invalid) = codes.iter().find(|code| !codec.is_valid(code)) {
                debug!(
                    "Dropping delete request of {}: malformed code '{}'",
                    owner_id, invalid
                );
                return;
            }

            let lookup = repo.find_all_by_owner_and_codes(&owner_id, &codes);
            let records = match timeout(resolve_timeout, lookup).await {
                Ok(Ok(records)) => records,
                Ok(Err(e)) => {
                    warn!("Failed to resolve delete request of {}: {}", owner_id, e);
                    return;
                }
                Err(_) => {
                    warn!(
                        "Resolving delete request of {} timed out after {:?}",
                        owner_id, resolve_timeout
                    );
                    return;
                }
            };

            for record in records.into_iter().filter(|record| !record.deleted) {
                if sender.send(DeletionEvent::Delete(record)).await.is_err() {
                    warn!("Deletion worker is gone, dropping request of {}", owner_id);
                    return;
                }
            }
        })
    }

    /// Asks the worker to flush its buffer and waits until it did.
    pub async fn flush(&self) {
        let Some(sender) = self.sender.lock().clone() else {
            return;
        };

        let (ack, done) = oneshot::channel();
        if sender.send(DeletionEvent::Flush(ack)).await.is_err() {
            return;
        }
        // A dropped ack means the worker crashed mid-flush.
        let _ = done.await;
    }

    /// Closes the channel and waits for the worker to flush and exit.
    ///
    /// Requests still resolving keep the channel open until they are queued.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());

        let supervisor = self.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            if let Err(e) = supervisor.await {
                error!("Deletion supervisor failed: {}", e);
            }
        }
    }
}

async fn supervise(
    receiver: SharedReceiver,
    repo: Arc<dyn ShortUrlRepository>,
    settings: DeletionSettings,
) {
    loop {
        let worker = tokio::spawn(run_deletion_worker(
            Arc::clone(&receiver),
            Arc::clone(&repo),
            settings.clone(),
        ));

        match worker.await {
            Ok(()) => {
                info!("Deletion worker stopped");
                return;
            }
            Err(e) if e.is_panic() => {
                error!("Deletion worker panicked, restarting: {}", e);
                metrics::counter!("shorturl_deletion_worker_restarts_total").increment(1);
            }
            Err(e) => {
                error!("Deletion worker cancelled: {}", e);
                return;
            }
        }
    }
}

async fn run_deletion_worker(
    receiver: SharedReceiver,
    repo: Arc<dyn ShortUrlRepository>,
    settings: DeletionSettings,
) {
    let mut receiver = receiver.lock().await;
    let mut buffer: Vec<ShortUrl> = Vec::new();
    // Set after a failed flush; the size trigger stays off until a flush succeeds.
    let mut failing = false;

    let idle = tokio::time::sleep(settings.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            event = receiver.recv() => match event {
                Some(DeletionEvent::Delete(record)) => {
                    buffer.push(record);
                    drop_oldest(&mut buffer, settings.max_pending);

                    if !failing {
                        if buffer.len() >= settings.max_batch_size {
                            failing = !flush_buffer(repo.as_ref(), &mut buffer, &settings).await;
                        }
                        idle.as_mut().reset(Instant::now() + settings.idle_timeout);
                    }
                }
                Some(DeletionEvent::Flush(ack)) => {
                    failing = !flush_buffer(repo.as_ref(), &mut buffer, &settings).await;
                    let _ = ack.send(());
                }
                None => {
                    flush_buffer(repo.as_ref(), &mut buffer, &settings).await;
                    if !buffer.is_empty() {
                        warn!("Dropping {} pending deletions on shutdown", buffer.len());
                    }
                    return;
                }
            },
            () = &mut idle => {
                failing = !flush_buffer(repo.as_ref(), &mut buffer, &settings).await;
                idle.as_mut().reset(Instant::now() + settings.idle_timeout);
            }
        }
    }
}

/// Applies the buffer in batches of at most `max_batch_size` records.
///
/// Stops at the first failing batch, which stays buffered together with
/// everything after it. Returns `false` if a batch failed.
async fn flush_buffer(
    repo: &dyn ShortUrlRepository,
    buffer: &mut Vec<ShortUrl>,
    settings: &DeletionSettings,
) -> bool {
    while !buffer.is_empty() {
        let size = buffer.len().min(settings.max_batch_size);

        let result = timeout(settings.flush_timeout, repo.batch_soft_delete(&buffer[..size])).await;

        match result {
            Ok(Ok(outcome)) => {
                if let DeleteOutcome::Deleted(count) = outcome {
                    debug!("Flushed {} deletions ({} queued)", count, size);
                    metrics::counter!("shorturl_deletion_flushed_total").increment(count as u64);
                }
                buffer.drain(..size);
            }
            Ok(Err(e)) => {
                error!("Failed to flush {} deletions: {}", size, e);
                metrics::counter!("shorturl_deletion_flush_failures_total").increment(1);
                return false;
            }
            Err(_) => {
                error!(
                    "Flushing {} deletions timed out after {:?}",
                    size, settings.flush_timeout
                );
                metrics::counter!("shorturl_deletion_flush_failures_total").increment(1);
                return false;
            }
        }
    }

    true
}

fn drop_oldest(buffer: &mut Vec<ShortUrl>, max_pending: usize) {
    if buffer.len() <= max_pending {
        return;
    }

    let excess = buffer.len() - max_pending;
    buffer.drain(..excess);
    warn!("Deletion buffer is full, dropped {} oldest records", excess);
    metrics::counter!("shorturl_deletion_dropped_total").increment(excess as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::{MockShortUrlRepository, Operation, StoreError};
    use crate::utils::uid_codec::UidStrategy;
    use uuid::Uuid;

    fn codec() -> Arc<UidCodec> {
        Arc::new(UidCodec::new("worker salt", 5, UidStrategy::Sequential).unwrap())
    }

    fn record(id: i64, code: &str, owner: OwnerId) -> ShortUrl {
        ShortUrl::new(id, code.to_string(), format!("https://{id}.example/"), owner)
    }

    #[tokio::test]
    async fn test_push_with_malformed_code_skips_lookup() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_find_all_by_owner_and_codes().never();
        mock.expect_batch_soft_delete().never();

        let pipeline =
            DeletionPipeline::start(Arc::new(mock), codec(), DeletionSettings::default());

        pipeline
            .push(
                vec!["abcdef".to_string(), "not-a-real-code!".to_string()],
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_push_resolves_for_owner_and_flushes() {
        let owner = Uuid::new_v4();
        let resolved = vec![record(1, "abcdef", owner)];
        let expected = resolved.clone();

        let mut mock = MockShortUrlRepository::new();
        mock.expect_find_all_by_owner_and_codes()
            .withf(move |o, codes| *o == owner && codes.len() == 1 && codes[0] == "abcdef")
            .times(1)
            .returning(move |_, _| Ok(resolved.clone()));
        mock.expect_batch_soft_delete()
            .withf(move |records| records == expected.as_slice())
            .times(1)
            .returning(|records| Ok(DeleteOutcome::Deleted(records.len())));

        let pipeline =
            DeletionPipeline::start(Arc::new(mock), codec(), DeletionSettings::default());

        pipeline
            .push(vec!["abcdef".to_string()], owner)
            .await
            .unwrap();
        pipeline.flush().await;
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_buffer_for_retry() {
        let owner = Uuid::new_v4();
        let resolved = vec![record(1, "abcdef", owner)];

        let mut mock = MockShortUrlRepository::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_find_all_by_owner_and_codes()
            .returning(move |_, _| Ok(resolved.clone()));
        mock.expect_batch_soft_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::storage(Operation::Delete, "disk full")));
        mock.expect_batch_soft_delete()
            .withf(|records| records.len() == 1)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|records| Ok(DeleteOutcome::Deleted(records.len())));

        let pipeline =
            DeletionPipeline::start(Arc::new(mock), codec(), DeletionSettings::default());

        pipeline
            .push(vec!["abcdef".to_string()], owner)
            .await
            .unwrap();
        pipeline.flush().await;
        pipeline.flush().await;
        pipeline.shutdown().await;
    }

    #[test]
    fn test_drop_oldest_keeps_newest_records() {
        let owner = Uuid::new_v4();
        let mut buffer: Vec<ShortUrl> = (1..=5)
            .map(|id| record(id, &format!("code{id}"), owner))
            .collect();

        drop_oldest(&mut buffer, 3);

        let ids: Vec<i64> = buffer.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_push_after_shutdown_is_dropped() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_find_all_by_owner_and_codes().never();

        let pipeline =
            DeletionPipeline::start(Arc::new(mock), codec(), DeletionSettings::default());
        pipeline.shutdown().await;

        pipeline
            .push(vec!["abcdef".to_string()], Uuid::new_v4())
            .await
            .unwrap();
    }
}
