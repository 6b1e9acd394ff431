//! Append-only file implementation of the short URL repository.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::domain::entities::{DeleteOutcome, NewShortUrl, OwnerId, Saved, ShortUrl};
use crate::domain::repositories::{Operation, ShortUrlRepository, StoreError, StoreResult};
use crate::infrastructure::persistence::record_index::RecordIndex;
use crate::utils::uid_codec::UidCodec;

/// Repository persisting records as JSON lines in a single log file.
///
/// The log is the source of truth. Each created record is appended as one
/// line; a soft delete appends the record again with `deleted: true`. On open
/// the log is replayed into an in-memory [`RecordIndex`] which serves all
/// lookups afterwards.
///
/// A write appends all lines of one call in a single buffer and syncs it
/// before the index is touched, so a failed write leaves lookups unchanged.
/// Bytes of a failed write are cut off again, so later lines never land
/// behind a fragment.
pub struct FileRepository {
    path: PathBuf,
    state: RwLock<FileState>,
    codec: Arc<UidCodec>,
}

struct FileState {
    index: RecordIndex,
    log: LogFile,
}

/// Append handle that knows where the last complete write ended.
struct LogFile {
    file: File,
    committed_len: u64,
}

impl FileRepository {
    /// Opens (or creates) the log at `path` and replays it.
    ///
    /// A torn final line left by an interrupted write is cut off the file;
    /// any other malformed line fails the open.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the file cannot be read, parsed or
    /// opened for appending.
    pub async fn open(path: impl AsRef<Path>, codec: Arc<UidCodec>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StoreError::storage(Operation::Find, e)),
        };

        let Replayed { index, torn_tail } = replay(&content)?;
        info!(
            "Loaded {} short URLs from {}",
            index.len(),
            path.display()
        );

        let mut committed_len = content.len() as u64;
        if torn_tail {
            let valid_len = content.rfind('\n').map_or(0, |pos| pos + 1);
            let file = OpenOptions::new()
                .write(true)
                .open(&path)
                .await
                .map_err(|e| StoreError::storage(Operation::Save, e))?;
            file.set_len(valid_len as u64)
                .await
                .map_err(|e| StoreError::storage(Operation::Save, e))?;
            committed_len = valid_len as u64;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::storage(Operation::Save, e))?;

        if !torn_tail && !content.is_empty() && !content.ends_with('\n') {
            file.write_all(b"\n")
                .await
                .map_err(|e| StoreError::storage(Operation::Save, e))?;
            committed_len += 1;
        }

        let log = LogFile {
            file,
            committed_len,
        };

        Ok(Self {
            path,
            state: RwLock::new(FileState { index, log }),
            codec,
        })
    }
}

struct Replayed {
    index: RecordIndex,
    /// The last line was cut short by an interrupted write.
    torn_tail: bool,
}

fn replay(content: &str) -> StoreResult<Replayed> {
    let mut index = RecordIndex::new();
    let mut torn_tail = false;
    let lines: Vec<&str> = content.lines().collect();
    let last = lines.len().saturating_sub(1);

    for (number, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ShortUrl>(line) {
            Ok(record) => index.apply(record),
            Err(e) if number == last && !content.ends_with('\n') => {
                warn!("Dropping torn record at end of log: {}", e);
                torn_tail = true;
            }
            Err(e) => {
                return Err(StoreError::storage(
                    Operation::Find,
                    format!("malformed record on line {}: {}", number + 1, e),
                ));
            }
        }
    }

    Ok(Replayed { index, torn_tail })
}

impl LogFile {
    /// Appends one line per record and syncs them as a single write.
    ///
    /// On failure the file is cut back to the last committed length.
    async fn append(&mut self, records: &[ShortUrl], op: Operation) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record).map_err(|e| StoreError::storage(op, e))?;
            buffer.push(b'\n');
        }

        self.discard_uncommitted(op).await?;

        let written = async {
            self.file.write_all(&buffer).await?;
            self.file.flush().await?;
            self.file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            if let Err(truncate) = self.file.set_len(self.committed_len).await {
                error!(
                    "Failed to cut log back to {} bytes after a failed write: {}",
                    self.committed_len, truncate
                );
            }
            return Err(StoreError::storage(op, e));
        }

        self.committed_len += buffer.len() as u64;
        Ok(())
    }

    /// Cuts off bytes a failed write left behind the last committed line.
    async fn discard_uncommitted(&mut self, op: Operation) -> StoreResult<()> {
        let len = self
            .file
            .metadata()
            .await
            .map_err(|e| StoreError::storage(op, e))?
            .len();

        if len > self.committed_len {
            warn!(
                "Discarding {} uncommitted bytes at end of log",
                len - self.committed_len
            );
            self.file
                .set_len(self.committed_len)
                .await
                .map_err(|e| StoreError::storage(op, e))?;
        }

        Ok(())
    }
}

#[async_trait]
impl ShortUrlRepository for FileRepository {
    async fn find_by_code(&self, code: &str) -> StoreResult<Option<ShortUrl>> {
        Ok(self.state.read().await.index.find_by_code(code))
    }

    async fn find_all_by_owner(&self, owner_id: &OwnerId) -> StoreResult<Vec<ShortUrl>> {
        Ok(self.state.read().await.index.find_all_by_owner(owner_id))
    }

    async fn find_all_by_owner_and_codes(
        &self,
        owner_id: &OwnerId,
        codes: &[String],
    ) -> StoreResult<Vec<ShortUrl>> {
        Ok(self
            .state
            .read()
            .await
            .index
            .find_all_by_owner_and_codes(owner_id, codes))
    }

    async fn save(&self, new_url: NewShortUrl) -> StoreResult<Saved> {
        self.batch_save(vec![new_url])
            .await?
            .pop()
            .ok_or_else(|| StoreError::storage(Operation::Save, "save produced no result"))
    }

    async fn batch_save(&self, new_urls: Vec<NewShortUrl>) -> StoreResult<Vec<Saved>> {
        let mut state = self.state.write().await;
        let FileState { index, log } = &mut *state;

        let plan = index.plan_save(new_urls, &self.codec)?;
        log.append(&plan.created, Operation::Save).await?;

        for record in plan.created {
            index.apply(record);
        }

        Ok(plan.results)
    }

    async fn batch_soft_delete(&self, records: &[ShortUrl]) -> StoreResult<DeleteOutcome> {
        if records.is_empty() {
            return Ok(DeleteOutcome::NothingToDelete);
        }

        let mut state = self.state.write().await;
        let FileState { index, log } = &mut *state;

        let pending = index.plan_soft_delete(records);
        log.append(&pending, Operation::Delete).await?;

        let deleted = pending.len();
        for record in pending {
            index.apply(record);
        }

        Ok(DeleteOutcome::Deleted(deleted))
    }

    async fn ping(&self) -> StoreResult<()> {
        fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::storage(Operation::Ping, e))
    }
}
