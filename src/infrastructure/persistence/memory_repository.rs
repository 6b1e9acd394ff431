//! In-memory implementation of the short URL repository.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::entities::{DeleteOutcome, NewShortUrl, OwnerId, Saved, ShortUrl};
use crate::domain::repositories::{Operation, ShortUrlRepository, StoreError, StoreResult};
use crate::infrastructure::persistence::record_index::RecordIndex;
use crate::utils::uid_codec::UidCodec;

/// Repository keeping every record in process memory.
///
/// All indexes sit behind one reader/writer lock; `save` checks for a
/// duplicate and inserts while holding the write lock. Contents are lost on
/// restart.
pub struct MemoryRepository {
    index: RwLock<RecordIndex>,
    codec: Arc<UidCodec>,
}

impl MemoryRepository {
    pub fn new(codec: Arc<UidCodec>) -> Self {
        Self {
            index: RwLock::new(RecordIndex::new()),
            codec,
        }
    }

    /// Number of records ever created, deleted ones included.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}

#[async_trait]
impl ShortUrlRepository for MemoryRepository {
    async fn find_by_code(&self, code: &str) -> StoreResult<Option<ShortUrl>> {
        Ok(self.index.read().find_by_code(code))
    }

    async fn find_all_by_owner(&self, owner_id: &OwnerId) -> StoreResult<Vec<ShortUrl>> {
        Ok(self.index.read().find_all_by_owner(owner_id))
    }

    async fn find_all_by_owner_and_codes(
        &self,
        owner_id: &OwnerId,
        codes: &[String],
    ) -> StoreResult<Vec<ShortUrl>> {
        Ok(self
            .index
            .read()
            .find_all_by_owner_and_codes(owner_id, codes))
    }

    async fn save(&self, new_url: NewShortUrl) -> StoreResult<Saved> {
        self.batch_save(vec![new_url])
            .await?
            .pop()
            .ok_or_else(|| StoreError::storage(Operation::Save, "save produced no result"))
    }

    async fn batch_save(&self, new_urls: Vec<NewShortUrl>) -> StoreResult<Vec<Saved>> {
        let mut index = self.index.write();

        let plan = index.plan_save(new_urls, &self.codec)?;
        for record in plan.created {
            index.apply(record);
        }

        Ok(plan.results)
    }

    async fn batch_soft_delete(&self, records: &[ShortUrl]) -> StoreResult<DeleteOutcome> {
        if records.is_empty() {
            return Ok(DeleteOutcome::NothingToDelete);
        }

        let mut index = self.index.write();

        let pending = index.plan_soft_delete(records);
        let deleted = pending.len();
        for record in pending {
            index.apply(record);
        }

        Ok(DeleteOutcome::Deleted(deleted))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
