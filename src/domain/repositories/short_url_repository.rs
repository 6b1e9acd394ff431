//! Repository trait for short URL storage.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{DeleteOutcome, NewShortUrl, OwnerId, Saved, ShortUrl};

/// Storage operation a [`StoreError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Save,
    Find,
    Delete,
    Ping,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Operation::Save => "save",
            Operation::Find => "find",
            Operation::Delete => "delete",
            Operation::Ping => "ping",
        };
        f.write_str(tag)
    }
}

/// Storage medium failure (I/O, connection loss, aborted transaction).
///
/// Expected outcomes such as "not found", "duplicate" or "nothing to delete"
/// are never reported through this type.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {op}: {message}")]
    Storage { op: Operation, message: String },
    #[error("failed to {op}: storage did not answer in time")]
    Timeout { op: Operation },
}

impl StoreError {
    pub fn storage(op: Operation, err: impl fmt::Display) -> Self {
        Self::Storage {
            op,
            message: err.to_string(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            StoreError::Storage { op, .. } | StoreError::Timeout { op } => *op,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository interface for short URL records.
///
/// Every backend provides the same semantics:
///
/// - codes are unique among all records ever created, deleted ones included
/// - at most one record exists per `(owner_id, original_url)` pair
/// - deletion is a monotone soft delete; deleted records stay visible to lookups
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::MemoryRepository`] - in-process maps
/// - [`crate::infrastructure::persistence::FileRepository`] - JSON-lines log
/// - [`crate::infrastructure::persistence::PgRepository`] - PostgreSQL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortUrlRepository: Send + Sync {
    /// Finds a record by its code, deleted or not.
    ///
    /// Returns `Ok(None)` if no record carries the code.
    async fn find_by_code(&self, code: &str) -> StoreResult<Option<ShortUrl>>;

    /// Lists every record of an owner, in creation order.
    ///
    /// An empty vector means the owner has no records.
    async fn find_all_by_owner(&self, owner_id: &OwnerId) -> StoreResult<Vec<ShortUrl>>;

    /// Returns the owner's records whose code is in `codes`.
    ///
    /// Codes that are unknown or belong to someone else are silently left out.
    async fn find_all_by_owner_and_codes(
        &self,
        owner_id: &OwnerId,
        codes: &[String],
    ) -> StoreResult<Vec<ShortUrl>>;

    /// Stores a new record, or returns the existing one for the same
    /// `(owner_id, original_url)` pair as [`Saved::Duplicate`].
    ///
    /// Concurrent calls for the same pair never create two records.
    async fn save(&self, new_url: NewShortUrl) -> StoreResult<Saved>;

    /// Applies [`Self::save`] to every item as one unit.
    ///
    /// Each item dedups independently; a storage failure leaves none of the
    /// items stored. Results keep the order of `new_urls`.
    async fn batch_save(&self, new_urls: Vec<NewShortUrl>) -> StoreResult<Vec<Saved>>;

    /// Marks the given records deleted.
    ///
    /// Returns [`DeleteOutcome::NothingToDelete`] when `records` is empty.
    async fn batch_soft_delete(&self, records: &[ShortUrl]) -> StoreResult<DeleteOutcome>;

    /// Checks that the storage medium is reachable.
    async fn ping(&self) -> StoreResult<()>;
}
