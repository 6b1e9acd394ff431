//! Short URL entity and the result types produced when storing one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of the user who owns a short URL.
///
/// Stores never interpret it beyond equality.
pub type OwnerId = Uuid;

/// A stored short URL record.
///
/// `id` is assigned by the backend and never changes; `code` is derived from it
/// by [`crate::utils::uid_codec::UidCodec`] and is never reused, even after the
/// record is soft-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrl {
    pub id: i64,
    pub code: String,
    pub original_url: String,
    pub owner_id: OwnerId,
    #[serde(default)]
    pub deleted: bool,
}

impl ShortUrl {
    /// Creates a live (not deleted) record.
    pub fn new(id: i64, code: String, original_url: String, owner_id: OwnerId) -> Self {
        Self {
            id,
            code,
            original_url,
            owner_id,
            deleted: false,
        }
    }

    /// Returns true if the record has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Input data for creating a short URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortUrl {
    pub owner_id: OwnerId,
    pub original_url: String,
}

impl NewShortUrl {
    pub fn new(owner_id: OwnerId, original_url: impl Into<String>) -> Self {
        Self {
            owner_id,
            original_url: original_url.into(),
        }
    }
}

/// Outcome of storing a short URL.
///
/// A second attempt for the same `(owner, url)` pair yields
/// [`Saved::Duplicate`] carrying the record created by the first attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Saved {
    Created(ShortUrl),
    Duplicate(ShortUrl),
}

impl Saved {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Saved::Duplicate(_))
    }

    pub fn record(&self) -> &ShortUrl {
        match self {
            Saved::Created(record) | Saved::Duplicate(record) => record,
        }
    }

    pub fn into_record(self) -> ShortUrl {
        match self {
            Saved::Created(record) | Saved::Duplicate(record) => record,
        }
    }
}

/// Outcome of a batch soft-delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Number of records that were marked deleted by this call.
    Deleted(usize),
    /// The call carried no records.
    NothingToDelete,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ShortUrl {
        ShortUrl::new(
            1,
            "gY7Ld".to_string(),
            "https://example.com/".to_string(),
            Uuid::nil(),
        )
    }

    #[test]
    fn test_new_record_is_live() {
        let record = record();

        assert_eq!(record.id, 1);
        assert_eq!(record.code, "gY7Ld");
        assert!(!record.is_deleted());
    }

    #[test]
    fn test_saved_accessors() {
        let created = Saved::Created(record());
        let duplicate = Saved::Duplicate(record());

        assert!(!created.is_duplicate());
        assert!(duplicate.is_duplicate());
        assert_eq!(created.record(), duplicate.record());
        assert_eq!(duplicate.into_record().code, "gY7Ld");
    }

    #[test]
    fn test_deserialize_without_deleted_flag() {
        let json = r#"{"id":3,"code":"abcde","original_url":"https://a.b/","owner_id":"00000000-0000-0000-0000-000000000000"}"#;

        let record: ShortUrl = serde_json::from_str(json).unwrap();

        assert_eq!(record.id, 3);
        assert!(!record.deleted);
    }
}
