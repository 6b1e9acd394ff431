//! In-process lookup indexes shared by the memory and file repositories.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::domain::entities::{NewShortUrl, OwnerId, Saved, ShortUrl};
use crate::domain::repositories::{Operation, StoreError, StoreResult};
use crate::utils::uid_codec::{UidCodec, UidStrategy};

/// Records keyed by code, plus owner and `(owner, url)` indexes.
///
/// Not synchronized; the owning repository wraps it in a single lock so that
/// dedup checks and inserts happen atomically.
#[derive(Debug)]
pub struct RecordIndex {
    records: HashMap<String, ShortUrl>,
    by_owner: HashMap<OwnerId, Vec<String>>,
    by_owner_url: HashMap<(OwnerId, String), String>,
    next_id: i64,
}

/// Records a save would create, computed without touching the index.
#[derive(Debug)]
pub struct SavePlan {
    pub results: Vec<Saved>,
    pub created: Vec<ShortUrl>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            by_owner: HashMap::new(),
            by_owner_url: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_code(&self, code: &str) -> Option<ShortUrl> {
        self.records.get(code).cloned()
    }

    pub fn find_all_by_owner(&self, owner_id: &OwnerId) -> Vec<ShortUrl> {
        self.by_owner
            .get(owner_id)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|code| self.records.get(code).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn find_all_by_owner_and_codes(
        &self,
        owner_id: &OwnerId,
        codes: &[String],
    ) -> Vec<ShortUrl> {
        let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();

        self.find_all_by_owner(owner_id)
            .into_iter()
            .filter(|record| wanted.contains(record.code.as_str()))
            .collect()
    }

    fn find_duplicate(&self, owner_id: &OwnerId, original_url: &str) -> Option<ShortUrl> {
        self.by_owner_url
            .get(&(*owner_id, original_url.to_string()))
            .and_then(|code| self.records.get(code).cloned())
    }

    /// Works out ids, codes and duplicates for `new_urls`.
    ///
    /// Items repeated inside the batch resolve to the record planned for their
    /// first occurrence.
    pub fn plan_save(&self, new_urls: Vec<NewShortUrl>, codec: &UidCodec) -> StoreResult<SavePlan> {
        let mut next_id = self.next_id;
        let mut results = Vec::with_capacity(new_urls.len());
        let mut created: Vec<ShortUrl> = Vec::new();
        let mut planned: HashMap<(OwnerId, String), usize> = HashMap::new();
        let mut planned_codes: HashSet<String> = HashSet::new();

        for new_url in new_urls {
            if let Some(existing) = self.find_duplicate(&new_url.owner_id, &new_url.original_url) {
                results.push(Saved::Duplicate(existing));
                continue;
            }

            let key = (new_url.owner_id, new_url.original_url);
            if let Some(&position) = planned.get(&key) {
                results.push(Saved::Duplicate(created[position].clone()));
                continue;
            }

            let id = next_id;
            let code = self.free_code(id, codec, &planned_codes)?;
            planned_codes.insert(code.clone());

            let record = ShortUrl::new(id, code, key.1.clone(), key.0);
            next_id += 1;

            planned.insert(key, created.len());
            created.push(record.clone());
            results.push(Saved::Created(record));
        }

        Ok(SavePlan { results, created })
    }

    /// Picks a code for `id` that neither a stored nor a planned record uses.
    ///
    /// Timestamp codes are drawn again on a clash. Each draw yields a new
    /// nonce, so one more draw than there are taken codes always succeeds.
    fn free_code(
        &self,
        id: i64,
        codec: &UidCodec,
        planned_codes: &HashSet<String>,
    ) -> StoreResult<String> {
        let attempts = match codec.strategy() {
            UidStrategy::Sequential => 1,
            UidStrategy::Timestamp => self.records.len() + planned_codes.len() + 1,
        };

        for _ in 0..attempts {
            let code = codec
                .code_for(id)
                .map_err(|e| StoreError::storage(Operation::Save, e))?;
            if !self.records.contains_key(&code) && !planned_codes.contains(&code) {
                return Ok(code);
            }
            debug!("Code '{}' is already taken", code);
        }

        Err(StoreError::storage(
            Operation::Save,
            format!("no free code for id {id}"),
        ))
    }

    /// Records that `records` would turn from live to deleted.
    ///
    /// Unknown codes and already deleted records are skipped.
    pub fn plan_soft_delete(&self, records: &[ShortUrl]) -> Vec<ShortUrl> {
        let mut seen = HashSet::new();

        records
            .iter()
            .filter(|record| seen.insert(record.code.as_str()))
            .filter_map(|record| self.records.get(&record.code))
            .filter(|stored| !stored.deleted)
            .map(|stored| ShortUrl {
                deleted: true,
                ..stored.clone()
            })
            .collect()
    }

    /// Inserts or updates a record by code.
    ///
    /// A stored `deleted` flag is never cleared.
    pub fn apply(&mut self, record: ShortUrl) {
        self.next_id = self.next_id.max(record.id + 1);

        if let Some(stored) = self.records.get_mut(&record.code) {
            stored.deleted = stored.deleted || record.deleted;
            return;
        }

        self.by_owner
            .entry(record.owner_id)
            .or_default()
            .push(record.code.clone());
        self.by_owner_url.insert(
            (record.owner_id, record.original_url.clone()),
            record.code.clone(),
        );
        self.records.insert(record.code.clone(), record);
    }
}

impl Default for RecordIndex {
    fn default() -> Self {
        Self::new()
    }
}
