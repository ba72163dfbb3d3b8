use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::shortid::ShortId;
use crate::store::{NewUrl, OwnerId, UrlRecord, UrlStore};

#[derive(Debug, Clone)]
struct Row {
    /// Insertion order, breaks ties between equal `created_at` values.
    seq: u64,
    record: UrlRecord,
}

/// In-process store backed by a sharded map.
///
/// Each row sits behind its shard's lock, so the click increment is atomic per
/// short id without any extra coordination.
#[derive(Clone)]
pub struct MemoryStore {
    rows: Arc<DashMap<ShortId, Row>>,
    next_seq: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlStore for MemoryStore {
    async fn insert_url(&self, new: NewUrl) -> Result<UrlRecord, StoreError> {
        match self.rows.entry(new.short_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(new.short_id.to_string())),
            Entry::Vacant(slot) => {
                let now = self.clock.now();
                let record = UrlRecord {
                    short_id: new.short_id,
                    original_url: new.original_url,
                    owner_id: new.owner_id,
                    click_count: 0,
                    created_at: now,
                    updated_at: now,
                };
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(Row {
                    seq,
                    record: record.clone(),
                });
                Ok(record)
            }
        }
    }

    async fn find_by_short_id(&self, id: &ShortId) -> Result<Option<UrlRecord>, StoreError> {
        Ok(self.rows.get(id).map(|row| row.record.clone()))
    }

    async fn increment_click_count(&self, id: &ShortId) -> Result<bool, StoreError> {
        let Some(mut row) = self.rows.get_mut(id) else {
            return Ok(false);
        };
        row.record.click_count += 1;
        row.record.updated_at = self.clock.now();
        Ok(true)
    }

    // Owner queries scan every row. The Postgres store serves them from the
    // owner index with offset/limit in the query.
    async fn count_by_owner(&self, owner: &OwnerId) -> Result<u64, StoreError> {
        let count = self
            .rows
            .iter()
            .filter(|row| row.record.owner_id.as_ref() == Some(owner))
            .count();
        Ok(count as u64)
    }

    /// Clones and sorts all of the owner's rows before paging. Good enough for
    /// tests and single-process runs.
    async fn list_by_owner(
        &self,
        owner: &OwnerId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UrlRecord>, StoreError> {
        let mut owned: Vec<Row> = self
            .rows
            .iter()
            .filter(|row| row.record.owner_id.as_ref() == Some(owner))
            .map(|row| row.value().clone())
            .collect();

        owned.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(owned
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| row.record)
            .collect())
    }
}
