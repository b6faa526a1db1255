use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::engine::{CacheRecord, EntityKind, FeedItemRecord, StorageEngine};
use crate::Result;

type ObjectId = u64;

struct StoredCache {
    timestamp: DateTime<Utc>,
    // Keyed by engine generated ids, iteration order is arbitrary.
    feed: HashMap<ObjectId, FeedItemRecord>,
}

/// Engine that keeps the committed cache in memory. Contents are lost when
/// the engine is dropped.
#[derive(Default)]
pub struct InMemoryEngine {
    committed: Option<StoredCache>,
    staged: Option<CacheRecord>,
    next_object_id: ObjectId,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn object_id(&mut self) -> ObjectId {
        self.next_object_id += 1;
        self.next_object_id
    }
}

impl StorageEngine for InMemoryEngine {
    fn fetch(&mut self) -> Result<Option<CacheRecord>> {
        Ok(self.committed.as_ref().map(|cache| {
            CacheRecord::new(cache.timestamp, cache.feed.values().cloned().collect())
        }))
    }

    fn delete_all(&mut self, kind: EntityKind) -> Result<()> {
        match kind {
            EntityKind::Cache => self.committed = None,
            EntityKind::FeedItem => {
                if let Some(cache) = self.committed.as_mut() {
                    cache.feed.clear();
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, record: CacheRecord) {
        self.staged = Some(record);
    }

    fn has_changes(&self) -> bool {
        self.staged.is_some()
    }

    fn save(&mut self) -> Result<()> {
        let Some(record) = self.staged.take() else {
            return Ok(());
        };
        let mut feed = HashMap::with_capacity(record.feed.len());
        for item in record.feed {
            feed.insert(self.object_id(), item);
        }
        self.committed = Some(StoredCache {
            timestamp: record.timestamp,
            feed,
        });
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged = None;
    }
}
