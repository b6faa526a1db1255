//! Storage engine contract. A store owns exactly one engine and only ever
//! calls it from its worker thread, so engines take `&mut self` and need no
//! internal locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

pub mod filesystem;
pub mod inmemory;

pub use filesystem::FileEngine;
pub use inmemory::InMemoryEngine;

/// Persisted feed item. `position` is only used to restore the order of the
/// feed on read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItemRecord {
    pub id: Uuid,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: String,
    pub position: u32,
}

/// Persisted cache slot. Engines do not guarantee the order of `feed` when
/// fetching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub timestamp: DateTime<Utc>,
    pub feed: Vec<FeedItemRecord>,
}

impl CacheRecord {
    pub fn new(timestamp: DateTime<Utc>, feed: Vec<FeedItemRecord>) -> Self {
        CacheRecord { timestamp, feed }
    }
}

/// Kinds of persisted entities that can be bulk deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// The cache record. Deleting it cascades to its items.
    Cache,
    /// The items of the cache record. The record itself survives with an
    /// empty feed.
    FeedItem,
}

pub trait StorageEngine: Send + 'static {
    /// Committed cache record, if any.
    fn fetch(&mut self) -> Result<Option<CacheRecord>>;
    /// Deletes every entity of `kind` directly in the backing storage. Staged
    /// changes are not affected. Deleting nothing succeeds.
    fn delete_all(&mut self, kind: EntityKind) -> Result<()>;
    /// Stages a new cache record. A record staged earlier and not yet saved is
    /// replaced.
    fn insert(&mut self, record: CacheRecord);
    fn has_changes(&self) -> bool;
    /// Persists staged changes. Succeeds without touching storage when there
    /// is nothing staged.
    fn save(&mut self) -> Result<()>;
    /// Discards staged changes.
    fn rollback(&mut self);
}
