//! The feed cache store.
//!
//! A store holds at most one cached feed. All operations against one store
//! are funneled through a single worker, so they never interleave and they
//! take effect, completion included, in the order they were submitted.
//!
//! `insert` deletes the previous cache before writing the new one. If the
//! write then fails, the previous cache is already gone and the store is left
//! empty: callers must treat any failure as "cache state unknown" and go back
//! to the source of truth.

use std::path::PathBuf;
use std::sync::mpsc::channel;

use chrono::{DateTime, Utc};

use crate::config::ConfigProperties;
use crate::engine::{CacheRecord, EntityKind, FileEngine, InMemoryEngine, StorageEngine};
use crate::error::{AddContext, FeedStoreError};
use crate::feed::{CacheState, CachedFeed, FeedItem};
use crate::queue::SerialQueue;
use crate::{log_debug, log_error, mapper, Result};

pub type RetrievalCompletion = Box<dyn FnOnce(Result<CacheState>) + Send>;
pub type InsertionCompletion = Box<dyn FnOnce(Result<()>) + Send>;
pub type DeletionCompletion = Box<dyn FnOnce(Result<()>) + Send>;

pub trait FeedStore {
    /// Delivers the cached feed, in the order it was inserted, or
    /// `CacheState::Empty`. Never modifies the cache.
    fn retrieve(&self, completion: RetrievalCompletion);
    /// Replaces whatever is cached with `feed` and `timestamp`. An empty feed
    /// is cached as such and is not the same as no cache.
    fn insert(&self, feed: Vec<FeedItem>, timestamp: DateTime<Utc>, completion: InsertionCompletion);
    /// Deletes the cached feed. Succeeds when there is nothing cached.
    fn delete_cached_feed(&self, completion: DeletionCompletion);
    /// True when called from the thread running the store's operations.
    fn is_store_worker(&self) -> bool;

    /// Blocks the calling thread until the retrieval completes.
    fn retrieve_blocking(&self) -> Result<CacheState> {
        if self.is_store_worker() {
            return Err(FeedStoreError::BlockingOnWorker.into());
        }
        let (sender, receiver) = channel::<Result<CacheState>>();
        self.retrieve(Box::new(move |result| {
            sender.send(result).unwrap_or_default();
        }));
        receiver
            .recv()
            .map_err(|_| FeedStoreError::WorkerDisconnected)?
    }

    /// Blocks the calling thread until the insertion completes.
    fn insert_blocking(&self, feed: Vec<FeedItem>, timestamp: DateTime<Utc>) -> Result<()> {
        if self.is_store_worker() {
            return Err(FeedStoreError::BlockingOnWorker.into());
        }
        let (sender, receiver) = channel::<Result<()>>();
        self.insert(
            feed,
            timestamp,
            Box::new(move |result| {
                sender.send(result).unwrap_or_default();
            }),
        );
        receiver
            .recv()
            .map_err(|_| FeedStoreError::WorkerDisconnected)?
    }

    /// Blocks the calling thread until the deletion completes.
    fn delete_cached_feed_blocking(&self) -> Result<()> {
        if self.is_store_worker() {
            return Err(FeedStoreError::BlockingOnWorker.into());
        }
        let (sender, receiver) = channel::<Result<()>>();
        self.delete_cached_feed(Box::new(move |result| {
            sender.send(result).unwrap_or_default();
        }));
        receiver
            .recv()
            .map_err(|_| FeedStoreError::WorkerDisconnected)?
    }
}

/// Feed store backed by a `StorageEngine`. The engine is moved onto the
/// store's worker thread and only touched from there.
pub struct LocalFeedStore<E: StorageEngine> {
    queue: SerialQueue<E>,
}

impl<E: StorageEngine> LocalFeedStore<E> {
    pub fn new(engine: E) -> Result<Self> {
        let queue = SerialQueue::new(engine, E::rollback)?;
        Ok(LocalFeedStore { queue })
    }

    fn perform<T, W, F>(&self, operation: &'static str, work: W, completion: F)
    where
        T: 'static,
        W: FnOnce(&mut E) -> Result<T> + Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.queue.submit(
            move |engine| {
                log_debug!("Running {operation}");
                work(engine)
            },
            move |result| {
                if let Err(err) = &result {
                    log_error!("{operation} failed: {err:#}");
                }
                completion(result)
            },
        );
    }
}

impl LocalFeedStore<InMemoryEngine> {
    /// Store whose cache lives only as long as the store.
    pub fn in_memory() -> Result<Self> {
        LocalFeedStore::new(InMemoryEngine::new())
    }
}

impl LocalFeedStore<FileEngine> {
    /// Store persisting to the file at `path`. The directory holding it must
    /// exist and be writeable.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let engine = FileEngine::new(path);
        engine.validate_store_location()?;
        LocalFeedStore::new(engine)
    }

    pub fn from_config<C: ConfigProperties + ?Sized>(config: &C) -> Result<Self> {
        let engine = FileEngine::from_config(config)?;
        engine.validate_store_location()?;
        LocalFeedStore::new(engine)
    }
}

impl<E: StorageEngine> FeedStore for LocalFeedStore<E> {
    fn retrieve(&self, completion: RetrievalCompletion) {
        self.perform("retrieve", retrieve_cache, completion);
    }

    fn insert(&self, feed: Vec<FeedItem>, timestamp: DateTime<Utc>, completion: InsertionCompletion) {
        self.perform(
            "insert",
            move |engine| insert_cache(engine, &feed, timestamp),
            completion,
        );
    }

    fn delete_cached_feed(&self, completion: DeletionCompletion) {
        self.perform("delete", delete_caches, completion);
    }

    fn is_store_worker(&self) -> bool {
        self.queue.is_worker_thread()
    }
}

fn retrieve_cache<E: StorageEngine>(engine: &mut E) -> Result<CacheState> {
    let Some(record) = engine.fetch().err_context(FeedStoreError::Read)? else {
        return Ok(CacheState::Empty);
    };
    let feed = mapper::to_domain(record.feed)?;
    Ok(CacheState::Found(CachedFeed::new(feed, record.timestamp)))
}

fn insert_cache<E: StorageEngine>(
    engine: &mut E,
    feed: &[FeedItem],
    timestamp: DateTime<Utc>,
) -> Result<()> {
    // Mapping is pure, do it before anything is deleted.
    let items = mapper::to_persisted(feed)?;
    delete_caches(engine)?;
    engine.insert(CacheRecord::new(timestamp, items));
    if let Err(err) = engine.save() {
        engine.rollback();
        return Err(err.context(FeedStoreError::Write));
    }
    Ok(())
}

fn delete_caches<E: StorageEngine>(engine: &mut E) -> Result<()> {
    engine
        .delete_all(EntityKind::Cache)
        .err_context(FeedStoreError::Delete)
}
