pub mod cli;
pub mod cmds;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod feed;
pub mod logging;
pub mod mapper;
pub mod queue;
pub mod store;
pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;

pub use error::FeedStoreError;
pub use feed::{CacheState, CachedFeed, FeedItem};
pub use store::{FeedStore, LocalFeedStore};

#[macro_use]
extern crate log;

#[macro_use]
extern crate derive_builder;
