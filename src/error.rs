use std::fmt::Display;

use anyhow::{anyhow, Context, Result};
use thiserror::Error;

/// Failure kinds surfaced by the feed store. Engine errors are wrapped with
/// one of these as context, so callers can recover the kind with
/// `err.downcast_ref::<FeedStoreError>()` while the engine error stays in the
/// chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedStoreError {
    #[error("Could not read the cached feed")]
    Read,
    #[error("Could not delete the cached feed")]
    Delete,
    /// The previous cache was already deleted when the commit failed. The
    /// store is left empty.
    #[error("Could not write the cached feed, the cache is now empty")]
    Write,
    #[error("Feed mapping error: {0}")]
    Mapping(String),
    #[error("Store worker panicked while running an operation")]
    WorkerPanicked,
    #[error("Store worker is no longer running")]
    WorkerDisconnected,
    /// A blocking call was made from a completion, on the worker it would
    /// wait for.
    #[error("Blocking store calls cannot be made from the store worker")]
    BlockingOnWorker,
    #[error("Corrupt store file: {0}")]
    CorruptStoreFile(String),
    #[error("Store location does not exist: {0}")]
    StoreLocationDoesNotExist(String),
    #[error("Store location is not a directory: {0}")]
    StoreLocationIsNotADirectory(String),
    #[error("Store location is not writeable: {0}")]
    StoreLocationIsNotWriteable(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

pub trait AddContext<T, E>: Context<T, E> {
    fn err_context<C: Display + Send + Sync + 'static>(self, msg: C) -> Result<T, anyhow::Error>
    where
        Self: Sized,
    {
        self.context(msg)
    }
}

impl<U, T, E> AddContext<T, E> for U where U: Context<T, E> {}

pub fn gen<T: AsRef<str>>(msg: T) -> anyhow::Error {
    anyhow!(msg.as_ref().to_string())
}

/// Returns the store error kind carried by `err`, if any.
pub fn kind(err: &anyhow::Error) -> Option<&FeedStoreError> {
    err.downcast_ref::<FeedStoreError>()
}
