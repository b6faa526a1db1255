//! Caller facing feed types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// One item of a feed. Immutable once built.
#[derive(Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct FeedItem {
    id: Uuid,
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    description: Option<String>,
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    location: Option<String>,
    url: Url,
}

impl FeedItem {
    pub fn new(id: Uuid, description: Option<String>, location: Option<String>, url: Url) -> Self {
        FeedItem {
            id,
            description,
            location,
            url,
        }
    }

    pub fn builder() -> FeedItemBuilder {
        FeedItemBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// The snapshot held in the cache slot: the feed in presentation order and
/// the time it was cached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedFeed {
    pub feed: Vec<FeedItem>,
    pub timestamp: DateTime<Utc>,
}

impl CachedFeed {
    pub fn new(feed: Vec<FeedItem>, timestamp: DateTime<Utc>) -> Self {
        CachedFeed { feed, timestamp }
    }
}

/// Outcome of a successful retrieval. Failures are delivered as `Err`.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheState {
    Empty,
    Found(CachedFeed),
}
